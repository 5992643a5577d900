//! Application-level configuration loading, including phase duration budgets.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::state_machine::PhaseTimings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MOONHOLLOW_BACK_CONFIG_PATH";
/// Reconciler poll period used when the config does not set one.
const DEFAULT_POLL_PERIOD_MS: u64 = 1000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timings: PhaseTimings,
    poll_period: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build a configuration from explicit values (tests, embedded use).
    pub fn with_timings(timings: PhaseTimings, poll_period: Duration) -> Self {
        Self { timings, poll_period }
    }

    /// Phase duration budgets applied to every room.
    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Fixed period of the client polling loop.
    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timings: PhaseTimings::default(),
            poll_period: Duration::from_millis(DEFAULT_POLL_PERIOD_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    phase_durations: RawDurations,
    poll_period_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
/// Per-phase duration overrides in seconds.
struct RawDurations {
    discussion_secs: Option<u64>,
    voting_secs: Option<u64>,
    night_secs: Option<u64>,
    result_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = PhaseTimings::default();
        let pick =
            |secs: Option<u64>, fallback: Duration| secs.map(Duration::from_secs).unwrap_or(fallback);
        Self {
            timings: PhaseTimings {
                discussion: pick(value.phase_durations.discussion_secs, defaults.discussion),
                voting: pick(value.phase_durations.voting_secs, defaults.voting),
                night: pick(value.phase_durations.night_secs, defaults.night),
                result_reveal: pick(value.phase_durations.result_secs, defaults.result_reveal),
            },
            poll_period: Duration::from_millis(
                value.poll_period_ms.unwrap_or(DEFAULT_POLL_PERIOD_MS),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
