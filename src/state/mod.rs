pub mod roles;
pub mod rotation;
pub mod session;
pub mod state_machine;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::AppConfig;
use crate::state::session::Session;
use crate::state::state_machine::{Phase, PhaseTimings};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state holding every in-memory room.
pub struct AppState {
    config: AppConfig,
    rooms: DashMap<String, Arc<Room>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self { config, rooms: DashMap::new() })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Look up an existing room.
    pub fn room(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a room, creating a waiting session when it does not exist.
    pub fn room_or_create(&self, id: &str) -> Arc<Room> {
        let entry = self.rooms.entry(id.to_owned()).or_insert_with(|| Arc::new(Room::new(id)));
        Arc::clone(entry.value())
    }

    /// Number of rooms currently held in memory.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// One room: its authoritative session plus the deadline scheduler.
///
/// The session mutex is the single-writer guarantee: every mutating
/// operation locks it, so updates within a room are totally ordered while
/// different rooms proceed in parallel.
pub struct Room {
    session: Mutex<Session>,
    deadline_changed: Notify,
    scheduler: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Room {
    fn new(id: &str) -> Self {
        Self {
            session: Mutex::new(Session::new(id)),
            deadline_changed: Notify::new(),
            scheduler: std::sync::Mutex::new(None),
        }
    }

    /// The room's session record, guarded by its single-writer lock.
    pub fn session(&self) -> &Mutex<Session> {
        &self.session
    }

    /// Wake the scheduler so it re-reads the phase deadline.
    pub fn nudge_scheduler(&self) {
        self.deadline_changed.notify_one();
    }

    /// Start the per-room deadline scheduler if it is not running yet.
    ///
    /// The task owns the room's phase timer: it sleeps until the current
    /// deadline, fires the advance, and exits once the room is terminal.
    pub fn ensure_scheduler(self: &Arc<Self>, timings: PhaseTimings) {
        let Ok(mut slot) = self.scheduler.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }
        *slot = Some(tokio::spawn(run_phase_scheduler(Arc::clone(self), timings)));
    }
}

/// Drive a room's phase deadlines until the game is over.
async fn run_phase_scheduler(room: Arc<Room>, timings: PhaseTimings) {
    loop {
        let (deadline, terminal) = {
            let session = room.session.lock().await;
            (session.phase_deadline, session.phase == Phase::GameOver)
        };
        if terminal {
            break;
        }

        match deadline {
            Some(at) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(at)) => {
                        let mut session = room.session.lock().await;
                        let advance = session.advance_phase(&timings, Instant::now());
                        if advance.changed {
                            debug!(
                                room = %session.room_id,
                                phase = ?advance.phase,
                                "phase deadline fired"
                            );
                        }
                    }
                    _ = room.deadline_changed.notified() => {}
                }
            }
            None => room.deadline_changed.notified().await,
        }
    }
}
