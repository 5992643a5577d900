//! Polling reconciler keeping one client consistent with the authority.
//!
//! Once per fixed period the reconciler fetches the full session snapshot,
//! performs at most the actions needed to keep the session moving (show an
//! announcement, relay an agent's turn), and mirrors every authoritative
//! field into [`ShadowState`]. It never computes game outcomes itself.

pub mod client;
pub mod shadow;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    dto::game::{AgentActionRequest, NightActionRequest, StateSnapshot, SubmitSpeechRequest},
    reconciler::{
        client::{Authority, AuthorityError},
        shadow::ShadowState,
    },
    state::{
        roles::SeatId,
        session::AnnouncementKind,
        state_machine::Phase,
    },
};

/// Outcome of one tick attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran to completion (its work may still have failed softly).
    Completed,
    /// A previous tick was still in flight; nothing was done at all.
    Skipped,
}

/// Per-client idempotency markers. These have no authority: they only stop
/// the reconciler from issuing duplicate requests, and they are rebuilt
/// from scratch whenever the client reattaches.
#[derive(Debug, Default)]
struct TickState {
    /// Agent seats whose speech was already requested this discussion.
    processed_speakers: HashSet<SeatId>,
    /// Phase seen by the previous tick, for transition detection.
    last_observed_phase: Option<Phase>,
    /// Announcement currently on display, not yet consumed.
    announcement_showing: bool,
}

/// Polling client for one room.
pub struct Reconciler {
    authority: Arc<dyn Authority>,
    room_id: String,
    human_seat: SeatId,
    inner: Mutex<TickState>,
    shadow: watch::Sender<ShadowState>,
}

impl Reconciler {
    /// Attach a reconciler to a room through an authority boundary.
    pub fn new(authority: Arc<dyn Authority>, room_id: impl Into<String>, human_seat: SeatId) -> Self {
        let (shadow, _) = watch::channel(ShadowState::default());
        Self { authority, room_id: room_id.into(), human_seat, inner: Mutex::new(TickState::default()), shadow }
    }

    /// Subscribe to the mirrored presentation state.
    pub fn shadow(&self) -> watch::Receiver<ShadowState> {
        self.shadow.subscribe()
    }

    /// Run one poll tick.
    ///
    /// If a previous tick is still in flight the call returns
    /// [`TickOutcome::Skipped`] without performing any network operation or
    /// state mutation. Skip, never queue: overlap is the main source of
    /// duplicated side effects over a slow link.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(mut tick) = self.inner.try_lock() else {
            return TickOutcome::Skipped;
        };
        if let Err(err) = self.run_tick(&mut tick).await {
            warn!(room = %self.room_id, error = %err, "poll tick failed");
            self.shadow.send_modify(|shadow| shadow.last_error = Some(err.to_string()));
        }
        TickOutcome::Completed
    }

    async fn run_tick(&self, tick: &mut TickState) -> Result<(), AuthorityError> {
        let snapshot = self.authority.get_state(&self.room_id).await?;

        let announcement = self.handle_announcement(tick, &snapshot).await;

        // Phase transition detection happens exactly once per change.
        if tick.last_observed_phase != Some(snapshot.phase) {
            if snapshot.phase == Phase::DayDiscussion {
                tick.processed_speakers.clear();
            }
            debug!(room = %self.room_id, phase = ?snapshot.phase, "observed phase change");
            tick.last_observed_phase = Some(snapshot.phase);
        }

        let mut my_turn = false;
        match snapshot.phase {
            Phase::RoleAssigned => {
                // Recovery path: the consumption-triggered advance failed on
                // an earlier tick and the announcement is gone. The game
                // does not start itself.
                if snapshot.pending_announcement.is_none() {
                    self.authority.advance_phase(&self.room_id).await?;
                }
            }
            Phase::DayDiscussion => self.dispatch_discussion(tick, &snapshot).await,
            Phase::DayVoting => self.dispatch_voting(&snapshot).await,
            Phase::NightAction => {
                my_turn = self.human_turn(&snapshot);
                self.dispatch_night(&snapshot).await;
            }
            // Result and terminal phases only surface state, no dispatch.
            Phase::Waiting
            | Phase::DayResult
            | Phase::NightResult
            | Phase::GameOver => {}
        }

        self.shadow.send_replace(ShadowState::mirror(&snapshot, my_turn, announcement));
        Ok(())
    }

    /// Display-once handling of the announcement channel.
    ///
    /// The local `announcement_showing` guard keeps an overlapping observer
    /// of the same still-pending announcement from displaying it twice; the
    /// authority-side consumption is idempotent regardless.
    async fn handle_announcement(
        &self,
        tick: &mut TickState,
        snapshot: &StateSnapshot,
    ) -> Option<String> {
        let pending = snapshot.pending_announcement.as_ref()?;
        if tick.announcement_showing {
            return Some(pending.text.clone());
        }
        tick.announcement_showing = true;
        info!(room = %self.room_id, text = %pending.text, "announcement");

        match self.authority.complete_announcement(&self.room_id).await {
            Ok(()) => {
                tick.announcement_showing = false;
                if pending.kind == AnnouncementKind::RolesAssigned {
                    // Role assignment consumed: kick off the first phase.
                    if let Err(err) = self.authority.advance_phase(&self.room_id).await {
                        warn!(room = %self.room_id, error = %err, "initial advance failed");
                    }
                }
            }
            Err(err) => {
                // Unmark so the next tick retries the consumption.
                tick.announcement_showing = false;
                warn!(room = %self.room_id, error = %err, "announcement consumption failed");
            }
        }
        Some(pending.text.clone())
    }

    /// Drive the current agent speaker, at most once per discussion phase.
    async fn dispatch_discussion(&self, tick: &mut TickState, snapshot: &StateSnapshot) {
        let Some(speaker) = snapshot.current_speaker else {
            return;
        };
        if speaker == self.human_seat || tick.processed_speakers.contains(&speaker) {
            return;
        }

        // Mark before the first request so a racing or retried tick cannot
        // re-issue the same turn.
        tick.processed_speakers.insert(speaker);
        if let Err(err) = self.drive_agent_speech(speaker).await {
            warn!(room = %self.room_id, seat = speaker, error = %err, "agent speech failed");
            // Unmark so a later tick retries the seat.
            tick.processed_speakers.remove(&speaker);
        }
    }

    async fn drive_agent_speech(&self, seat: SeatId) -> Result<(), AuthorityError> {
        let generated = self.authority.agent_speech(&self.room_id, seat).await?;
        self.authority
            .submit_speech(&self.room_id, SubmitSpeechRequest { seat, text: generated.text })
            .await?;
        self.authority.advance_speaker(&self.room_id).await?;
        Ok(())
    }

    /// Ask the authority to vote for every agent seat the latest snapshot
    /// shows as not-yet-voted. Local memory is never consulted: stale
    /// shadow state is how double votes happen.
    async fn dispatch_voting(&self, snapshot: &StateSnapshot) {
        for seat in &snapshot.alive_players {
            if *seat == self.human_seat || snapshot.votes.contains_key(seat) {
                continue;
            }
            if let Err(err) = self.authority.agent_vote(&self.room_id, *seat).await {
                warn!(room = %self.room_id, seat, error = %err, "agent vote failed");
            }
        }
    }

    /// Relay night actions for agent seats of the currently acting role.
    async fn dispatch_night(&self, snapshot: &StateSnapshot) {
        let Some(role) = snapshot.night_current_role else {
            return;
        };
        for seat in &snapshot.alive_players {
            if *seat == self.human_seat
                || snapshot.roles_by_seat.get(seat) != Some(&role)
                || snapshot.night_acted_seats.contains(seat)
            {
                continue;
            }
            let available_targets: Vec<SeatId> = snapshot
                .alive_players
                .iter()
                .copied()
                .filter(|candidate| candidate != seat)
                .collect();
            let decision = match self
                .authority
                .agent_action(
                    &self.room_id,
                    AgentActionRequest { seat: *seat, role, available_targets },
                )
                .await
            {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(room = %self.room_id, seat, error = %err, "agent action failed");
                    continue;
                }
            };
            if let Err(err) = self
                .authority
                .submit_night_action(
                    &self.room_id,
                    NightActionRequest {
                        player_seat: *seat,
                        role,
                        action_type: decision.action_type,
                        target_seat: decision.target_seat,
                    },
                )
                .await
            {
                warn!(room = %self.room_id, seat, error = %err, "night action submit failed");
            }
        }
    }

    /// Whether the human seat is the one the current night turn expects.
    fn human_turn(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.alive_players.contains(&self.human_seat)
            && snapshot.night_current_role.is_some()
            && snapshot.roles_by_seat.get(&self.human_seat) == snapshot.night_current_role.as_ref()
    }
}

/// Handle owning the polling task. Detaching stops the timer for good.
pub struct ReconcilerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop polling and wait for the loop to wind down.
    pub async fn detach(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the fixed-period polling loop for a reconciler.
///
/// Missed ticks are skipped, never queued, so a slow round-trip produces
/// fewer polls instead of a burst of overlapping ones.
pub fn spawn(reconciler: Arc<Reconciler>, period: Duration) -> ReconcilerHandle {
    let (stop, mut stopped) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    reconciler.tick().await;
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
    });
    ReconcilerHandle { stop, task }
}
