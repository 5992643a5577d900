use std::time::{Duration, Instant, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::roles::{Role, Seat, SeatId};
use crate::state::state_machine::{DeadPlayer, GameResult, KilledBy, Phase};

/// Night-phase working set, reset every time a night begins.
#[derive(Debug, Clone, Default)]
pub struct NightState {
    /// Role whose turn it currently is, `None` once the rotation is done.
    pub current_role: Option<Role>,
    /// Roles that finished (or were skipped) this night, in acting order.
    pub completed: Vec<Role>,
    /// Kill choice of each living werewolf, keyed by the wolf's seat.
    pub wolf_choices: IndexMap<SeatId, SeatId>,
    /// Pack victim once every living werewolf has chosen.
    pub pending_kill: Option<SeatId>,
    /// Seat the witch saved tonight, if any.
    pub saved: Option<SeatId>,
    /// Seat the witch poisoned tonight, if any.
    pub poisoned: Option<SeatId>,
    /// Seat the seer checked tonight, if any.
    pub checked: Option<SeatId>,
}

/// The witch's once-per-game potions.
#[derive(Debug, Clone)]
pub struct WitchPotions {
    /// Save potion still unspent.
    pub save: bool,
    /// Poison potion still unspent.
    pub poison: bool,
}

impl Default for WitchPotions {
    fn default() -> Self {
        Self { save: true, poison: true }
    }
}

/// One recorded seer check, kept for the agent-decision collaborator.
#[derive(Debug, Clone)]
pub struct SeerCheck {
    /// Round the check happened in.
    pub round: u32,
    /// Seat that was checked.
    pub seat: SeatId,
    /// Role revealed by the check.
    pub role: Role,
}

/// One accepted speech, human and agent entries recorded uniformly.
#[derive(Debug, Clone)]
pub struct SpeechRecord {
    /// Unique identifier of the entry.
    pub id: Uuid,
    /// Seat that spoke.
    pub seat: SeatId,
    /// Round the speech belongs to.
    pub round: u32,
    /// The text as submitted.
    pub text: String,
    /// Wall-clock acceptance time.
    pub at: SystemTime,
}

/// What triggered a narrator announcement, used by pollers to react
/// (role assignment completion kicks off the first phase advance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    /// Roles were dealt; the game is ready to start.
    RolesAssigned,
    /// A night role is being asked to act.
    NightPrompt,
    /// A death (or a peaceful night) is being revealed.
    Death,
    /// The game reached a faction win.
    GameOver,
}

/// Narrator side message pending consumption by a poller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Announcement {
    /// Human-readable narrator text.
    pub text: String,
    /// What the announcement is about.
    pub kind: AnnouncementKind,
}

/// Typed payload of a game log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMessageBody {
    /// The session moved to a new phase.
    #[serde(rename_all = "camelCase")]
    PhaseChange {
        /// Phase that was entered.
        phase: Phase,
        /// Round counter at that moment.
        round: u32,
    },
    /// A seat died.
    #[serde(rename_all = "camelCase")]
    PlayerDeath {
        /// Seat that died.
        seat: SeatId,
        /// Role revealed on death.
        role: Role,
        /// Cause of death.
        killed_by: KilledBy,
        /// Round of death.
        round: u32,
    },
    /// The game ended with a faction win.
    #[serde(rename_all = "camelCase")]
    GameEnd {
        /// Winning faction.
        winner: GameResult,
        /// Final round.
        round: u32,
    },
}

/// Append-only game log entry, exposed for catch-up reads.
#[derive(Debug, Clone)]
pub struct GameMessage {
    /// Monotonic sequence number, usable as a resume cursor.
    pub seq: u64,
    /// Wall-clock time the event was recorded.
    pub at: SystemTime,
    /// The event itself.
    pub body: GameMessageBody,
}

/// Authoritative per-room session record.
///
/// Created on role assignment, mutated only by the phase-advance and
/// action-submit operations, terminal once `phase` is `GameOver`. Every
/// field a client sees comes from a snapshot of this struct.
#[derive(Debug, Clone)]
pub struct Session {
    /// Room this session belongs to.
    pub room_id: String,
    /// Current phase of the fixed day/night cycle.
    pub phase: Phase,
    /// Monotonic token bumped on every phase transition.
    pub phase_version: u64,
    /// Day/night cycle counter, 1-based once roles are dealt.
    pub round: u32,
    /// Instant the current phase's duration budget runs out.
    pub phase_deadline: Option<Instant>,
    /// Duration budget of the current phase.
    pub phase_duration: Duration,
    /// Seat roster in ascending seat order; never shrinks.
    pub seats: IndexMap<SeatId, Seat>,
    /// Seat occupied by the human participant.
    pub human_seat: SeatId,
    /// Alive seats captured when the current discussion began.
    pub speaking_order: Vec<SeatId>,
    /// Cursor into `speaking_order`; dead seats are skipped, not removed.
    pub current_speaker_index: usize,
    /// Uniform speech history across humans and agents.
    pub speeches: Vec<SpeechRecord>,
    /// Voter to target, last write wins, cleared each voting phase.
    pub votes: IndexMap<SeatId, SeatId>,
    /// Working state of the current night.
    pub night: NightState,
    /// Witch potion inventory, tracked across nights.
    pub witch: WitchPotions,
    /// Seer check history.
    pub seer_checks: Vec<SeerCheck>,
    /// Narrator message waiting for a poller to consume it.
    pub pending_announcement: Option<Announcement>,
    /// Most recent settlement death, if any.
    pub last_dead: Option<DeadPlayer>,
    /// Ongoing or a faction win.
    pub result: GameResult,
    /// Append-only typed event log.
    pub messages: Vec<GameMessage>,
}

impl Session {
    /// Fresh session in the waiting phase with an empty roster.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            phase: Phase::Waiting,
            phase_version: 0,
            round: 0,
            phase_deadline: None,
            phase_duration: Duration::ZERO,
            seats: IndexMap::new(),
            human_seat: 0,
            speaking_order: Vec::new(),
            current_speaker_index: 0,
            speeches: Vec::new(),
            votes: IndexMap::new(),
            night: NightState::default(),
            witch: WitchPotions::default(),
            seer_checks: Vec::new(),
            pending_announcement: None,
            last_dead: None,
            result: GameResult::Ongoing,
            messages: Vec::new(),
        }
    }

    /// Seat lookup by number.
    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    /// Whether the seat exists and is alive.
    pub fn is_alive(&self, id: SeatId) -> bool {
        self.seat(id).is_some_and(|s| s.alive)
    }

    /// Alive seat numbers in ascending order.
    pub fn alive_seats(&self) -> Vec<SeatId> {
        self.seats.values().filter(|s| s.alive).map(|s| s.number).collect()
    }

    /// Dead seat numbers in ascending order.
    pub fn dead_seats(&self) -> Vec<SeatId> {
        self.seats.values().filter(|s| !s.alive).map(|s| s.number).collect()
    }

    /// Alive seats currently holding `role`.
    pub fn alive_with_role(&self, role: Role) -> Vec<SeatId> {
        self.seats
            .values()
            .filter(|s| s.alive && s.role == role)
            .map(|s| s.number)
            .collect()
    }

    /// Seconds left in the current phase budget, zero once expired.
    pub fn phase_time_left(&self, now: Instant) -> u64 {
        self.phase_deadline
            .map(|deadline| deadline.saturating_duration_since(now).as_secs())
            .unwrap_or(0)
    }

    /// Record a typed event in the game log.
    pub fn push_message(&mut self, body: GameMessageBody) {
        let seq = self.messages.last().map(|m| m.seq + 1).unwrap_or(1);
        self.messages.push(GameMessage { seq, at: SystemTime::now(), body });
    }

    /// Replace the pending narrator announcement.
    ///
    /// A newer announcement supersedes an unconsumed one; the log keeps the
    /// durable history, the announcement channel is only the live banner.
    pub fn announce(&mut self, kind: AnnouncementKind, text: impl Into<String>) {
        self.pending_announcement = Some(Announcement { text: text.into(), kind });
    }

    /// Clear the pending announcement. Clearing an already-clear flag is a
    /// no-op, which keeps consumption idempotent under racing pollers.
    pub fn consume_announcement(&mut self) {
        self.pending_announcement = None;
    }
}
