//! Client-side mirror of the authoritative session.

use indexmap::IndexMap;

use crate::{
    dto::game::StateSnapshot,
    state::{
        roles::{Role, SeatId},
        state_machine::{DeadPlayer, GameResult, Phase},
    },
};

/// What the presentation layer reads after every completed poll tick.
///
/// Purely a cache of the last snapshot plus the derived human-turn flag;
/// it carries no authority and can be rebuilt from any later snapshot.
#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    /// Mirrored phase.
    pub phase: Phase,
    /// Mirrored round counter.
    pub round: u32,
    /// Mirrored result.
    pub result: GameResult,
    /// Mirrored alive seats.
    pub alive_players: Vec<SeatId>,
    /// Mirrored dead seats.
    pub dead_players: Vec<SeatId>,
    /// Mirrored speaking order.
    pub speaking_order: Vec<SeatId>,
    /// Mirrored current speaker.
    pub current_speaker: Option<SeatId>,
    /// Mirrored phase timer in seconds.
    pub phase_time_left: u64,
    /// Mirrored vote map.
    pub votes: IndexMap<SeatId, SeatId>,
    /// Mirrored count of votes on record.
    pub voted_count: usize,
    /// Mirrored night acting role.
    pub night_current_role: Option<Role>,
    /// Whether the human seat is the one expected to act right now.
    pub my_turn: bool,
    /// Announcement text currently on display, if any.
    pub announcement: Option<String>,
    /// Mirrored death reveal.
    pub last_dead_player: Option<DeadPlayer>,
    /// Most recent tick failure, surfaced as a transient notice.
    pub last_error: Option<String>,
}

impl ShadowState {
    /// Mirror one snapshot into presentation state.
    pub fn mirror(snapshot: &StateSnapshot, my_turn: bool, announcement: Option<String>) -> Self {
        Self {
            phase: snapshot.phase,
            round: snapshot.round,
            result: snapshot.result,
            alive_players: snapshot.alive_players.clone(),
            dead_players: snapshot.dead_players.clone(),
            speaking_order: snapshot.speaking_order.clone(),
            current_speaker: snapshot.current_speaker,
            phase_time_left: snapshot.phase_time_left,
            votes: snapshot.votes.clone(),
            voted_count: snapshot.voted_count,
            night_current_role: snapshot.night_current_role,
            my_turn,
            announcement,
            last_dead_player: snapshot.last_dead_player,
            last_error: None,
        }
    }
}
