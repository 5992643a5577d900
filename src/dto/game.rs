use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{
        roles::{Role, SeatId},
        rotation::NightActionKind,
        session::{Announcement, GameMessage, GameMessageBody, Session},
        state_machine::{DeadPlayer, GameResult, Phase},
    },
};

/// Payload for dealing roles into a fresh room.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesRequest {
    /// Number of seats at the table.
    #[validate(range(min = 4, max = 18))]
    pub seat_count: u8,
    /// Seat the human participant occupies.
    #[validate(range(min = 1))]
    pub human_seat: SeatId,
}

/// Result of a role assignment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesResponse {
    /// Room the roles were dealt into.
    pub room_id: String,
    /// Seat number to dealt role.
    #[schema(value_type = Object)]
    pub roles_by_seat: IndexMap<SeatId, Role>,
}

/// Outcome of an advance request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvancePhaseResponse {
    /// Phase after the call.
    pub phase: Phase,
    /// Duration budget of that phase in seconds.
    pub duration_seconds: u64,
}

/// One speech submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSpeechRequest {
    /// Speaking seat.
    #[validate(range(min = 1))]
    pub seat: SeatId,
    /// Speech text, capped at 300 characters.
    #[validate(length(min = 1, max = 300))]
    pub text: String,
}

/// Acknowledgement of an accepted speech.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAck {
    /// Seat whose speech was recorded.
    pub seat: SeatId,
}

/// Result of advancing the speaker cursor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceSpeakerResponse {
    /// Next speaker, absent when the order is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_speaker: Option<SeatId>,
}

/// One vote submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    /// Voting seat.
    #[validate(range(min = 1))]
    pub voter_seat: SeatId,
    /// Targeted seat.
    #[validate(range(min = 1))]
    pub target_seat: SeatId,
}

/// Acknowledgement of a recorded vote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteAck {
    /// Seat that voted.
    pub voter_seat: SeatId,
    /// Seat the vote landed on.
    pub target_seat: SeatId,
}

/// One night action submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NightActionRequest {
    /// Acting seat.
    #[validate(range(min = 1))]
    pub player_seat: SeatId,
    /// Role the seat claims to act as.
    pub role: Role,
    /// Which action is being taken.
    pub action_type: NightActionKind,
    /// Target seat; optional for witch declines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_seat: Option<SeatId>,
}

/// Acknowledgement of an accepted night action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NightActionAck {
    /// Action that was recorded.
    pub action: NightActionKind,
    /// Target it was recorded against, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_seat: Option<SeatId>,
}

/// Generic acknowledgement for operations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ack {
    /// Always true; failures travel as error envelopes.
    pub success: bool,
}

impl Ack {
    /// Positive acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Request for a generated agent speech.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpeechRequest {
    /// Agent seat to speak for.
    #[validate(range(min = 1))]
    pub seat: SeatId,
}

/// Generated agent speech.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpeechResponse {
    /// Agent seat the text belongs to.
    pub seat: SeatId,
    /// Generated speech text.
    pub text: String,
}

/// Request for a generated agent night action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AgentActionRequest {
    /// Agent seat to decide for.
    #[validate(range(min = 1))]
    pub seat: SeatId,
    /// Role the seat holds.
    pub role: Role,
    /// Seats the action may legally target.
    pub available_targets: Vec<SeatId>,
}

/// Generated agent night action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentActionResponse {
    /// Agent seat that decided.
    pub seat: SeatId,
    /// Chosen action.
    pub action_type: NightActionKind,
    /// Chosen target, absent on declines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_seat: Option<SeatId>,
}

/// Request to decide and cast a vote for an agent seat.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AgentVoteRequest {
    /// Agent seat to vote for.
    #[validate(range(min = 1))]
    pub seat: SeatId,
}

/// Cursor query for the game message log.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct MessagesQuery {
    /// Return only entries with a sequence number greater than this.
    pub after: Option<u64>,
}

/// One game log entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameMessageDto {
    /// Monotonic sequence number, usable as a resume cursor.
    pub id: u64,
    /// RFC3339 timestamp of the event.
    pub timestamp: String,
    /// The event payload.
    #[serde(flatten)]
    pub event: GameMessageBody,
}

impl From<&GameMessage> for GameMessageDto {
    fn from(message: &GameMessage) -> Self {
        Self {
            id: message.seq,
            timestamp: format_system_time(message.at),
            event: message.body.clone(),
        }
    }
}

/// Page of game log entries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    /// Entries after the requested cursor, oldest first.
    pub messages: Vec<GameMessageDto>,
}

/// Full authoritative session snapshot, the unit of the polling protocol.
///
/// Everything a client mirrors comes out of this one structure; there is
/// no secondary read channel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Room the snapshot describes.
    pub room_id: String,
    /// Current phase.
    pub phase: Phase,
    /// Ongoing or a faction win.
    pub result: GameResult,
    /// Day/night cycle counter.
    pub round: u32,
    /// Monotonic phase transition token.
    pub phase_version: u64,
    /// Seconds left in the current phase budget.
    pub phase_time_left: u64,
    /// Alive seat numbers, ascending.
    pub alive_players: Vec<SeatId>,
    /// Dead seat numbers, ascending.
    pub dead_players: Vec<SeatId>,
    /// Seat held by the human participant.
    pub human_seat: SeatId,
    /// Seat number to role for the whole roster.
    #[schema(value_type = Object)]
    pub roles_by_seat: IndexMap<SeatId, Role>,
    /// Speaking order fixed at the start of the current discussion.
    pub speaking_order: Vec<SeatId>,
    /// Cursor into the speaking order.
    pub current_speaker_index: usize,
    /// Seat whose turn it is to speak, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_speaker: Option<SeatId>,
    /// Voter seat to target seat for the current voting phase.
    #[schema(value_type = Object)]
    pub votes: IndexMap<SeatId, SeatId>,
    /// Number of votes on record.
    pub voted_count: usize,
    /// Role currently acting at night, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_current_role: Option<Role>,
    /// Night roles already done (or skipped) this night.
    pub night_completed: Vec<Role>,
    /// Seats of the acting role that already submitted tonight.
    pub night_acted_seats: Vec<SeatId>,
    /// Narrator announcement waiting to be consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_announcement: Option<Announcement>,
    /// Most recent settlement death.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dead_player: Option<DeadPlayer>,
}

impl StateSnapshot {
    /// Project the authoritative session into its wire snapshot.
    pub fn from_session(session: &Session, now: Instant) -> Self {
        Self {
            room_id: session.room_id.clone(),
            phase: session.phase,
            result: session.result,
            round: session.round,
            phase_version: session.phase_version,
            phase_time_left: session.phase_time_left(now),
            alive_players: session.alive_seats(),
            dead_players: session.dead_seats(),
            human_seat: session.human_seat,
            roles_by_seat: session.seats.iter().map(|(id, seat)| (*id, seat.role)).collect(),
            speaking_order: session.speaking_order.clone(),
            current_speaker_index: session.current_speaker_index,
            current_speaker: session.current_speaker(),
            votes: session.votes.clone(),
            voted_count: session.votes.len(),
            night_current_role: session.night.current_role,
            night_completed: session.night.completed.clone(),
            night_acted_seats: session.night_acted_seats(),
            pending_announcement: session.pending_announcement.clone(),
            last_dead_player: session.last_dead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::rotation::MAX_SPEECH_CHARS;

    #[test]
    fn speech_requests_enforce_the_character_cap() {
        let ok = SubmitSpeechRequest { seat: 1, text: "a".repeat(MAX_SPEECH_CHARS) };
        assert!(ok.validate().is_ok());
        let too_long = SubmitSpeechRequest { seat: 1, text: "a".repeat(MAX_SPEECH_CHARS + 1) };
        assert!(too_long.validate().is_err());
        let empty = SubmitSpeechRequest { seat: 1, text: String::new() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn seat_count_bounds_are_enforced() {
        assert!(AssignRolesRequest { seat_count: 3, human_seat: 1 }.validate().is_err());
        assert!(AssignRolesRequest { seat_count: 12, human_seat: 1 }.validate().is_ok());
        assert!(AssignRolesRequest { seat_count: 19, human_seat: 1 }.validate().is_err());
    }

    #[test]
    fn snapshot_round_trips_through_the_wire_format() {
        let mut session = Session::new("room-9");
        session.install_roles(
            vec![
                crate::state::roles::Role::Werewolf,
                crate::state::roles::Role::Seer,
                crate::state::roles::Role::Witch,
                crate::state::roles::Role::Villager,
            ],
            2,
            Instant::now(),
        );
        let snapshot = StateSnapshot::from_session(&session, Instant::now());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"phase\":\"role_assigned\""));
        let back: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.phase, Phase::RoleAssigned);
        assert_eq!(back.roles_by_seat.len(), 4);
        assert_eq!(back.human_seat, 2);
        assert!(back.pending_announcement.is_some());
    }
}
