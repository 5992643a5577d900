//! Session authority operations. Every mutation of a room's session goes
//! through one of these functions under the room's single-writer lock.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::{
    dto::{
        game::{
            Ack, AdvancePhaseResponse, AdvanceSpeakerResponse, AssignRolesRequest,
            AssignRolesResponse, GameMessageDto, MessagesResponse, NightActionAck,
            NightActionRequest, SpeechAck, StateSnapshot, SubmitSpeechRequest, SubmitVoteRequest,
            VoteAck,
        },
        validation::is_blank,
    },
    error::ServiceError,
    state::{Room, SharedState, state_machine::Phase},
};

/// Deal roles into a room, creating it on first use.
///
/// Repeat calls fail with `AlreadyAssigned` and leave the roster alone.
pub async fn assign_roles(
    state: &SharedState,
    room_id: &str,
    request: AssignRolesRequest,
) -> Result<AssignRolesResponse, ServiceError> {
    if request.human_seat == 0 || request.human_seat > request.seat_count {
        return Err(ServiceError::InvalidInput(format!(
            "human seat {} is outside 1..={}",
            request.human_seat, request.seat_count
        )));
    }

    let room = state.room_or_create(room_id);
    let roles_by_seat = {
        let mut session = room.session().lock().await;
        session.assign_roles(request.seat_count, request.human_seat, Instant::now())?
    };
    room.ensure_scheduler(state.config().timings().clone());
    room.nudge_scheduler();

    info!(room = room_id, seats = request.seat_count, "roles assigned");
    Ok(AssignRolesResponse { room_id: room_id.to_owned(), roles_by_seat })
}

/// Full session snapshot for a room.
pub async fn get_state(state: &SharedState, room_id: &str) -> Result<StateSnapshot, ServiceError> {
    let room = require_room(state, room_id)?;
    let session = room.session().lock().await;
    Ok(StateSnapshot::from_session(&session, Instant::now()))
}

/// Conditionally advance a room to its next phase.
///
/// Safe to call from any number of racing pollers: the advance only fires
/// when the current phase is complete or past its deadline, and calls from
/// `waiting` or `game_over` are no-ops reporting the current phase.
pub async fn advance_phase(
    state: &SharedState,
    room_id: &str,
) -> Result<AdvancePhaseResponse, ServiceError> {
    let room = require_room(state, room_id)?;
    let advance = {
        let mut session = room.session().lock().await;
        session.advance_phase(state.config().timings(), Instant::now())
    };
    if advance.changed {
        debug!(room = room_id, phase = ?advance.phase, "phase advanced");
        room.nudge_scheduler();
    }
    Ok(AdvancePhaseResponse { phase: advance.phase, duration_seconds: advance.duration.as_secs() })
}

/// Record one speech for a seat.
pub async fn submit_speech(
    state: &SharedState,
    room_id: &str,
    request: SubmitSpeechRequest,
) -> Result<SpeechAck, ServiceError> {
    if is_blank(&request.text) {
        return Err(ServiceError::InvalidInput("speech text must not be blank".into()));
    }
    let room = require_room(state, room_id)?;
    let mut session = room.session().lock().await;
    session.record_speech(request.seat, request.text)?;
    debug!(room = room_id, seat = request.seat, "speech recorded");
    Ok(SpeechAck { seat: request.seat })
}

/// Move the speaker cursor. Exhausting the order ends the discussion.
pub async fn advance_speaker(
    state: &SharedState,
    room_id: &str,
) -> Result<AdvanceSpeakerResponse, ServiceError> {
    let room = require_room(state, room_id)?;
    let current_speaker = {
        let mut session = room.session().lock().await;
        if session.phase != Phase::DayDiscussion {
            return Ok(AdvanceSpeakerResponse { current_speaker: None });
        }
        let next = session.advance_speaker();
        if next.is_none() {
            // Everyone has spoken, so the discussion phase is over.
            session.advance_phase(state.config().timings(), Instant::now());
        }
        next
    };
    room.nudge_scheduler();
    Ok(AdvanceSpeakerResponse { current_speaker })
}

/// Cast (or re-cast) a vote; once every alive seat has voted the phase
/// settles immediately.
pub async fn submit_vote(
    state: &SharedState,
    room_id: &str,
    request: SubmitVoteRequest,
) -> Result<VoteAck, ServiceError> {
    let room = require_room(state, room_id)?;
    {
        let mut session = room.session().lock().await;
        session.cast_vote(request.voter_seat, request.target_seat)?;
        if session.voting_complete() {
            session.advance_phase(state.config().timings(), Instant::now());
        }
    }
    room.nudge_scheduler();
    debug!(room = room_id, voter = request.voter_seat, target = request.target_seat, "vote cast");
    Ok(VoteAck { voter_seat: request.voter_seat, target_seat: request.target_seat })
}

/// Submit a night action for the currently acting role; once the rotation
/// finishes the night settles immediately.
pub async fn submit_night_action(
    state: &SharedState,
    room_id: &str,
    request: NightActionRequest,
) -> Result<NightActionAck, ServiceError> {
    let room = require_room(state, room_id)?;
    {
        let mut session = room.session().lock().await;
        session.submit_night_action(
            request.player_seat,
            request.role,
            request.action_type,
            request.target_seat,
        )?;
        if session.night.current_role.is_none() {
            session.advance_phase(state.config().timings(), Instant::now());
        }
    }
    room.nudge_scheduler();
    debug!(
        room = room_id,
        seat = request.player_seat,
        action = ?request.action_type,
        "night action recorded"
    );
    Ok(NightActionAck { action: request.action_type, target_seat: request.target_seat })
}

/// Clear the pending announcement. Idempotent: clearing an already-clear
/// flag acknowledges all the same.
pub async fn complete_announcement(
    state: &SharedState,
    room_id: &str,
) -> Result<Ack, ServiceError> {
    let room = require_room(state, room_id)?;
    let mut session = room.session().lock().await;
    session.consume_announcement();
    Ok(Ack::ok())
}

/// Game log entries after the given cursor.
pub async fn get_messages(
    state: &SharedState,
    room_id: &str,
    after: Option<u64>,
) -> Result<MessagesResponse, ServiceError> {
    let room = require_room(state, room_id)?;
    let session = room.session().lock().await;
    let cursor = after.unwrap_or(0);
    let messages = session
        .messages
        .iter()
        .filter(|message| message.seq > cursor)
        .map(GameMessageDto::from)
        .collect();
    Ok(MessagesResponse { messages })
}

fn require_room(state: &SharedState, room_id: &str) -> Result<Arc<Room>, ServiceError> {
    state.room(room_id).ok_or_else(|| ServiceError::RoomNotFound(room_id.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::AppState;

    fn request() -> AssignRolesRequest {
        AssignRolesRequest { seat_count: 6, human_seat: 2 }
    }

    #[tokio::test]
    async fn unknown_rooms_are_rejected() {
        let state = AppState::new(AppConfig::default());
        let err = get_state(&state, "nowhere").await.unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));
        let err = advance_phase(&state, "nowhere").await.unwrap_err();
        assert!(matches!(err, ServiceError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn announcement_consumption_is_idempotent() {
        let state = AppState::new(AppConfig::default());
        assign_roles(&state, "room-1", request()).await.unwrap();

        let snapshot = get_state(&state, "room-1").await.unwrap();
        assert!(snapshot.pending_announcement.is_some());

        // Two racing pollers may both try to consume; neither call errors
        // and the flag stays cleared.
        complete_announcement(&state, "room-1").await.unwrap();
        complete_announcement(&state, "room-1").await.unwrap();
        let snapshot = get_state(&state, "room-1").await.unwrap();
        assert!(snapshot.pending_announcement.is_none());
    }

    #[tokio::test]
    async fn human_seat_must_fit_the_table() {
        let state = AppState::new(AppConfig::default());
        let err = assign_roles(
            &state,
            "room-1",
            AssignRolesRequest { seat_count: 6, human_seat: 7 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn blank_speech_is_rejected_before_the_session_sees_it() {
        let state = AppState::new(AppConfig::default());
        assign_roles(&state, "room-1", request()).await.unwrap();
        advance_phase(&state, "room-1").await.unwrap();

        let err = submit_speech(
            &state,
            "room-1",
            SubmitSpeechRequest { seat: 1, text: "   ".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
