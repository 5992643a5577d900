use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        common::Envelope,
        game::{
            Ack, AdvancePhaseResponse, AdvanceSpeakerResponse, AgentActionRequest,
            AgentActionResponse, AgentSpeechRequest, AgentSpeechResponse, AgentVoteRequest,
            AssignRolesRequest, AssignRolesResponse, MessagesQuery, MessagesResponse,
            NightActionAck, NightActionRequest, SpeechAck, StateSnapshot, SubmitSpeechRequest,
            SubmitVoteRequest, VoteAck,
        },
    },
    error::AppError,
    services::{agent_service, room_service},
    state::SharedState,
};

/// Routes implementing the session authority surface for one room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/assign-roles", post(assign_roles))
        .route("/rooms/{room_id}/state", get(get_state))
        .route("/rooms/{room_id}/start-round", post(start_round))
        .route("/rooms/{room_id}/speech", post(submit_speech))
        .route("/rooms/{room_id}/advance-speaker", post(advance_speaker))
        .route("/rooms/{room_id}/vote", post(submit_vote))
        .route("/rooms/{room_id}/night-action", post(submit_night_action))
        .route("/rooms/{room_id}/complete-announcement", post(complete_announcement))
        .route("/rooms/{room_id}/agent-speech", post(agent_speech))
        .route("/rooms/{room_id}/agent-action", post(agent_action))
        .route("/rooms/{room_id}/agent-vote", post(agent_vote))
        .route("/rooms/{room_id}/messages", get(get_messages))
}

/// Deal roles into a room, creating the room on first use.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/assign-roles",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Roles assigned", body = AssignRolesResponse),
        (status = 409, description = "Roles already assigned")
    )
)]
pub async fn assign_roles(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<AssignRolesRequest>>,
) -> Result<Json<Envelope<AssignRolesResponse>>, AppError> {
    let response = room_service::assign_roles(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(response)))
}

/// Full authoritative snapshot of the room's session.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/state",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Session snapshot", body = StateSnapshot),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_state(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<StateSnapshot>>, AppError> {
    let snapshot = room_service::get_state(&state, &room_id).await?;
    Ok(Json(Envelope::ok(snapshot)))
}

/// Conditionally advance the room's phase (idempotent).
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/start-round",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current or newly entered phase", body = AdvancePhaseResponse)
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<AdvancePhaseResponse>>, AppError> {
    let response = room_service::advance_phase(&state, &room_id).await?;
    Ok(Json(Envelope::ok(response)))
}

/// Record a speech for a seat.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/speech",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = SubmitSpeechRequest,
    responses((status = 200, description = "Speech recorded", body = SpeechAck))
)]
pub async fn submit_speech(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitSpeechRequest>>,
) -> Result<Json<Envelope<SpeechAck>>, AppError> {
    let ack = room_service::submit_speech(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(ack)))
}

/// Advance the speaker cursor.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/advance-speaker",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "New current speaker", body = AdvanceSpeakerResponse))
)]
pub async fn advance_speaker(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<AdvanceSpeakerResponse>>, AppError> {
    let response = room_service::advance_speaker(&state, &room_id).await?;
    Ok(Json(Envelope::ok(response)))
}

/// Cast (or overwrite) a vote.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/vote",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = SubmitVoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteAck),
        (status = 400, description = "Invalid target or dead voter")
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitVoteRequest>>,
) -> Result<Json<Envelope<VoteAck>>, AppError> {
    let ack = room_service::submit_vote(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(ack)))
}

/// Submit a night action for the currently acting role.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/night-action",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = NightActionRequest,
    responses(
        (status = 200, description = "Action recorded", body = NightActionAck),
        (status = 400, description = "Out of turn or invalid target")
    )
)]
pub async fn submit_night_action(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<NightActionRequest>>,
) -> Result<Json<Envelope<NightActionAck>>, AppError> {
    let ack = room_service::submit_night_action(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(ack)))
}

/// Consume the pending narrator announcement (idempotent).
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/complete-announcement",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "Announcement cleared", body = Ack))
)]
pub async fn complete_announcement(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<Ack>>, AppError> {
    let ack = room_service::complete_announcement(&state, &room_id).await?;
    Ok(Json(Envelope::ok(ack)))
}

/// Generate a speech line for an agent seat.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/agent-speech",
    tag = "agent",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = AgentSpeechRequest,
    responses((status = 200, description = "Generated speech", body = AgentSpeechResponse))
)]
pub async fn agent_speech(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<AgentSpeechRequest>>,
) -> Result<Json<Envelope<AgentSpeechResponse>>, AppError> {
    let response = agent_service::agent_speech(&state, &room_id, payload.seat).await?;
    Ok(Json(Envelope::ok(response)))
}

/// Generate a night action decision for an agent seat.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/agent-action",
    tag = "agent",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = AgentActionRequest,
    responses((status = 200, description = "Generated action", body = AgentActionResponse))
)]
pub async fn agent_action(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<AgentActionRequest>>,
) -> Result<Json<Envelope<AgentActionResponse>>, AppError> {
    let response = agent_service::agent_action(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(response)))
}

/// Decide and cast a vote for an agent seat.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/agent-vote",
    tag = "agent",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = AgentVoteRequest,
    responses((status = 200, description = "Vote cast", body = VoteAck))
)]
pub async fn agent_vote(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<AgentVoteRequest>>,
) -> Result<Json<Envelope<VoteAck>>, AppError> {
    let ack = agent_service::agent_vote(&state, &room_id, payload).await?;
    Ok(Json(Envelope::ok(ack)))
}

/// Read the game log after an optional cursor.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/messages",
    tag = "game",
    params(
        ("room_id" = String, Path, description = "Room identifier"),
        MessagesQuery
    ),
    responses((status = 200, description = "Log entries", body = MessagesResponse))
)]
pub async fn get_messages(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Envelope<MessagesResponse>>, AppError> {
    let response = room_service::get_messages(&state, &room_id, query.after).await?;
    Ok(Json(Envelope::ok(response)))
}
