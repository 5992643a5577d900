//! Canned generation collaborator for agent seats.
//!
//! Speech, votes, and night actions for AI seats come out of this module.
//! Decisions are pure functions of the visible context dispatched on the
//! closed role enum; the polling client never decides anything itself.

use std::time::Instant;

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::{
    dto::game::{
        AgentActionRequest, AgentActionResponse, AgentSpeechResponse, AgentVoteRequest, VoteAck,
    },
    error::ServiceError,
    services::room_service,
    state::{
        SharedState,
        roles::{Role, SeatId},
        rotation::NightActionKind,
        state_machine::Phase,
    },
};

/// Canned day-discussion lines an agent can deliver.
const SPEECH_LIBRARY: &[&str] = &[
    "I think everyone held up fairly well this round.",
    "Something about the way a few of you phrased things feels off to me.",
    "Let's stay calm and walk through what we actually know.",
    "Based on today's discussion I think we have to exile someone.",
    "Trust each other. The wolves win when we turn on the wrong people.",
    "My gut says one of the quiet seats is hiding something.",
    "Let's just get to the vote, dragging this out helps nobody.",
    "I agree with the earlier analysis, it holds together.",
    "I want more information before I commit to a name.",
    "Whatever happens tonight, compare stories again in the morning.",
];

/// Context an agent decision is allowed to see.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    /// Fellow living werewolves (for werewolf deciders).
    pub teammates: Vec<SeatId>,
    /// Seats the seer has already checked.
    pub checked: Vec<SeatId>,
    /// The pack's pending victim, visible to the witch.
    pub pending_kill: Option<SeatId>,
    /// Whether the save potion is still unspent.
    pub save_available: bool,
    /// Whether the poison potion is still unspent.
    pub poison_available: bool,
}

/// Pick a canned speech line for an agent seat.
pub async fn agent_speech(
    state: &SharedState,
    room_id: &str,
    seat: SeatId,
) -> Result<AgentSpeechResponse, ServiceError> {
    // Room existence check only; the library needs no game state.
    let _ = room_service::get_state(state, room_id).await?;
    let text = {
        let mut rng = rand::rng();
        SPEECH_LIBRARY.choose(&mut rng).copied().unwrap_or(SPEECH_LIBRARY[0])
    };
    debug!(room = room_id, seat, "agent speech generated");
    Ok(AgentSpeechResponse { seat, text: text.to_owned() })
}

/// Decide a night action for an agent seat.
pub async fn agent_action(
    state: &SharedState,
    room_id: &str,
    request: AgentActionRequest,
) -> Result<AgentActionResponse, ServiceError> {
    let room = state
        .room(room_id)
        .ok_or_else(|| ServiceError::RoomNotFound(room_id.to_owned()))?;
    let context = {
        let session = room.session().lock().await;
        DecisionContext {
            teammates: session
                .alive_with_role(Role::Werewolf)
                .into_iter()
                .filter(|teammate| *teammate != request.seat)
                .collect(),
            checked: session.seer_checks.iter().map(|check| check.seat).collect(),
            pending_kill: session.night.pending_kill.or_else(|| {
                crate::state::rotation::plurality(&session.night.wolf_choices)
            }),
            save_available: session.witch.save,
            poison_available: session.witch.poison,
        }
    };

    let (action_type, target_seat) =
        decide_night_action(request.role, &request.available_targets, &context)?;
    debug!(room = room_id, seat = request.seat, action = ?action_type, "agent night decision");
    Ok(AgentActionResponse { seat: request.seat, action_type, target_seat })
}

/// Decide and immediately cast a vote for an agent seat.
///
/// The no-op path for an already-voted seat keeps retries harmless; the
/// poller only asks for seats the latest snapshot showed as unvoted.
pub async fn agent_vote(
    state: &SharedState,
    room_id: &str,
    request: AgentVoteRequest,
) -> Result<VoteAck, ServiceError> {
    let room = state
        .room(room_id)
        .ok_or_else(|| ServiceError::RoomNotFound(room_id.to_owned()))?;
    let decision = {
        let session = room.session().lock().await;
        if session.phase != Phase::DayVoting {
            return Err(ServiceError::Turn(
                crate::state::rotation::TurnError::WrongPhase(session.phase),
            ));
        }
        if let Some(existing) = session.votes.get(&request.seat) {
            return Ok(VoteAck { voter_seat: request.seat, target_seat: *existing });
        }
        let teammates = session.alive_with_role(Role::Werewolf);
        let is_wolf = session.seat(request.seat).is_some_and(|s| s.role == Role::Werewolf);
        let targets: Vec<SeatId> = session
            .alive_seats()
            .into_iter()
            .filter(|candidate| *candidate != request.seat)
            .collect();
        let shield: &[SeatId] = if is_wolf { &teammates } else { &[] };
        decide_vote(shield, &targets)
    };
    let Some(target) = decision else {
        return Err(ServiceError::InvalidInput("no available vote targets".into()));
    };

    room_service::submit_vote(
        state,
        room_id,
        crate::dto::game::SubmitVoteRequest { voter_seat: request.seat, target_seat: target },
    )
    .await
}

/// Pure per-role night decision.
///
/// Werewolves prefer seats outside the pack, the seer prefers seats she
/// has not checked, the witch saves the pending victim while she can and
/// occasionally poisons, otherwise declines.
pub fn decide_night_action(
    role: Role,
    available: &[SeatId],
    context: &DecisionContext,
) -> Result<(NightActionKind, Option<SeatId>), ServiceError> {
    let mut rng = rand::rng();
    match role {
        Role::Werewolf => {
            let preferred: Vec<SeatId> = available
                .iter()
                .copied()
                .filter(|seat| !context.teammates.contains(seat))
                .collect();
            let pool: &[SeatId] = if preferred.is_empty() { available } else { &preferred };
            let target = pool.choose(&mut rng).copied();
            target
                .map(|seat| (NightActionKind::Kill, Some(seat)))
                .ok_or_else(|| ServiceError::InvalidInput("no available targets".into()))
        }
        Role::Seer => {
            let unchecked: Vec<SeatId> = available
                .iter()
                .copied()
                .filter(|seat| !context.checked.contains(seat))
                .collect();
            let pool: &[SeatId] = if unchecked.is_empty() { available } else { &unchecked };
            let target = pool.choose(&mut rng).copied();
            target
                .map(|seat| (NightActionKind::Check, Some(seat)))
                .ok_or_else(|| ServiceError::InvalidInput("no available targets".into()))
        }
        Role::Witch => {
            if context.save_available && context.pending_kill.is_some() {
                return Ok((NightActionKind::Save, context.pending_kill));
            }
            if context.poison_available && !available.is_empty() && rng.random_bool(0.25) {
                return Ok((NightActionKind::Poison, available.choose(&mut rng).copied()));
            }
            // Nothing worth spending tonight.
            Ok((NightActionKind::Save, None))
        }
        Role::Villager | Role::Hunter => Err(ServiceError::InvalidInput(format!(
            "role {role:?} has no night action"
        ))),
    }
}

/// Pure vote decision: uniform over targets, with werewolves shielding
/// their own pack.
pub fn decide_vote(teammates: &[SeatId], targets: &[SeatId]) -> Option<SeatId> {
    let mut rng = rand::rng();
    let preferred: Vec<SeatId> =
        targets.iter().copied().filter(|seat| !teammates.contains(seat)).collect();
    let pool: &[SeatId] = if preferred.is_empty() { targets } else { &preferred };
    pool.choose(&mut rng).copied()
}
