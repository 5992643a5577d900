use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Moonhollow Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::assign_roles,
        crate::routes::game::get_state,
        crate::routes::game::start_round,
        crate::routes::game::submit_speech,
        crate::routes::game::advance_speaker,
        crate::routes::game::submit_vote,
        crate::routes::game::submit_night_action,
        crate::routes::game::complete_announcement,
        crate::routes::game::agent_speech,
        crate::routes::game::agent_action,
        crate::routes::game::agent_vote,
        crate::routes::game::get_messages,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::AssignRolesRequest,
            crate::dto::game::AssignRolesResponse,
            crate::dto::game::AdvancePhaseResponse,
            crate::dto::game::SubmitSpeechRequest,
            crate::dto::game::SpeechAck,
            crate::dto::game::AdvanceSpeakerResponse,
            crate::dto::game::SubmitVoteRequest,
            crate::dto::game::VoteAck,
            crate::dto::game::NightActionRequest,
            crate::dto::game::NightActionAck,
            crate::dto::game::Ack,
            crate::dto::game::AgentSpeechRequest,
            crate::dto::game::AgentSpeechResponse,
            crate::dto::game::AgentActionRequest,
            crate::dto::game::AgentActionResponse,
            crate::dto::game::AgentVoteRequest,
            crate::dto::game::GameMessageDto,
            crate::dto::game::MessagesResponse,
            crate::dto::game::StateSnapshot,
            crate::state::roles::Role,
            crate::state::roles::Controller,
            crate::state::rotation::NightActionKind,
            crate::state::session::Announcement,
            crate::state::session::AnnouncementKind,
            crate::state::session::GameMessageBody,
            crate::state::state_machine::Phase,
            crate::state::state_machine::GameResult,
            crate::state::state_machine::KilledBy,
            crate::state::state_machine::DeadPlayer,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Session authority operations for a room"),
        (name = "agent", description = "Agent generation collaborator"),
    )
)]
pub struct ApiDoc;
