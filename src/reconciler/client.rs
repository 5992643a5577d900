//! Boundary between the reconciler and the session authority.
//!
//! The reconciler only ever talks through [`Authority`]; whether the calls
//! cross the network ([`HttpAuthority`]) or land on an in-process room
//! registry ([`LocalAuthority`]) is invisible to the polling loop.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    dto::{
        common::{Envelope, EnvelopeError},
        game::{
            AdvancePhaseResponse, AdvanceSpeakerResponse, AgentActionRequest, AgentActionResponse,
            AgentSpeechRequest, AgentSpeechResponse, AgentVoteRequest, AssignRolesRequest,
            AssignRolesResponse, NightActionAck, NightActionRequest, SpeechAck, StateSnapshot,
            SubmitSpeechRequest, SubmitVoteRequest, VoteAck,
        },
    },
    error::{AppError, ServiceError},
    services::{agent_service, room_service},
    state::{SharedState, roles::SeatId},
};

/// Bounded timeout applied to every authority round-trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result alias for authority calls.
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Failures a reconciler can observe when talking to the authority.
#[derive(Debug, Clone, Error)]
pub enum AuthorityError {
    /// The authority rejected the request (protocol error, no state change).
    #[error("authority rejected the request ({code}): {message}")]
    Rejected {
        /// Envelope status code.
        code: u16,
        /// Envelope message.
        message: String,
    },
    /// Transport-level failure, always safe to retry on the next tick.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Success envelope arrived without a payload.
    #[error("success envelope missing its data payload")]
    MissingData,
}

impl From<EnvelopeError> for AuthorityError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Rejected { code, message } => AuthorityError::Rejected { code, message },
            EnvelopeError::MissingData => AuthorityError::MissingData,
        }
    }
}

impl From<ServiceError> for AuthorityError {
    fn from(err: ServiceError) -> Self {
        // Reuse the HTTP mapping so local and remote rejections look alike.
        match AppError::from(err) {
            AppError::BadRequest(message) => AuthorityError::Rejected { code: 400, message },
            AppError::NotFound(message) => AuthorityError::Rejected { code: 404, message },
            AppError::Conflict(message) => AuthorityError::Rejected { code: 409, message },
            AppError::Internal(message) => AuthorityError::Rejected { code: 500, message },
        }
    }
}

/// Operations the session authority (and its collaborators) expose to a
/// polling client. Dyn-safe so the reconciler can hold `Arc<dyn Authority>`.
pub trait Authority: Send + Sync {
    /// Deal roles into a room.
    fn assign_roles(
        &self,
        room: &str,
        request: AssignRolesRequest,
    ) -> BoxFuture<'static, AuthorityResult<AssignRolesResponse>>;
    /// Fetch the full session snapshot.
    fn get_state(&self, room: &str) -> BoxFuture<'static, AuthorityResult<StateSnapshot>>;
    /// Conditionally advance the phase.
    fn advance_phase(&self, room: &str)
    -> BoxFuture<'static, AuthorityResult<AdvancePhaseResponse>>;
    /// Record a speech for a seat.
    fn submit_speech(
        &self,
        room: &str,
        request: SubmitSpeechRequest,
    ) -> BoxFuture<'static, AuthorityResult<SpeechAck>>;
    /// Advance the speaker cursor.
    fn advance_speaker(
        &self,
        room: &str,
    ) -> BoxFuture<'static, AuthorityResult<AdvanceSpeakerResponse>>;
    /// Cast (or overwrite) a vote.
    fn submit_vote(
        &self,
        room: &str,
        request: SubmitVoteRequest,
    ) -> BoxFuture<'static, AuthorityResult<VoteAck>>;
    /// Submit a night action.
    fn submit_night_action(
        &self,
        room: &str,
        request: NightActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<NightActionAck>>;
    /// Consume the pending announcement (idempotent).
    fn complete_announcement(&self, room: &str) -> BoxFuture<'static, AuthorityResult<()>>;
    /// Ask the generation collaborator for an agent's speech.
    fn agent_speech(
        &self,
        room: &str,
        seat: SeatId,
    ) -> BoxFuture<'static, AuthorityResult<AgentSpeechResponse>>;
    /// Ask the generation collaborator for an agent's night action.
    fn agent_action(
        &self,
        room: &str,
        request: AgentActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<AgentActionResponse>>;
    /// Ask the authority to decide and cast an agent's vote.
    fn agent_vote(&self, room: &str, seat: SeatId)
    -> BoxFuture<'static, AuthorityResult<VoteAck>>;
}

/// HTTP implementation of [`Authority`] speaking the envelope protocol.
#[derive(Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthority {
    /// Build a client for an authority reachable at `base_url`
    /// (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> AuthorityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AuthorityError::Transport(err.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }

    fn url(&self, room: &str, op: &str) -> String {
        format!("{}/rooms/{}/{}", self.base_url, room, op)
    }

    /// POST `body` and unwrap the envelope. Error-status responses still
    /// carry the envelope shape, so the unwrap path is a single branch on
    /// the envelope code.
    async fn post<B, T>(client: reqwest::Client, url: String, body: B) -> AuthorityResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AuthorityError::Transport(err.to_string()))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| AuthorityError::Transport(err.to_string()))?;
        Ok(envelope.into_data()?)
    }

    async fn get<T>(client: reqwest::Client, url: String) -> AuthorityResult<T>
    where
        T: DeserializeOwned,
    {
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|err| AuthorityError::Transport(err.to_string()))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| AuthorityError::Transport(err.to_string()))?;
        Ok(envelope.into_data()?)
    }
}

impl Authority for HttpAuthority {
    fn assign_roles(
        &self,
        room: &str,
        request: AssignRolesRequest,
    ) -> BoxFuture<'static, AuthorityResult<AssignRolesResponse>> {
        let (client, url) = (self.client.clone(), self.url(room, "assign-roles"));
        Box::pin(Self::post(client, url, request))
    }

    fn get_state(&self, room: &str) -> BoxFuture<'static, AuthorityResult<StateSnapshot>> {
        let (client, url) = (self.client.clone(), self.url(room, "state"));
        Box::pin(Self::get(client, url))
    }

    fn advance_phase(
        &self,
        room: &str,
    ) -> BoxFuture<'static, AuthorityResult<AdvancePhaseResponse>> {
        let (client, url) = (self.client.clone(), self.url(room, "start-round"));
        Box::pin(Self::post(client, url, serde_json::json!({})))
    }

    fn submit_speech(
        &self,
        room: &str,
        request: SubmitSpeechRequest,
    ) -> BoxFuture<'static, AuthorityResult<SpeechAck>> {
        let (client, url) = (self.client.clone(), self.url(room, "speech"));
        Box::pin(Self::post(client, url, request))
    }

    fn advance_speaker(
        &self,
        room: &str,
    ) -> BoxFuture<'static, AuthorityResult<AdvanceSpeakerResponse>> {
        let (client, url) = (self.client.clone(), self.url(room, "advance-speaker"));
        Box::pin(Self::post(client, url, serde_json::json!({})))
    }

    fn submit_vote(
        &self,
        room: &str,
        request: SubmitVoteRequest,
    ) -> BoxFuture<'static, AuthorityResult<VoteAck>> {
        let (client, url) = (self.client.clone(), self.url(room, "vote"));
        Box::pin(Self::post(client, url, request))
    }

    fn submit_night_action(
        &self,
        room: &str,
        request: NightActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<NightActionAck>> {
        let (client, url) = (self.client.clone(), self.url(room, "night-action"));
        Box::pin(Self::post(client, url, request))
    }

    fn complete_announcement(&self, room: &str) -> BoxFuture<'static, AuthorityResult<()>> {
        let (client, url) = (self.client.clone(), self.url(room, "complete-announcement"));
        Box::pin(async move {
            let _: crate::dto::game::Ack =
                Self::post(client, url, serde_json::json!({})).await?;
            Ok(())
        })
    }

    fn agent_speech(
        &self,
        room: &str,
        seat: SeatId,
    ) -> BoxFuture<'static, AuthorityResult<AgentSpeechResponse>> {
        let (client, url) = (self.client.clone(), self.url(room, "agent-speech"));
        Box::pin(Self::post(client, url, AgentSpeechRequest { seat }))
    }

    fn agent_action(
        &self,
        room: &str,
        request: AgentActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<AgentActionResponse>> {
        let (client, url) = (self.client.clone(), self.url(room, "agent-action"));
        Box::pin(Self::post(client, url, request))
    }

    fn agent_vote(
        &self,
        room: &str,
        seat: SeatId,
    ) -> BoxFuture<'static, AuthorityResult<VoteAck>> {
        let (client, url) = (self.client.clone(), self.url(room, "agent-vote"));
        Box::pin(Self::post(client, url, AgentVoteRequest { seat }))
    }
}

/// In-process implementation of [`Authority`] over a shared room registry.
///
/// The same service functions the HTTP routes call, minus the transport.
/// Used by the integration tests and by embedded single-process setups.
#[derive(Clone)]
pub struct LocalAuthority {
    state: SharedState,
}

impl LocalAuthority {
    /// Wrap a shared room registry.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl Authority for LocalAuthority {
    fn assign_roles(
        &self,
        room: &str,
        request: AssignRolesRequest,
    ) -> BoxFuture<'static, AuthorityResult<AssignRolesResponse>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::assign_roles(&state, &room, request).await.map_err(Into::into)
        })
    }

    fn get_state(&self, room: &str) -> BoxFuture<'static, AuthorityResult<StateSnapshot>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move { room_service::get_state(&state, &room).await.map_err(Into::into) })
    }

    fn advance_phase(
        &self,
        room: &str,
    ) -> BoxFuture<'static, AuthorityResult<AdvancePhaseResponse>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::advance_phase(&state, &room).await.map_err(Into::into)
        })
    }

    fn submit_speech(
        &self,
        room: &str,
        request: SubmitSpeechRequest,
    ) -> BoxFuture<'static, AuthorityResult<SpeechAck>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::submit_speech(&state, &room, request).await.map_err(Into::into)
        })
    }

    fn advance_speaker(
        &self,
        room: &str,
    ) -> BoxFuture<'static, AuthorityResult<AdvanceSpeakerResponse>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::advance_speaker(&state, &room).await.map_err(Into::into)
        })
    }

    fn submit_vote(
        &self,
        room: &str,
        request: SubmitVoteRequest,
    ) -> BoxFuture<'static, AuthorityResult<VoteAck>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::submit_vote(&state, &room, request).await.map_err(Into::into)
        })
    }

    fn submit_night_action(
        &self,
        room: &str,
        request: NightActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<NightActionAck>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::submit_night_action(&state, &room, request).await.map_err(Into::into)
        })
    }

    fn complete_announcement(&self, room: &str) -> BoxFuture<'static, AuthorityResult<()>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            room_service::complete_announcement(&state, &room)
                .await
                .map(|_| ())
                .map_err(Into::into)
        })
    }

    fn agent_speech(
        &self,
        room: &str,
        seat: SeatId,
    ) -> BoxFuture<'static, AuthorityResult<AgentSpeechResponse>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            agent_service::agent_speech(&state, &room, seat).await.map_err(Into::into)
        })
    }

    fn agent_action(
        &self,
        room: &str,
        request: AgentActionRequest,
    ) -> BoxFuture<'static, AuthorityResult<AgentActionResponse>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            agent_service::agent_action(&state, &room, request).await.map_err(Into::into)
        })
    }

    fn agent_vote(
        &self,
        room: &str,
        seat: SeatId,
    ) -> BoxFuture<'static, AuthorityResult<VoteAck>> {
        let (state, room) = (self.state.clone(), room.to_owned());
        Box::pin(async move {
            agent_service::agent_vote(&state, &room, AgentVoteRequest { seat })
                .await
                .map_err(Into::into)
        })
    }
}
