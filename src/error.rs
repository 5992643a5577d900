use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dto::common::Envelope,
    state::{rotation::TurnError, state_machine::AlreadyAssigned},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The room has no session yet.
    #[error("room `{0}` not found")]
    RoomNotFound(String),
    /// Roles were already dealt for this room.
    #[error(transparent)]
    AlreadyAssigned(#[from] AlreadyAssigned),
    /// Out-of-turn or malformed game submission.
    #[error(transparent)]
    Turn(#[from] TurnError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::RoomNotFound(room) => {
                AppError::NotFound(format!("room `{room}` not found"))
            }
            ServiceError::AlreadyAssigned(inner) => AppError::Conflict(inner.to_string()),
            ServiceError::Turn(inner) => match inner {
                // Out-of-phase submissions conflict with the session state;
                // everything else is a plain bad request.
                TurnError::WrongPhase(_) => AppError::Conflict(inner.to_string()),
                _ => AppError::BadRequest(inner.to_string()),
            },
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Failures travel in the same envelope shape as successes so the
        // client boundary never branches on payload shape.
        let payload = Json(Envelope::<()>::error(status.as_u16(), self.to_string()));

        (status, payload).into_response()
    }
}
