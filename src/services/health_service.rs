use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a static health payload and the in-memory room count.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.room_count())
}
