/// Agent generation collaborator (speech, night actions, votes).
pub mod agent_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Session authority operations for a room.
pub mod room_service;
