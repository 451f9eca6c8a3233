/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match log recording and listing.
pub mod match_service;
/// Player registry of a session.
pub mod player_service;
/// Session lifecycle, join codes and timer view.
pub mod session_service;
/// Record store connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
