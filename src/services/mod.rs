/// Session lookup and participant checks.
pub mod access;
/// Answer collection and per-answer resolution triggers.
pub mod answer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Final and live standings.
pub mod ranking_service;
/// Room event payloads, pushes and resync views.
pub mod room_events;
/// Round dispatch, resolution, completion and startup recovery.
pub mod round_service;
/// Session creation, roster changes and start.
pub mod session_service;
/// Storage connection supervisor with degraded-mode handling.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
