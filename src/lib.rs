//! Library crate for quiz-arena-back: the multiplayer trivia session engine, exposed for the
//! server binary, the OpenAPI generator and integration tests.

/// Timing configuration loaded at startup.
pub mod config;
/// Persistence models and session stores.
pub mod dao;
/// Wire types for REST, WebSocket and room events.
pub mod dto;
/// Error taxonomy and HTTP mapping.
pub mod error;
/// Request extractors such as the caller identity.
pub mod extractors;
/// HTTP and WebSocket route trees.
pub mod routes;
/// Engine operations behind the routes.
pub mod services;
/// Shared application state and in-process registries.
pub mod state;
