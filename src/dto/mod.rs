use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Outbound room events and rankings.
pub mod events;
/// Health check payloads.
pub mod health;
/// Session requests and summaries.
pub mod session;
/// Custom request validators.
pub mod validation;
/// Inbound WebSocket messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
