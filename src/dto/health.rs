//! Health check payloads.
use serde::Serialize;
use utoipa::ToSchema;

/// Overall service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A store is installed and answered its ping.
    Ok,
    /// Running without a reachable store; every session action is refused.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service state.
    pub status: HealthStatus,
}

impl HealthResponse {
    /// Response for a healthy service.
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
        }
    }

    /// Response while running without a store.
    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let body = serde_json::to_value(HealthResponse::degraded()).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "degraded" }));
    }
}
