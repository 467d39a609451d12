use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::app::AppContext;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// Handler for the `/health` endpoint.
///
/// A limiter running on fallback counters degrades but does not fail the
/// probe: requests are still served, only cross-process limit sharing is
/// suspended.
pub async fn health_handler(State(ctx): State<AppContext>) -> HealthResponse {
    let mut checks = Vec::new();

    let store_up = ctx.store.ping().await;
    checks.push(ComponentHealth {
        name: "store".to_string(),
        status: if store_up {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        message: None,
    });

    checks.push(ComponentHealth {
        name: "mailer".to_string(),
        status: if ctx.mailer.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        message: None,
    });

    let degraded = ctx.rate_limiter.is_degraded();
    checks.push(ComponentHealth {
        name: "rate_limit_store".to_string(),
        status: if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
        message: degraded.then(|| "running on in-process fallback counters".to_string()),
    });

    let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthResponse {
        ok: status != HealthStatus::Unhealthy,
        status,
        checks,
    }
}
