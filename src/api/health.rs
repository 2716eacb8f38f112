/// Health check endpoint
///
/// Reports liveness plus a database round-trip. The response is always
/// 200 so load balancers read `status` rather than the transport code.
use crate::{context::AppContext, db};
use axum::{extract::State, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

/// Health status of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(ctx): State<AppContext>) -> Json<HealthStatus> {
    let database = check_database(&ctx).await;
    let status = if database.status == "healthy" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: ctx.config.service.version.clone(),
        checks: vec![database],
    })
}

/// Check database connectivity
async fn check_database(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match db::test_connection(&ctx.db).await {
        Ok(()) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            ComponentHealth {
                name: "database".to_string(),
                status: "unhealthy".to_string(),
                response_time_ms: None,
                error: Some(e.to_string()),
            }
        }
    }
}
