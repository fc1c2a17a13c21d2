//! Health check endpoints

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::db::DbPool;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub database: CheckResult,
    pub catalog: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn empty() -> Self {
        Self {
            status: "empty",
            message: Some("no products in stock".to_string()),
        }
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can the catalog be queried?
async fn ready(State(db): State<DbPool>) -> (StatusCode, Json<ReadinessResponse>) {
    let (database, catalog) = check_catalog(&db);

    // an empty catalog is served as-is; only a broken database is fatal
    let all_ok = database.status == "ok";
    let status = if all_ok { "ok" } else { "degraded" };
    let http_status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks { database, catalog },
        }),
    )
}

/// Check database connectivity and whether anything is in stock
fn check_catalog(db: &DbPool) -> (CheckResult, CheckResult) {
    let conn = match db.get() {
        Ok(conn) => conn,
        Err(e) => {
            return (
                CheckResult::fail(format!("connection failed: {e}")),
                CheckResult::fail("database unavailable"),
            );
        }
    };

    match conn.query_row("SELECT COUNT(*) FROM products WHERE stock > 0", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(0) => (CheckResult::ok(), CheckResult::empty()),
        Ok(_) => (CheckResult::ok(), CheckResult::ok()),
        Err(e) => (
            CheckResult::fail(format!("query failed: {e}")),
            CheckResult::fail("database unavailable"),
        ),
    }
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs the pool for checks)
pub fn ready_router(db: DbPool) -> Router {
    Router::new().route("/ready", get(ready)).with_state(db)
}
