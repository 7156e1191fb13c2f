//! Unauthenticated endpoints for checking that the service is up.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::AppState;

/// The state needed to check database connectivity.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// The database connection to check.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that reports the service name and version.
pub async fn root_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// A route handler that checks the database is reachable.
///
/// Returns 200 with a timestamp when the database answers a trivial query,
/// 500 otherwise.
pub async fn health_endpoint(State(state): State<HealthState>) -> Response {
    let database_ok = match state.db_connection.lock() {
        Ok(connection) => connection
            .query_row("SELECT 1", (), |row| row.get::<_, i64>(0))
            .is_ok(),
        Err(_) => false,
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = Json(json!({
        "status": if database_ok { "ok" } else { "unavailable" },
        "database": if database_ok { "ok" } else { "unreachable" },
        "timestamp": OffsetDateTime::now_utc().to_string(),
    }));

    (status, body).into_response()
}
