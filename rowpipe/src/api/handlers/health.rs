//! `GET /health` (§6, §7): the external liveness contract — 200 iff the
//! database is reachable, with a body enumerating subsystem status, via a
//! plain `SELECT 1` health-check.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
struct HealthBody {
    database: &'static str,
    queue: &'static str,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthBody>) {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            "down"
        }
    };

    // The external task broker (`queue.url`) is accepted for forward
    // compatibility only (§5); the in-process worker pool has no separate
    // reachability check, so "unconfigured" just reflects that setting.
    let queue = if state.config.queue.url.is_some() { "ok" } else { "unconfigured" };

    let status = if database == "ok" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(HealthBody { database, queue }))
}
