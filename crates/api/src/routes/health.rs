//! Health check endpoint with dispatch-queue visibility.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use courier_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health — liveness plus a snapshot of the event queue, so operators
/// can spot a backlog or stranded PROCESSING rows without a psql session.
async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (pending, processing): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'pending'),
            COUNT(*) FILTER (WHERE status = 'processing')
        FROM notification_events
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({
        "status": "ok",
        "service": "courier-api",
        "version": env!("CARGO_PKG_VERSION"),
        "queue": {
            "pending": pending,
            "processing": processing,
        }
    })))
}
