//! Dispatch trigger endpoint.
//!
//! `POST /api/dispatch/run` runs one worker pass over one batch and returns
//! the per-event outcome list plus overall counts. When
//! `DISPATCH_TRIGGER_SECRET` is configured, callers must present it in the
//! `x-dispatch-secret` header; the internal scheduler bypasses this surface
//! entirely by running the worker binary.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

use courier_common::error::AppError;
use courier_common::types::PassSummary;
use courier_worker::dispatch::DispatchEngine;
use courier_worker::transport::PostmarkTransport;

use crate::state::AppState;

/// Header carrying the shared trigger secret.
pub const TRIGGER_SECRET_HEADER: &str = "x-dispatch-secret";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/dispatch/run", post(run_dispatch))
}

/// POST /api/dispatch/run — Run one dispatch pass over one batch.
async fn run_dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PassSummary>, AppError> {
    if let Some(secret) = &state.config.trigger_secret {
        let presented = headers
            .get(TRIGGER_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            return Err(AppError::Auth(format!(
                "Missing or invalid {} header",
                TRIGGER_SECRET_HEADER
            )));
        }
    }

    let transport = PostmarkTransport::new(
        state.config.postmark_api_url.clone(),
        state
            .config
            .postmark_server_token
            .clone()
            .unwrap_or_default(),
        state.config.transport_timeout_secs,
    )
    .map_err(|e| AppError::Transport(e.to_string()))?;

    let engine = DispatchEngine::new(state.pool.clone(), transport, state.config.clone());
    let summary = engine.run_pass().await?;

    tracing::info!(
        processed = summary.processed,
        sent = summary.sent,
        skipped = summary.skipped,
        retried = summary.retried,
        failed = summary.failed,
        "Dispatch pass triggered via API"
    );

    Ok(Json(summary))
}
