//! Dispatch engine — processes one claimed batch of notification events.
//!
//! For each event: resolve the recipient, bind the template, apply the
//! delivery-mode policy, invoke the transport and finalize the row. Every
//! finalization is scoped to the single event's row, so one event's failure
//! never blocks the rest of the batch; the pass reports a per-event result
//! list plus overall counts.

use chrono::Utc;
use sqlx::PgPool;

use courier_common::config::{AppConfig, DeliveryMode};
use courier_common::error::AppError;
use courier_common::types::{
    DispatchOutcome, EventResult, EventStatus, NotificationEvent, PassSummary,
};

use crate::transport::{OutboundEmail, Transport};
use crate::{claim, resolver, retry, template};

/// Audit header carrying the originally resolved address under
/// developer-redirect.
pub const AUDIT_HEADER: &str = "X-Original-Recipient";

/// Marker recorded on events sent under dry-run.
pub const DRY_RUN_MARKER: &str = "DRY_RUN";

/// Where a message goes after the delivery-mode policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeliveryPlan {
    /// Record SENT without contacting the transport.
    Suppress,
    Deliver {
        to: String,
        headers: Vec<(String, String)>,
    },
}

/// Apply the environment-level delivery-mode policy to a resolved address.
fn plan_delivery(config: &AppConfig, resolved: &str) -> DeliveryPlan {
    if config.dry_run {
        return DeliveryPlan::Suppress;
    }

    match config.delivery_mode {
        DeliveryMode::Production => DeliveryPlan::Deliver {
            to: resolved.to_string(),
            headers: Vec::new(),
        },
        DeliveryMode::DeveloperRedirect => match &config.dev_redirect_email {
            Some(redirect) => DeliveryPlan::Deliver {
                to: redirect.clone(),
                headers: vec![(AUDIT_HEADER.to_string(), resolved.to_string())],
            },
            // Config loading rejects this combination; fall through to the
            // resolved address rather than dropping the message.
            None => {
                tracing::warn!("developer-redirect mode without DEV_REDIRECT_EMAIL, sending to resolved address");
                DeliveryPlan::Deliver {
                    to: resolved.to_string(),
                    headers: Vec::new(),
                }
            }
        },
    }
}

/// Stateless batch dispatcher. One instance handles one or more passes; all
/// state lives in the event rows.
pub struct DispatchEngine<T: Transport> {
    pool: PgPool,
    transport: T,
    config: AppConfig,
}

impl<T: Transport> DispatchEngine<T> {
    pub fn new(pool: PgPool, transport: T, config: AppConfig) -> Self {
        Self {
            pool,
            transport,
            config,
        }
    }

    /// Run one worker pass: claim a batch and process each event in order.
    ///
    /// A claim failure aborts the pass with no state changes; failures local
    /// to one event are recorded in its result and processing continues.
    pub async fn run_pass(&self) -> Result<PassSummary, AppError> {
        let events = claim::claim_batch(&self.pool, self.config.batch_size).await?;

        let mut results = Vec::with_capacity(events.len());
        for event in &events {
            results.push(self.process_event(event).await);
        }

        let summary = PassSummary::from_results(results);
        if summary.processed > 0 {
            tracing::info!(
                processed = summary.processed,
                sent = summary.sent,
                skipped = summary.skipped,
                retried = summary.retried,
                failed = summary.failed,
                "Dispatch pass complete"
            );
        }

        Ok(summary)
    }

    /// Process one claimed event, containing any failure to its own result.
    async fn process_event(&self, event: &NotificationEvent) -> EventResult {
        match self.dispatch_event(event).await {
            Ok(result) => result,
            // Storage failure mid-event: the row stays PROCESSING for
            // operator attention; the batch keeps going.
            Err(e) => {
                tracing::error!(
                    event_id = event.id,
                    error = %e,
                    "Event finalization failed"
                );
                EventResult {
                    event_id: event.id,
                    event_type: event.event_type,
                    outcome: DispatchOutcome::Failed,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    async fn dispatch_event(&self, event: &NotificationEvent) -> Result<EventResult, sqlx::Error> {
        // 1. Resolve the recipient. No address is a data condition, not a
        //    fault: terminal SKIP without touching retry_count.
        let Some(resolved) = resolver::resolve(&self.pool, event).await? else {
            self.mark_skip(event.id, "no recipient address").await?;
            return Ok(self.result(event, DispatchOutcome::Skipped, Some("no recipient address")));
        };

        // 2. Bind the template. A missing mapping cannot self-heal through
        //    waiting: terminal ERROR, bypassing the retry controller.
        let bound = match template::bind(&self.config, event) {
            Ok(bound) => bound,
            Err(e) => {
                let reason = e.to_string();
                self.mark_error(event.id, &reason).await?;
                return Ok(self.result(event, DispatchOutcome::Failed, Some(&reason)));
            }
        };

        // 3. Delivery-mode policy.
        let (to, headers) = match plan_delivery(&self.config, &resolved) {
            DeliveryPlan::Suppress => {
                self.mark_sent(event.id, Some(DRY_RUN_MARKER)).await?;
                return Ok(self.result(event, DispatchOutcome::Sent, Some(DRY_RUN_MARKER)));
            }
            DeliveryPlan::Deliver { to, headers } => (to, headers),
        };

        // 4. Transport call.
        let email = OutboundEmail {
            from: self.config.email_from.clone(),
            to,
            template: bound.template,
            model: bound.model,
            headers,
        };

        match self.transport.send(&email).await {
            Ok(response) => {
                self.mark_sent(event.id, None).await?;
                tracing::info!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    to = %email.to,
                    status = response.status,
                    "Notification sent"
                );
                Ok(self.result(event, DispatchOutcome::Sent, None))
            }
            Err(e) => {
                let reason = e.to_string();
                match retry::handle_failure(&self.pool, event, &reason).await? {
                    retry::RetryDecision::Rescheduled { .. } => {
                        Ok(self.result(event, DispatchOutcome::Retried, Some(&reason)))
                    }
                    retry::RetryDecision::Exhausted => {
                        Ok(self.result(event, DispatchOutcome::Failed, Some(&reason)))
                    }
                }
            }
        }
    }

    fn result(
        &self,
        event: &NotificationEvent,
        outcome: DispatchOutcome,
        detail: Option<&str>,
    ) -> EventResult {
        EventResult {
            event_id: event.id,
            event_type: event.event_type,
            outcome,
            detail: detail.map(|d| d.to_string()),
        }
    }

    /// Terminal SENT. `error_message` carries the DRY_RUN marker when set.
    async fn mark_sent(&self, event_id: i64, marker: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = $1, error_message = $2, processed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(EventStatus::Sent.to_string())
        .bind(marker)
        .bind(Utc::now())
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal SKIP. Does not touch retry_count.
    async fn mark_skip(&self, event_id: i64, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = $1, error_message = $2, processed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(EventStatus::Skip.to_string())
        .bind(reason)
        .bind(Utc::now())
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(event_id, reason, "Event skipped");
        Ok(())
    }

    /// Terminal, non-retryable ERROR (configuration failures).
    async fn mark_error(&self, event_id: i64, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = $1, error_message = $2, processed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(EventStatus::Error.to_string())
        .bind(retry::truncate_error(reason))
        .bind(Utc::now())
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        tracing::error!(event_id, reason, "Event failed with non-retryable error");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(mode: DeliveryMode, dry_run: bool) -> AppConfig {
        AppConfig {
            database_url: "unused".to_string(),
            db_max_connections: 5,
            db_acquire_timeout_secs: 5,
            batch_size: 25,
            poll_interval_ms: 30_000,
            email_from: "noreply@example.com".to_string(),
            postmark_server_token: Some("token".to_string()),
            postmark_api_url: "http://unused".to_string(),
            delivery_mode: mode,
            dry_run,
            dev_redirect_email: Some("dev@x.com".to_string()),
            trigger_secret: None,
            app_base_url: "https://app.example.com".to_string(),
            template_new_lead: Some("1".to_string()),
            template_new_review: None,
            template_client_confirmation: None,
            transport_timeout_secs: 10,
        }
    }

    #[test]
    fn test_production_mode_uses_resolved_address() {
        let config = test_config(DeliveryMode::Production, false);
        let plan = plan_delivery(&config, "a@x.com");
        assert_eq!(
            plan,
            DeliveryPlan::Deliver {
                to: "a@x.com".to_string(),
                headers: Vec::new(),
            }
        );
    }

    #[test]
    fn test_redirect_mode_swaps_address_and_keeps_audit_header() {
        let config = test_config(DeliveryMode::DeveloperRedirect, false);
        let plan = plan_delivery(&config, "a@x.com");
        assert_eq!(
            plan,
            DeliveryPlan::Deliver {
                to: "dev@x.com".to_string(),
                headers: vec![(AUDIT_HEADER.to_string(), "a@x.com".to_string())],
            }
        );
    }

    #[test]
    fn test_dry_run_suppresses_delivery_in_any_mode() {
        let config = test_config(DeliveryMode::Production, true);
        assert_eq!(plan_delivery(&config, "a@x.com"), DeliveryPlan::Suppress);

        let config = test_config(DeliveryMode::DeveloperRedirect, true);
        assert_eq!(plan_delivery(&config, "a@x.com"), DeliveryPlan::Suppress);
    }
}
