//! Claim manager — atomically assigns a batch of pending events to one
//! worker pass.
//!
//! The claim is a single `UPDATE … WHERE id IN (SELECT … FOR UPDATE SKIP
//! LOCKED) RETURNING *` statement, so two concurrent passes never receive
//! overlapping rows. This is the load-bearing correctness mechanism: delivery
//! safety rests on claim atomicity, not on sender-side deduplication.
//!
//! There is no automatic reclaim: a pass that dies after claiming leaves its
//! rows PROCESSING, invisible to later claims until an operator resets them
//! to PENDING. The health endpoint surfaces the PROCESSING count for exactly
//! this situation.

use chrono::Utc;
use sqlx::PgPool;

use courier_common::types::{EventStatus, NotificationEvent};

/// Claim up to `batch_size` eligible events, oldest first, flipping them to
/// PROCESSING and returning the full rows.
///
/// An event is eligible when it is PENDING and `next_attempt_at` is null or
/// in the past. If the claim statement itself fails the whole pass aborts
/// with no partial state to clean up.
pub async fn claim_batch(
    pool: &PgPool,
    batch_size: i64,
) -> Result<Vec<NotificationEvent>, sqlx::Error> {
    let now = Utc::now();

    let events: Vec<NotificationEvent> = sqlx::query_as(
        r#"
        UPDATE notification_events
        SET status = $1
        WHERE id IN (
            SELECT id FROM notification_events
            WHERE status = $2
              AND (next_attempt_at IS NULL OR next_attempt_at <= $3)
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, event_type, entity_type, entity_id, payload,
                  recipient_type, recipient_ref, coach_id, status, retry_count,
                  next_attempt_at, error_message, created_at, processed_at
        "#,
    )
    .bind(EventStatus::Processing.to_string())
    .bind(EventStatus::Pending.to_string())
    .bind(now)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    if !events.is_empty() {
        tracing::debug!(claimed = events.len(), "Claimed events for dispatch");
    }

    Ok(events)
}
