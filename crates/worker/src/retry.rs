//! Retry/backoff controller for transport-layer failures.
//!
//! A recoverable failure reschedules the event as PENDING with exponential
//! backoff; once the retry budget is exhausted the event is terminally
//! ERROR and requires operator intervention. Configuration and resolution
//! failures never reach this controller — waiting cannot change their
//! outcome.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use courier_common::types::{EventStatus, NotificationEvent};

/// Maximum number of retries before an event is terminally failed.
pub const RETRY_BUDGET: i32 = 5;

/// Backoff ceiling in minutes.
pub const BACKOFF_CAP_MINUTES: i64 = 60;

/// Longest error message persisted on an event row.
pub const MAX_ERROR_LEN: usize = 500;

/// Outcome of routing a failure through the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Rescheduled as PENDING, eligible again at the given time.
    Rescheduled { next_attempt_at: DateTime<Utc> },
    /// Retry budget exhausted — terminally failed.
    Exhausted,
}

/// Exponential backoff delay for the given retry count:
/// `min(2^(retry_count + 1) minutes, 60 minutes)`.
///
/// Takes the count before the reschedule increments it, so the reachable
/// delays are 2, 4, 8, 16 and 32 minutes; the cap bounds the formula for
/// counts past the retry budget.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let exponent = (retry_count + 1).clamp(1, 30) as u32;
    let minutes = 2i64.saturating_pow(exponent).min(BACKOFF_CAP_MINUTES);
    Duration::minutes(minutes)
}

/// Truncate a failure reason to the persisted bound, on a char boundary.
pub fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Route a transport failure for a claimed event.
///
/// Under budget the event returns to PENDING with `retry_count` incremented
/// and `next_attempt_at` pushed out by the backoff delay; over budget it is
/// marked ERROR with `processed_at` set and the last failure reason kept.
pub async fn handle_failure(
    pool: &PgPool,
    event: &NotificationEvent,
    reason: &str,
) -> Result<RetryDecision, sqlx::Error> {
    let reason = truncate_error(reason);
    let now = Utc::now();

    if event.retry_count < RETRY_BUDGET {
        let next_attempt_at = now + backoff_delay(event.retry_count);

        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = $1, retry_count = retry_count + 1,
                next_attempt_at = $2, error_message = $3
            WHERE id = $4
            "#,
        )
        .bind(EventStatus::Pending.to_string())
        .bind(next_attempt_at)
        .bind(&reason)
        .bind(event.id)
        .execute(pool)
        .await?;

        tracing::warn!(
            event_id = event.id,
            retry_count = event.retry_count + 1,
            next_attempt_at = %next_attempt_at,
            error = %reason,
            "Dispatch failed, retry scheduled"
        );

        Ok(RetryDecision::Rescheduled { next_attempt_at })
    } else {
        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = $1, error_message = $2, processed_at = $3
            WHERE id = $4
            "#,
        )
        .bind(EventStatus::Error.to_string())
        .bind(&reason)
        .bind(now)
        .bind(event.id)
        .execute(pool)
        .await?;

        tracing::error!(
            event_id = event.id,
            retry_count = event.retry_count,
            error = %reason,
            "Retry budget exhausted, event permanently failed"
        );

        Ok(RetryDecision::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_retry() {
        assert_eq!(backoff_delay(0), Duration::minutes(2));
        assert_eq!(backoff_delay(1), Duration::minutes(4));
        assert_eq!(backoff_delay(2), Duration::minutes(8));
        assert_eq!(backoff_delay(3), Duration::minutes(16));
        assert_eq!(backoff_delay(4), Duration::minutes(32));
    }

    #[test]
    fn test_backoff_capped_at_one_hour() {
        assert_eq!(backoff_delay(5), Duration::minutes(60));
        assert_eq!(backoff_delay(10), Duration::minutes(60));
        assert_eq!(backoff_delay(100), Duration::minutes(60));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let mut previous = Duration::zero();
        for retry_count in 0..8 {
            let delay = backoff_delay(retry_count);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_truncate_error_short_message_untouched() {
        assert_eq!(truncate_error("connection refused"), "connection refused");
    }

    #[test]
    fn test_truncate_error_bounds_long_message() {
        let long = "x".repeat(2000);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.len(), MAX_ERROR_LEN);
    }

    #[test]
    fn test_truncate_error_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_LEN);
    }
}
