use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of business events that produce an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventType {
    NewLead,
    NewReview,
    ClientConfirmation,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::NewLead => write!(f, "new_lead"),
            EventType::NewReview => write!(f, "new_review"),
            EventType::ClientConfirmation => write!(f, "client_confirmation"),
        }
    }
}

/// Strategy used to resolve an event's recipient to a concrete address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecipientType {
    Coach,
    User,
    External,
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientType::Coach => write!(f, "coach"),
            RecipientType::User => write!(f, "user"),
            RecipientType::External => write!(f, "external"),
        }
    }
}

/// Lifecycle status of a notification event.
///
/// `Pending` is both the initial state and the retry-rescheduled state.
/// `Sent`, `Skip` and `Error` are terminal — no further transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processing,
    Sent,
    Skip,
    Error,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Processing => write!(f, "processing"),
            EventStatus::Sent => write!(f, "sent"),
            EventStatus::Skip => write!(f, "skip"),
            EventStatus::Error => write!(f, "error"),
        }
    }
}

/// A persisted notification event, appended by upstream producers and
/// consumed by the dispatch worker.
///
/// The worker writes only `status`, `retry_count`, `next_attempt_at`,
/// `error_message` and `processed_at`; everything else is immutable once
/// created.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationEvent {
    pub id: i64,
    pub event_type: EventType,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub recipient_type: Option<RecipientType>,
    pub recipient_ref: Option<String>,
    /// Legacy single-actor reference, used as a COACH fallback when the
    /// recipient fields are absent.
    pub coach_id: Option<Uuid>,
    pub status: EventStatus,
    pub retry_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A coach record — the read-only recipient store collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coach {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-event outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Skipped,
    Retried,
    Failed,
}

/// Result entry for a single event processed during a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub event_id: i64,
    pub event_type: EventType,
    pub outcome: DispatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Summary of one worker pass, returned by the trigger endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    pub processed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub retried: usize,
    pub failed: usize,
    pub results: Vec<EventResult>,
}

impl PassSummary {
    /// Fold per-event results into overall counts.
    pub fn from_results(results: Vec<EventResult>) -> Self {
        let mut summary = Self {
            processed: results.len(),
            sent: 0,
            skipped: 0,
            retried: 0,
            failed: 0,
            results,
        };
        for result in &summary.results {
            match result.outcome {
                DispatchOutcome::Sent => summary.sent += 1,
                DispatchOutcome::Skipped => summary.skipped += 1,
                DispatchOutcome::Retried => summary.retried += 1,
                DispatchOutcome::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_outcomes() {
        let results = vec![
            EventResult {
                event_id: 1,
                event_type: EventType::NewLead,
                outcome: DispatchOutcome::Sent,
                detail: None,
            },
            EventResult {
                event_id: 2,
                event_type: EventType::NewReview,
                outcome: DispatchOutcome::Skipped,
                detail: Some("no recipient address".to_string()),
            },
            EventResult {
                event_id: 3,
                event_type: EventType::NewLead,
                outcome: DispatchOutcome::Sent,
                detail: None,
            },
            EventResult {
                event_id: 4,
                event_type: EventType::ClientConfirmation,
                outcome: DispatchOutcome::Retried,
                detail: Some("connect timeout".to_string()),
            },
        ];
        let summary = PassSummary::from_results(results);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.retried, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::NewLead.to_string(), "new_lead");
        assert_eq!(EventType::NewReview.to_string(), "new_review");
        assert_eq!(
            EventType::ClientConfirmation.to_string(),
            "client_confirmation"
        );
    }
}
