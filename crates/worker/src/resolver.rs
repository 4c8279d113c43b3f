//! Recipient resolver — maps an event's abstract recipient descriptor to a
//! concrete delivery address.
//!
//! A `None` result is not an error: an unresolved recipient is a data
//! condition and finalizes the event as SKIP without consuming retry budget.

use sqlx::PgPool;
use uuid::Uuid;

use courier_common::types::{NotificationEvent, RecipientType};

/// Resolve an event to a delivery address, or `None` when no address exists.
pub async fn resolve(
    pool: &PgPool,
    event: &NotificationEvent,
) -> Result<Option<String>, sqlx::Error> {
    match event.recipient_type {
        // EXTERNAL refs are already addresses
        Some(RecipientType::External) => Ok(event.recipient_ref.clone()),

        Some(RecipientType::Coach) => {
            let Some(recipient_ref) = event.recipient_ref.as_deref() else {
                return Ok(None);
            };
            let Ok(coach_id) = Uuid::parse_str(recipient_ref) else {
                tracing::warn!(
                    event_id = event.id,
                    recipient_ref,
                    "Coach recipient_ref is not a valid UUID"
                );
                return Ok(None);
            };
            coach_email(pool, coach_id).await
        }

        // No identity-store integration is wired up yet; a USER recipient is
        // a documented no-op that resolves to nothing.
        Some(RecipientType::User) => {
            tracing::warn!(
                event_id = event.id,
                "USER recipient resolution is not implemented; event will be skipped"
            );
            Ok(None)
        }

        // Legacy fallback: older producers populate only coach_id
        None => match (event.recipient_ref.as_deref(), event.coach_id) {
            (None, Some(coach_id)) => coach_email(pool, coach_id).await,
            _ => Ok(None),
        },
    }
}

/// Look up a coach's email by id. Missing row and NULL email both yield `None`.
async fn coach_email(pool: &PgPool, coach_id: Uuid) -> Result<Option<String>, sqlx::Error> {
    let email: Option<Option<String>> =
        sqlx::query_scalar("SELECT email FROM coaches WHERE id = $1")
            .bind(coach_id)
            .fetch_optional(pool)
            .await?;

    Ok(email.flatten())
}
