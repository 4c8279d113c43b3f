//! Template binder — maps an event type to a message template reference and
//! builds the structured model passed to that template.
//!
//! Binding is pure: it reads only the event's `payload` and `entity_id` plus
//! configuration, so it is independently testable and never touches external
//! state.

use serde_json::json;
use thiserror::Error;

use courier_common::config::AppConfig;
use courier_common::types::{EventType, NotificationEvent};

/// A template reference, addressed either by numeric id or symbolic alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(i64),
    Alias(String),
}

impl TemplateRef {
    /// Parse a raw configuration value. Anything that parses as an integer is
    /// a numeric id; everything else is an alias.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => TemplateRef::Id(id),
            Err(_) => TemplateRef::Alias(raw.trim().to_string()),
        }
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateRef::Id(id) => write!(f, "{}", id),
            TemplateRef::Alias(alias) => write!(f, "{}", alias),
        }
    }
}

/// Non-retryable binding failures. Waiting cannot fix a missing template
/// mapping, so these bypass the retry controller entirely.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing template for event type {0}")]
    MissingTemplate(EventType),
}

/// A resolved template reference plus the model handed to the transport.
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    pub template: TemplateRef,
    pub model: serde_json::Value,
}

/// Bind an event to its template and build the template model.
///
/// The model is the event `payload` passed through untouched, enriched with
/// the event type and an absolute in-product link derived from `entity_id`.
pub fn bind(config: &AppConfig, event: &NotificationEvent) -> Result<BoundTemplate, BindError> {
    let raw = config
        .template_for(event.event_type)
        .ok_or(BindError::MissingTemplate(event.event_type))?;
    let template = TemplateRef::parse(raw);

    let mut model = match event.payload.clone() {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };

    model.insert("event_type".to_string(), json!(event.event_type.to_string()));
    model.insert(
        "action_url".to_string(),
        json!(action_url(config, event.event_type, &event.entity_id)),
    );

    Ok(BoundTemplate {
        template,
        model: serde_json::Value::Object(model),
    })
}

/// Absolute link to the in-product destination for this event.
fn action_url(config: &AppConfig, event_type: EventType, entity_id: &str) -> String {
    let base = config.app_base_url.trim_end_matches('/');
    match event_type {
        EventType::NewLead => format!("{}/coach/leads/{}", base, entity_id),
        EventType::NewReview => format!("{}/coach/reviews/{}", base, entity_id),
        EventType::ClientConfirmation => format!("{}/bookings/{}", base, entity_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_common::config::DeliveryMode;
    use courier_common::types::EventStatus;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "unused".to_string(),
            db_max_connections: 5,
            db_acquire_timeout_secs: 5,
            batch_size: 25,
            poll_interval_ms: 30_000,
            email_from: "noreply@example.com".to_string(),
            postmark_server_token: None,
            postmark_api_url: "http://unused".to_string(),
            delivery_mode: DeliveryMode::Production,
            dry_run: true,
            dev_redirect_email: None,
            trigger_secret: None,
            app_base_url: "https://app.example.com/".to_string(),
            template_new_lead: Some("12345678".to_string()),
            template_new_review: Some("new-review-v2".to_string()),
            template_client_confirmation: None,
            transport_timeout_secs: 10,
        }
    }

    fn make_event(event_type: EventType, payload: serde_json::Value) -> NotificationEvent {
        NotificationEvent {
            id: 1,
            event_type,
            entity_type: "lead".to_string(),
            entity_id: "lead_42".to_string(),
            payload,
            recipient_type: None,
            recipient_ref: None,
            coach_id: None,
            status: EventStatus::Processing,
            retry_count: 0,
            next_attempt_at: None,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn test_template_ref_parse() {
        assert_eq!(TemplateRef::parse("12345678"), TemplateRef::Id(12345678));
        assert_eq!(
            TemplateRef::parse("new-lead-v1"),
            TemplateRef::Alias("new-lead-v1".to_string())
        );
        assert_eq!(TemplateRef::parse(" 42 "), TemplateRef::Id(42));
    }

    #[test]
    fn test_bind_numeric_template() {
        let config = test_config();
        let event = make_event(
            EventType::NewLead,
            serde_json::json!({"client_name": "Ada", "message": "hi"}),
        );
        let bound = bind(&config, &event).unwrap();

        assert_eq!(bound.template, TemplateRef::Id(12345678));
        assert_eq!(bound.model["client_name"], "Ada");
        assert_eq!(bound.model["message"], "hi");
        assert_eq!(bound.model["event_type"], "new_lead");
        assert_eq!(
            bound.model["action_url"],
            "https://app.example.com/coach/leads/lead_42"
        );
    }

    #[test]
    fn test_bind_alias_template() {
        let config = test_config();
        let event = make_event(EventType::NewReview, serde_json::json!({"rating": 5}));
        let bound = bind(&config, &event).unwrap();

        assert_eq!(
            bound.template,
            TemplateRef::Alias("new-review-v2".to_string())
        );
        assert_eq!(
            bound.model["action_url"],
            "https://app.example.com/coach/reviews/lead_42"
        );
    }

    #[test]
    fn test_bind_missing_template_fails() {
        let config = test_config();
        let event = make_event(EventType::ClientConfirmation, serde_json::json!({}));
        let err = bind(&config, &event).unwrap_err();
        assert!(matches!(
            err,
            BindError::MissingTemplate(EventType::ClientConfirmation)
        ));
    }

    #[test]
    fn test_bind_non_object_payload_is_wrapped() {
        let config = test_config();
        let event = make_event(EventType::NewLead, serde_json::json!("raw text"));
        let bound = bind(&config, &event).unwrap();
        assert_eq!(bound.model["payload"], "raw text");
        assert_eq!(bound.model["event_type"], "new_lead");
    }
}
