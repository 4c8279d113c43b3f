use serde::Deserialize;

use crate::types::EventType;

/// Where messages actually go once a recipient is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DeliveryMode {
    /// Use the resolved address unchanged.
    Production,
    /// Substitute the resolved address with `dev_redirect_email`, keeping
    /// the original address in an audit header.
    DeveloperRedirect,
}

impl std::str::FromStr for DeliveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(DeliveryMode::Production),
            "developer-redirect" | "developer_redirect" => Ok(DeliveryMode::DeveloperRedirect),
            other => Err(anyhow::anyhow!(
                "DELIVERY_MODE must be 'production' or 'developer-redirect', got '{}'",
                other
            )),
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Production => write!(f, "production"),
            DeliveryMode::DeveloperRedirect => write!(f, "developer-redirect"),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection before giving up (default: 5)
    pub db_acquire_timeout_secs: u64,

    /// Maximum number of events claimed per worker pass (default: 25)
    pub batch_size: i64,

    /// Interval between worker passes in milliseconds (default: 30000)
    pub poll_interval_ms: u64,

    /// Default sender address for outbound messages
    pub email_from: String,

    /// Postmark server token — required for live sends, optional under dry-run
    pub postmark_server_token: Option<String>,

    /// Postmark templated-send endpoint
    pub postmark_api_url: String,

    /// Delivery-mode policy (default: production)
    pub delivery_mode: DeliveryMode,

    /// When set, record SENT without contacting the transport (default: false)
    pub dry_run: bool,

    /// Redirect address used in developer-redirect mode
    pub dev_redirect_email: Option<String>,

    /// Shared secret for the dispatch trigger endpoint; unset disables the check
    pub trigger_secret: Option<String>,

    /// Absolute base URL for in-product links embedded in templates
    pub app_base_url: String,

    /// Per-event-type template references (numeric id or symbolic alias)
    pub template_new_lead: Option<String>,
    pub template_new_review: Option<String>,
    pub template_client_confirmation: Option<String>,

    /// Per-call timeout for transport requests in seconds (default: 10)
    pub transport_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let delivery_mode: DeliveryMode = std::env::var("DELIVERY_MODE")
            .unwrap_or_else(|_| "production".to_string())
            .parse()?;

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            db_acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_ACQUIRE_TIMEOUT_SECS must be a valid u64"))?,
            batch_size: std::env::var("DISPATCH_BATCH_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_BATCH_SIZE must be a valid integer"))?,
            poll_interval_ms: std::env::var("DISPATCH_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_POLL_INTERVAL_MS must be a valid u64"))?,
            email_from: std::env::var("EMAIL_FROM")
                .map_err(|_| anyhow::anyhow!("EMAIL_FROM environment variable is required"))?,
            postmark_server_token: std::env::var("POSTMARK_SERVER_TOKEN").ok(),
            postmark_api_url: std::env::var("POSTMARK_API_URL").unwrap_or_else(|_| {
                "https://api.postmarkapp.com/email/withTemplate".to_string()
            }),
            delivery_mode,
            dry_run: std::env::var("DRY_RUN")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DRY_RUN must be 'true' or 'false'"))?,
            dev_redirect_email: std::env::var("DEV_REDIRECT_EMAIL").ok(),
            trigger_secret: std::env::var("DISPATCH_TRIGGER_SECRET").ok(),
            app_base_url: std::env::var("APP_BASE_URL")
                .map_err(|_| anyhow::anyhow!("APP_BASE_URL environment variable is required"))?,
            template_new_lead: std::env::var("TEMPLATE_NEW_LEAD").ok(),
            template_new_review: std::env::var("TEMPLATE_NEW_REVIEW").ok(),
            template_client_confirmation: std::env::var("TEMPLATE_CLIENT_CONFIRMATION").ok(),
            transport_timeout_secs: std::env::var("TRANSPORT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TRANSPORT_TIMEOUT_SECS must be a valid u64"))?,
        };

        if config.delivery_mode == DeliveryMode::DeveloperRedirect
            && config.dev_redirect_email.is_none()
        {
            return Err(anyhow::anyhow!(
                "DEV_REDIRECT_EMAIL is required when DELIVERY_MODE is 'developer-redirect'"
            ));
        }

        if !config.dry_run && config.postmark_server_token.is_none() {
            return Err(anyhow::anyhow!(
                "POSTMARK_SERVER_TOKEN is required unless DRY_RUN=true"
            ));
        }

        Ok(config)
    }

    /// Configured template reference for an event type, if any.
    pub fn template_for(&self, event_type: EventType) -> Option<&str> {
        match event_type {
            EventType::NewLead => self.template_new_lead.as_deref(),
            EventType::NewReview => self.template_new_review.as_deref(),
            EventType::ClientConfirmation => self.template_client_confirmation.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_parse() {
        assert_eq!(
            "production".parse::<DeliveryMode>().unwrap(),
            DeliveryMode::Production
        );
        assert_eq!(
            "developer-redirect".parse::<DeliveryMode>().unwrap(),
            DeliveryMode::DeveloperRedirect
        );
        assert_eq!(
            "developer_redirect".parse::<DeliveryMode>().unwrap(),
            DeliveryMode::DeveloperRedirect
        );
        assert!("staging".parse::<DeliveryMode>().is_err());
    }
}
