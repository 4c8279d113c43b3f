//! Outbound email transport.
//!
//! The transport is an opaque boundary: it accepts a from-address, a
//! to-address, a template reference, a model and auxiliary headers, and
//! reports success or failure. All transport failures are recoverable and
//! routed through the retry controller by the caller.

use serde_json::json;
use thiserror::Error;

use crate::template::TemplateRef;

/// A fully resolved outbound message, ready for the wire.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub template: TemplateRef,
    pub model: serde_json::Value,
    /// Auxiliary headers, e.g. the audit header carrying the original
    /// recipient under developer-redirect.
    pub headers: Vec<(String, String)>,
}

/// Transport-level response for a successful send.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),

    #[error("transport rejected message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// External email transport collaborator.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        email: &OutboundEmail,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Postmark templated-send transport over HTTP.
#[derive(Debug, Clone)]
pub struct PostmarkTransport {
    client: reqwest::Client,
    api_url: String,
    server_token: String,
}

impl PostmarkTransport {
    pub fn new(
        api_url: String,
        server_token: String,
        timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            server_token,
        })
    }
}

impl Transport for PostmarkTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<TransportResponse, TransportError> {
        let mut body = json!({
            "From": email.from,
            "To": email.to,
            "TemplateModel": email.model,
        });

        match &email.template {
            TemplateRef::Id(id) => body["TemplateId"] = json!(id),
            TemplateRef::Alias(alias) => body["TemplateAlias"] = json!(alias),
        }

        if !email.headers.is_empty() {
            body["Headers"] = email
                .headers
                .iter()
                .map(|(name, value)| json!({ "Name": name, "Value": value }))
                .collect();
        }

        let response = self
            .client
            .post(&self.api_url)
            .header("X-Postmark-Server-Token", &self.server_token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if (200..300).contains(&status) {
            tracing::debug!(status, to = %email.to, "Transport accepted message");
            Ok(TransportResponse { status, body })
        } else {
            Err(TransportError::Rejected { status, body })
        }
    }
}
