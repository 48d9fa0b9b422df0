//! Electronic-mail gateway backed by the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Sends one message to one mail address.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Returns true when the provider accepted the message.
    async fn send(&self, address: &str, subject: &str, body: &str) -> bool;
}

/// Mail gateway that posts to the Resend `/emails` endpoint.
pub struct ResendMailer {
    client: Client,
    api_key: Option<String>,
    from: String,
    endpoint: String,
}

impl ResendMailer {
    /// `timeout` bounds every call so a hung provider cannot stall a sweep.
    pub fn new(api_key: Option<String>, from: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            api_key,
            from: from.unwrap_or_else(|| "notifications@herald.local".to_string()),
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    /// Point the mailer at a different API base (self-hosted relay, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl MailGateway for ResendMailer {
    async fn send(&self, address: &str, subject: &str, body: &str) -> bool {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(to = %address, "Mail gateway has no API key configured");
            return false;
        };

        let payload = json!({
            "from": self.from,
            "to": [address],
            "subject": subject,
            "html": body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %address, "Email sent");
                true
            }
            Ok(resp) => {
                tracing::error!(to = %address, status = %resp.status(), "Mail provider rejected message");
                false
            }
            Err(e) => {
                tracing::error!(to = %address, error = %e, "Mail provider unreachable");
                false
            }
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default HTTP client");
        Client::new()
    })
}
