//! Instant-messaging gateway backed by a WhatsApp web bridge.
//!
//! When the bridge is disabled, unreachable, or refuses the message, the gateway
//! produces a `link:https://wa.me/...` deep link instead. Callers treat that link
//! as a delivered message and store it as the external id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::mail::build_client;

/// Prefix marking an external id that is a fallback link rather than a message id.
pub const LINK_PREFIX: &str = "link:";

/// Sends one text to one messaging handle.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Returns the external message id (or fallback link), `None` on failure.
    async fn send(&self, handle: &str, text: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeResponse {
    #[serde(default)]
    success: bool,
    message_id: Option<String>,
}

/// Messaging gateway posting to `{base}/send-message`.
pub struct WhatsAppWebGateway {
    client: Client,
    base_url: String,
    enabled: bool,
}

impl WhatsAppWebGateway {
    pub fn new(base_url: impl Into<String>, enabled: bool, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled,
        }
    }

    async fn post_message(&self, number: &str, text: &str) -> Result<Option<String>, String> {
        let url = format!("{}/send-message", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "number": number, "message": text }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("bridge returned HTTP {}", resp.status()));
        }

        let body: BridgeResponse = resp.json().await.map_err(|e| e.to_string())?;
        if body.success {
            Ok(Some(body.message_id.unwrap_or_else(|| "sent".to_string())))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppWebGateway {
    async fn send(&self, handle: &str, text: &str) -> Option<String> {
        let handle = handle.trim();
        if handle.is_empty() {
            tracing::warn!("Messaging handle is blank");
            return None;
        }

        if !self.enabled {
            tracing::info!(to = %handle, "Messaging bridge disabled, generating link");
            return fallback_link(handle, text);
        }

        let number = digits_only(handle);
        if number.is_empty() {
            tracing::warn!(to = %handle, "Messaging handle has no digits");
            return None;
        }

        match self.post_message(&number, text).await {
            Ok(Some(message_id)) => {
                tracing::info!(to = %handle, message_id = %message_id, "Message sent");
                Some(message_id)
            }
            Ok(None) => {
                tracing::error!(to = %handle, "Bridge refused message, generating link");
                fallback_link(handle, text)
            }
            Err(e) => {
                tracing::error!(to = %handle, error = %e, "Bridge unreachable, generating link");
                fallback_link(handle, text)
            }
        }
    }
}

/// Build the `link:https://wa.me/...` fallback for a handle.
pub fn fallback_link(handle: &str, text: &str) -> Option<String> {
    let number = handle.trim().replace('+', "");
    if number.is_empty() {
        return None;
    }
    Some(format!(
        "{}https://wa.me/{}?text={}",
        LINK_PREFIX,
        number,
        urlencoding::encode(text)
    ))
}

fn digits_only(handle: &str) -> String {
    handle.chars().filter(char::is_ascii_digit).collect()
}
