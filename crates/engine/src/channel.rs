//! Channel routing.
//!
//! Each single-kind channel is a route wrapping its gateway. `Both` is a fan-out
//! route over the single-kind routes that succeeds when any of them succeeds.

use std::sync::Arc;

use async_trait::async_trait;

use herald_common::types::{Channel, Guardian};
use herald_notifier::{MailGateway, MessagingGateway};

/// Outcome of sending one record over one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempt {
    pub delivered: bool,
    /// Only messaging produces one.
    pub external_id: Option<String>,
    pub failures: Vec<String>,
}

impl Attempt {
    pub(crate) fn delivered(external_id: Option<String>) -> Self {
        Self {
            delivered: true,
            external_id,
            failures: Vec::new(),
        }
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self {
            delivered: false,
            external_id: None,
            failures: vec![reason.into()],
        }
    }

    /// Error text to store on the record when the attempt did not deliver.
    pub fn failure_reason(&self) -> String {
        match self.failures.as_slice() {
            [] => "delivery failed".to_string(),
            [only] => only.clone(),
            many => format!("all channels failed: {}", many.join("; ")),
        }
    }
}

#[async_trait]
pub trait ChannelRoute: Send + Sync {
    async fn deliver(&self, guardian: &Guardian, subject: &str, body: &str) -> Attempt;
}

pub struct EmailRoute {
    gateway: Arc<dyn MailGateway>,
}

#[async_trait]
impl ChannelRoute for EmailRoute {
    async fn deliver(&self, guardian: &Guardian, subject: &str, body: &str) -> Attempt {
        let Some(address) = guardian.contact_for(Channel::Email) else {
            tracing::warn!(guardian_id = %guardian.id, "No email address configured");
            return Attempt::failed("contact missing for channel email");
        };

        if self.gateway.send(address, subject, body).await {
            Attempt::delivered(None)
        } else {
            Attempt::failed("email gateway did not accept the message")
        }
    }
}

pub struct MessagingRoute {
    gateway: Arc<dyn MessagingGateway>,
}

#[async_trait]
impl ChannelRoute for MessagingRoute {
    async fn deliver(&self, guardian: &Guardian, subject: &str, body: &str) -> Attempt {
        let Some(handle) = guardian.contact_for(Channel::Messaging) else {
            tracing::warn!(guardian_id = %guardian.id, "No messaging handle configured");
            return Attempt::failed("contact missing for channel messaging");
        };

        let text = format!("{}\n\n{}", subject, body);
        match self.gateway.send(handle, &text).await {
            Some(id) => Attempt::delivered(Some(id)),
            None => Attempt::failed("messaging gateway returned no message id"),
        }
    }
}

/// Sends over every inner route and OR-combines the results.
pub struct FanOutRoute {
    routes: Vec<Arc<dyn ChannelRoute>>,
}

#[async_trait]
impl ChannelRoute for FanOutRoute {
    async fn deliver(&self, guardian: &Guardian, subject: &str, body: &str) -> Attempt {
        let mut combined = Attempt::default();
        for route in &self.routes {
            let attempt = route.deliver(guardian, subject, body).await;
            combined.delivered |= attempt.delivered;
            if combined.external_id.is_none() {
                combined.external_id = attempt.external_id;
            }
            combined.failures.extend(attempt.failures);
        }
        if combined.delivered {
            combined.failures.clear();
        }
        combined
    }
}

/// Maps a requested channel to the route that serves it.
pub struct ChannelRouter {
    email: Arc<dyn ChannelRoute>,
    messaging: Arc<dyn ChannelRoute>,
    both: Arc<dyn ChannelRoute>,
}

impl ChannelRouter {
    pub fn new(mail: Arc<dyn MailGateway>, messaging: Arc<dyn MessagingGateway>) -> Self {
        let email: Arc<dyn ChannelRoute> = Arc::new(EmailRoute { gateway: mail });
        let messaging: Arc<dyn ChannelRoute> = Arc::new(MessagingRoute { gateway: messaging });
        let both: Arc<dyn ChannelRoute> = Arc::new(FanOutRoute {
            routes: Channel::Both
                .kinds()
                .iter()
                .map(|kind| match kind {
                    Channel::Messaging => messaging.clone(),
                    _ => email.clone(),
                })
                .collect(),
        });
        Self {
            email,
            messaging,
            both,
        }
    }

    pub fn route(&self, channel: Channel) -> &dyn ChannelRoute {
        match channel {
            Channel::Email => self.email.as_ref(),
            Channel::Messaging => self.messaging.as_ref(),
            Channel::Both => self.both.as_ref(),
        }
    }
}
