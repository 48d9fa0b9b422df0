//! Channel gateways.
//!
//! Each gateway sends one message over one external channel and never returns
//! an error: mail reports a boolean, messaging reports an external message id.
//! Failures are logged here and folded into those return values.

pub mod mail;
pub mod messaging;

pub use mail::{MailGateway, ResendMailer};
pub use messaging::{LINK_PREFIX, MessagingGateway, WhatsAppWebGateway, fallback_link};
