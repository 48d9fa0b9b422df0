//! Pre-dispatch checks. Everything here runs before a record is created.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Channel, Guardian};

pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MAX_BODY_CHARS: usize = 4000;

const UNSAFE_MARKERS: &[&str] = &["<script", "javascript:", "onclick=", "onerror=", "onload="];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("valid handle regex"));

pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address.trim())
}

pub fn is_valid_handle(handle: &str) -> bool {
    HANDLE_RE.is_match(handle.trim())
}

/// Subject and body limits plus the unsafe-markup screen.
pub fn validate_content(subject: &str, body: &str) -> Result<(), AppError> {
    if subject.trim().is_empty() {
        return Err(AppError::Validation("subject is required".to_string()));
    }
    if subject.chars().count() > MAX_SUBJECT_CHARS {
        return Err(AppError::Validation(format!(
            "subject must not exceed {} characters",
            MAX_SUBJECT_CHARS
        )));
    }
    if body.trim().is_empty() {
        return Err(AppError::Validation("message body is required".to_string()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "message body must not exceed {} characters",
            MAX_BODY_CHARS
        )));
    }

    let lowered = body.to_lowercase();
    if let Some(marker) = UNSAFE_MARKERS.iter().find(|m| lowered.contains(*m)) {
        return Err(AppError::Validation(format!(
            "message body contains disallowed content '{}'",
            marker
        )));
    }

    Ok(())
}

/// Whether the guardian has a usable contact for every kind the channel needs.
///
/// `Both` is satisfied by either contact.
pub fn validate_contact(guardian: &Guardian, channel: Channel) -> Result<(), AppError> {
    let email_ok = guardian.contact_for(Channel::Email).is_some_and(is_valid_email);
    let handle_ok = guardian
        .contact_for(Channel::Messaging)
        .is_some_and(is_valid_handle);

    match channel {
        Channel::Email if !email_ok => Err(AppError::Validation(format!(
            "guardian {} has no valid email address",
            guardian.id
        ))),
        Channel::Messaging if !handle_ok => Err(AppError::Validation(format!(
            "guardian {} has no valid messaging handle",
            guardian.id
        ))),
        Channel::Both if !email_ok && !handle_ok => Err(AppError::Validation(format!(
            "guardian {} has no valid contact for any channel",
            guardian.id
        ))),
        _ => Ok(()),
    }
}

/// Size and uniqueness rules for a bulk request.
pub fn validate_bulk(guardian_ids: &[Uuid], limit: usize) -> Result<(), AppError> {
    if guardian_ids.is_empty() {
        return Err(AppError::Validation(
            "guardian list must not be empty".to_string(),
        ));
    }
    if guardian_ids.len() > limit {
        return Err(AppError::Validation(format!(
            "bulk requests are limited to {} guardians, got {}",
            limit,
            guardian_ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(guardian_ids.len());
    if let Some(dup) = guardian_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(AppError::Validation(format!(
            "guardian list contains duplicate id {}",
            dup
        )));
    }

    Ok(())
}
