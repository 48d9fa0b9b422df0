use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery path(s) for a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Channel {
    Email,
    Messaging,
    Both,
}

impl Channel {
    /// The single-kind channels this channel fans out to.
    pub fn kinds(self) -> &'static [Channel] {
        match self {
            Channel::Email => &[Channel::Email],
            Channel::Messaging => &[Channel::Messaging],
            Channel::Both => &[Channel::Email, Channel::Messaging],
        }
    }
}

/// Kind of notification being delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationKind {
    BulletinAvailable,
    UrgentAlert,
    AbsenceAlert,
    GeneralMessage,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::BulletinAvailable,
        NotificationKind::UrgentAlert,
        NotificationKind::AbsenceAlert,
        NotificationKind::GeneralMessage,
    ];
}

/// Notification delivery status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Retry,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Sent,
        DeliveryStatus::Failed,
        DeliveryStatus::Retry,
    ];
}

/// A guardian's contact record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Guardian {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub messaging_handle: Option<String>,
    pub preferred_channel: Channel,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guardian {
    pub fn new(full_name: impl Into<String>, preferred_channel: Channel) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            email: None,
            messaging_handle: None,
            preferred_channel,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_messaging_handle(mut self, handle: impl Into<String>) -> Self {
        self.messaging_handle = Some(handle.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The non-blank contact field for a single-kind channel.
    pub fn contact_for(&self, channel: Channel) -> Option<&str> {
        let field = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Messaging => self.messaging_handle.as_deref(),
            Channel::Both => None,
        };
        field.map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Persisted state of one notification's attempted delivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub subject: String,
    #[sqlx(rename = "message")]
    pub body: String,
    pub status: DeliveryStatus,
    pub external_message_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write; writes compare-and-swap on it.
    pub version: i64,
    /// A sweeper holding this record until the given time.
    pub claimed_until: Option<DateTime<Utc>>,
}

impl DeliveryRecord {
    /// A fresh Pending record created at `now`.
    pub fn pending(
        guardian_id: Uuid,
        kind: NotificationKind,
        channel: Channel,
        subject: impl Into<String>,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guardian_id,
            kind,
            channel,
            subject: subject.into(),
            body: body.into(),
            status: DeliveryStatus::Pending,
            external_message_id: None,
            error_message: None,
            retry_count: 0,
            scheduled_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            claimed_until: None,
        }
    }

    /// Whether a sweeper currently holds this record.
    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Messaging => write!(f, "messaging"),
            Channel::Both => write!(f, "both"),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::BulletinAvailable => write!(f, "bulletin_available"),
            NotificationKind::UrgentAlert => write!(f, "urgent_alert"),
            NotificationKind::AbsenceAlert => write!(f, "absence_alert"),
            NotificationKind::GeneralMessage => write!(f, "general_message"),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Retry => write!(f, "retry"),
        }
    }
}
