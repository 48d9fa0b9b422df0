use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

/// Which record states the retry sweep re-selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryEligibility {
    /// Failed and Retry records are both re-driven until attempts run out.
    FailedAndRetry,
    /// Only Failed records are selected; a record that lands in Retry stays there.
    FailedOnly,
}

impl std::str::FromStr for RetryEligibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "failed_and_retry" => Ok(RetryEligibility::FailedAndRetry),
            "failed_only" => Ok(RetryEligibility::FailedOnly),
            other => Err(format!("unknown retry eligibility '{}'", other)),
        }
    }
}

/// Tunables shared by the dispatch engine and every sweeper.
///
/// Built once at startup and handed to each component by value.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Maximum number of retry-sweep attempts per record (default: 3)
    pub max_retry_attempts: i32,
    /// Minimum time since a failure before the record is retried (default: 5 min)
    pub retry_cooldown: Duration,
    /// Retry sweep period (default: 10 min)
    pub retry_interval: Duration,
    /// Scheduled sweep period (default: 5 min)
    pub scheduled_interval: Duration,
    /// Time of day (UTC) for the retention sweep (default: 02:00)
    pub cleanup_at: NaiveTime,
    /// Status report period (default: 1 hour)
    pub status_report_interval: Duration,
    /// Records older than this many days are purged (default: 90)
    pub retention_days: i64,
    /// Maximum number of guardians in one bulk request (default: 500)
    pub bulk_limit: usize,
    /// How long a sweeper holds a record it has claimed (default: 15 min)
    pub claim_lease: Duration,
    /// Number of concurrently running on-demand sweeps (default: 2)
    pub sweep_workers: usize,
    pub retry_eligibility: RetryEligibility,
    /// Whether the periodic jobs run at all (default: true)
    pub scheduling_enabled: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_cooldown: Duration::from_secs(5 * 60),
            retry_interval: Duration::from_secs(10 * 60),
            scheduled_interval: Duration::from_secs(5 * 60),
            cleanup_at: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            status_report_interval: Duration::from_secs(60 * 60),
            retention_days: 90,
            bulk_limit: 500,
            claim_lease: Duration::from_secs(15 * 60),
            sweep_workers: 2,
            retry_eligibility: RetryEligibility::FailedAndRetry,
            scheduling_enabled: true,
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

    /// Port the API server binds to (default: 3000)
    pub api_port: u16,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Base URL of the WhatsApp web bridge
    pub whatsapp_api_url: String,

    /// When false the messaging gateway only produces fallback links
    pub whatsapp_enabled: bool,

    /// Per-call timeout applied by both channel gateways (default: 10s)
    pub gateway_timeout: Duration,

    pub delivery: DeliveryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = DeliveryConfig::default();

        let delivery = DeliveryConfig {
            max_retry_attempts: env_parse("MAX_RETRY_ATTEMPTS", defaults.max_retry_attempts)?,
            retry_cooldown: env_secs("RETRY_COOLDOWN_SECS", defaults.retry_cooldown)?,
            retry_interval: env_secs("RETRY_INTERVAL_SECS", defaults.retry_interval)?,
            scheduled_interval: env_secs("SCHEDULED_INTERVAL_SECS", defaults.scheduled_interval)?,
            cleanup_at: match std::env::var("CLEANUP_AT") {
                Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                    .map_err(|_| anyhow::anyhow!("CLEANUP_AT must be formatted as HH:MM"))?,
                Err(_) => defaults.cleanup_at,
            },
            status_report_interval: env_secs(
                "STATUS_REPORT_INTERVAL_SECS",
                defaults.status_report_interval,
            )?,
            retention_days: env_parse("RETENTION_DAYS", defaults.retention_days)?,
            bulk_limit: env_parse("BULK_LIMIT", defaults.bulk_limit)?,
            claim_lease: env_secs("CLAIM_LEASE_SECS", defaults.claim_lease)?,
            sweep_workers: env_parse("SWEEP_WORKERS", defaults.sweep_workers)?,
            retry_eligibility: match std::env::var("RETRY_ELIGIBILITY") {
                Ok(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                Err(_) => defaults.retry_eligibility,
            },
            scheduling_enabled: env_parse("SCHEDULING_ENABLED", defaults.scheduling_enabled)?,
        };

        if delivery.max_retry_attempts < 0 {
            anyhow::bail!("MAX_RETRY_ATTEMPTS must not be negative");
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 20)?,
            api_port: env_parse("API_PORT", 3000)?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            whatsapp_api_url: std::env::var("WHATSAPP_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            whatsapp_enabled: env_parse("WHATSAPP_ENABLED", true)?,
            gateway_timeout: env_secs("GATEWAY_TIMEOUT_SECS", Duration::from_secs(10))?,
            delivery,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> anyhow::Result<Duration> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}
