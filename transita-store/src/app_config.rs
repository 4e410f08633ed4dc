use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub booking_rules: BookingRules,
    pub outbox: OutboxConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// Upper bound per booking, independent of the schedule's capacity.
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: u32,
    /// Mailbox that receives operator copies of booking traffic.
    pub operator_email: String,
}

fn default_max_seats() -> u32 { 6 }

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    #[serde(default = "default_poll_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// Delivery attempts before an event is parked as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

fn default_poll_seconds() -> u64 { 5 }
fn default_batch_size() -> i64 { 50 }
fn default_max_attempts() -> i32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub from_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 { 587 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the current environment file on top; optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Finally the environment, e.g. TRANSITA__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("TRANSITA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
