//! Run configuration assembled from the environment.
//!
//! Every field has an environment variable plus a documented fallback,
//! except the handful of fields §6 calls out as required (`DATABASE_URL`,
//! `WORKER_BASE_URL`, `WORKER_MAC`), whose absence is a startup error
//! rather than a silently-wrong default.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for environment variable {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub worker_base_url: String,
    pub worker_mac: [u8; 6],
    pub worker_ip: Option<String>,
    pub wake_enabled: bool,
    pub batch_size: usize,
    pub fanout: usize,
    pub per_run_limit: i64,
    pub request_timeout: Duration,
    pub max_attempts_per_batch: u32,
    pub similarity_threshold: f32,
    pub min_mentions: usize,
    pub target_language: String,
    pub shutdown_grace_period: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let worker_base_url = required("WORKER_BASE_URL")?;
        let worker_mac = parse_mac(&required("WORKER_MAC")?)?;
        let worker_ip = std::env::var("WORKER_IP").ok();

        Ok(Self {
            database_url,
            worker_base_url,
            worker_mac,
            worker_ip,
            wake_enabled: parse_bool_env("WAKE_ENABLED", true)?,
            batch_size: parse_env("BATCH_SIZE", 20)?,
            fanout: parse_env("FANOUT", 4)?,
            per_run_limit: parse_env("PER_RUN_LIMIT", 100)?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SEC", 120)?),
            max_attempts_per_batch: parse_env("MAX_ATTEMPTS_PER_BATCH", 3)?,
            similarity_threshold: parse_env("SIMILARITY_THRESHOLD", 0.85)?,
            min_mentions: parse_env("MIN_MENTIONS", 3)?,
            target_language: std::env::var("TARGET_LANGUAGE")
                .unwrap_or_else(|_| "eng_Latn".to_string()),
            shutdown_grace_period: Duration::from_secs(30),
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn parse_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
        Err(_) => Ok(default),
    }
}

/// Parses a MAC address in `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff` form,
/// used by the wake protocol (§4.2, §6).
fn parse_mac(value: &str) -> Result<[u8; 6], ConfigError> {
    let bytes: Vec<u8> = value
        .split(|c| c == ':' || c == '-')
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<_, _>>()
        .map_err(|_| ConfigError::InvalidValue {
            var: "WORKER_MAC",
            value: value.to_string(),
        })?;

    bytes.try_into().map_err(|_| ConfigError::InvalidValue {
        var: "WORKER_MAC",
        value: value.to_string(),
    })
}
