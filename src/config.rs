use std::env;

use crate::batching::policy::{default_policy, offpeak_policy, peak_policy, BatchingPolicy};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub order_queue_size: usize,
    pub event_buffer_size: usize,
    pub cycle_interval_secs: u64,
    /// OSRM endpoint; when unset the Manhattan mock matrix is used.
    pub osrm_base_url: Option<String>,
    pub policy_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            order_queue_size: parse_or_default("ORDER_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            cycle_interval_secs: parse_or_default("CYCLE_INTERVAL_SECS", 30)?,
            osrm_base_url: env::var("OSRM_BASE_URL").ok().filter(|v| !v.is_empty()),
            policy_name: env::var("BATCHING_POLICY").unwrap_or_else(|_| "default".to_string()),
        };

        // fail at startup, not mid-cycle
        config.policy()?;

        Ok(config)
    }

    pub fn policy(&self) -> Result<BatchingPolicy, AppError> {
        let policy = policy_by_name(&self.policy_name)?;
        policy
            .validate()
            .map_err(|msg| AppError::Internal(format!("invalid batching policy: {msg}")))?;
        Ok(policy)
    }
}

pub fn policy_by_name(name: &str) -> Result<BatchingPolicy, AppError> {
    match name {
        "default" => Ok(default_policy()),
        "peak" => Ok(peak_policy()),
        "offpeak" => Ok(offpeak_policy()),
        other => Err(AppError::Internal(format!(
            "unknown BATCHING_POLICY: {other}, expected default/peak/offpeak"
        ))),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
