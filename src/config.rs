use anyhow::{Context, Result};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    /// Exact dashboard origin allowed by CORS; `None` means permissive.
    pub cors_origin: Option<String>,
    /// No repeated alert for the same device/metric/direction inside this window.
    pub dedup_window_seconds: i64,
    pub dedup_sweep_interval_seconds: u64,
    pub broadcast_capacity: usize,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            cors_origin: env_opt("AGRO_CORS_ORIGIN"),
            dedup_window_seconds: env_parsed("AGRO_ALERT_DEDUP_WINDOW_SECONDS", 300),
            dedup_sweep_interval_seconds: env_parsed("AGRO_ALERT_DEDUP_SWEEP_SECONDS", 60),
            broadcast_capacity: env_parsed("AGRO_BROADCAST_CAPACITY", 256),
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env_opt(name).map(|value| value.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            tracing::warn!(var = name, "invalid value; using default");
            default
        }
        None => default,
    }
}
