use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::artifacts::SweepPolicy;

const DEFAULT_GOTENBERG_URL: &str = "http://gotenberg:3000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost";
const DEFAULT_ARTIFACT_TTL_SECS: u64 = 15 * 60;
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 30;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub gotenberg_url: String,
    pub conversion_timeout: Duration,
    pub artifact_dir: PathBuf,
    pub sweep: SweepPolicy,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ttl = Duration::from_secs(parse_or(
            &lookup,
            "ARTIFACT_TTL_SECS",
            DEFAULT_ARTIFACT_TTL_SECS,
        )?);
        let sweep = match lookup("SWEEP_INTERVAL_SECS") {
            Some(raw) => {
                let secs = parse_value::<u64>("SWEEP_INTERVAL_SECS", &raw)?;
                SweepPolicy::new(ttl, Duration::from_secs(secs))?
            }
            None => SweepPolicy::from_ttl(ttl)?,
        };

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            allowed_origins: parse_origins(
                &lookup("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            gotenberg_url: lookup("GOTENBERG_URL")
                .unwrap_or_else(|| DEFAULT_GOTENBERG_URL.to_string()),
            conversion_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CONVERSION_TIMEOUT_SECS",
                DEFAULT_CONVERSION_TIMEOUT_SECS,
            )?),
            artifact_dir: lookup("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("cvforge-artifacts")),
            sweep,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has invalid value '{raw}'"))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
