use anyhow::{Context, Result, anyhow};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BLOCK_SIZE: usize = 512;
const DEFAULT_BACKOFF_MS: u64 = 500;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_link: String,
    /// Per-request timeout of the byte source
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Largest number of bytes asked for in one call
    pub block_size: usize,
    /// Base delay between retries; retry `n` waits `n` times this long
    pub backoff: Duration,
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();
    Config::from_lookup(|name| std::env::var(name).ok())
}

impl Config {
    /// Build the configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{name} is not set"))
        };
        let api_key = required("OCCYBYTE_API_KEY")?;
        let api_link = required("OCCYBYTE_API_LINK")?;

        let timeout_secs =
            parse_optional(&lookup, "OCCYBYTE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_retries = parse_optional(&lookup, "OCCYBYTE_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let block_size = parse_optional(&lookup, "OCCYBYTE_BLOCK_SIZE", DEFAULT_BLOCK_SIZE)?;
        let backoff_ms = parse_optional(&lookup, "OCCYBYTE_BACKOFF_MS", DEFAULT_BACKOFF_MS)?;
        if timeout_secs == 0 {
            return Err(anyhow!("OCCYBYTE_TIMEOUT_SECS must be positive"));
        }
        if block_size == 0 {
            return Err(anyhow!("OCCYBYTE_BLOCK_SIZE must be positive"));
        }

        Ok(Config {
            api_key,
            api_link,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            block_size,
            backoff: Duration::from_millis(backoff_ms),
        })
    }
}

fn parse_optional<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}
