use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::filters::rank_gap::RANK_GAP_LOOKBACK;

/// Football fixture watcher with cached team stats and match filters
#[derive(Parser, Debug, Clone)]
#[command(name = "fixture-scout", version, about)]
pub struct Config {
    /// API-Football base URL
    #[arg(
        long,
        env = "API_FOOTBALL_URL",
        default_value = "https://v3.football.api-sports.io"
    )]
    pub api_url: String,

    /// API-Football key, sent as x-rapidapi-key
    #[arg(long, env = "API_FOOTBALL_KEY", hide_env_values = true)]
    pub api_key: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "fixture_scout.db")]
    pub database_path: String,

    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen_addr: String,

    /// Live fixtures polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "600")]
    pub poll_interval_secs: u64,

    /// Automatic filter pass interval in seconds
    #[arg(long, env = "FILTER_INTERVAL_SECS", default_value = "600")]
    pub filter_interval_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "15")]
    pub request_timeout_secs: u64,

    /// Attempts per API request
    #[arg(long, env = "MAX_RETRIES", default_value = "2")]
    pub max_retries: u32,

    /// Fixed delay between attempts in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value = "1000")]
    pub retry_delay_ms: u64,

    /// Maximum stats cache entries
    #[arg(long, env = "STATS_CACHE_CAPACITY", default_value = "100")]
    pub cache_capacity: usize,

    /// Stats cache entry time-to-live in seconds
    #[arg(long, env = "STATS_CACHE_TTL_SECS", default_value = "1800")]
    pub cache_ttl_secs: u64,

    /// Fixtures requested per form lookup
    #[arg(long, env = "FORM_WINDOW", default_value = "15")]
    pub form_window: u32,

    /// Concurrent match evaluations per filter pass
    #[arg(long, env = "FILTER_WORKERS", default_value = "4")]
    pub filter_workers: usize,

    /// JSON file overriding the built-in forbidden rank pair table
    #[arg(long, env = "RANK_TABLE_PATH")]
    pub rank_table: Option<PathBuf>,

    /// Daily API request quota (reported only)
    #[arg(long, env = "REQUEST_QUOTA", default_value = "7500")]
    pub request_quota: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("API_FOOTBALL_KEY must not be empty");
        }
        if self.poll_interval_secs == 0 || self.filter_interval_secs == 0 {
            anyhow::bail!("poll and filter intervals must be at least 1 second");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        if self.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }
        if self.cache_capacity == 0 {
            anyhow::bail!("cache_capacity must be at least 1");
        }
        if !(1..=64).contains(&self.filter_workers) {
            anyhow::bail!("filter_workers must be between 1 and 64");
        }
        if (self.form_window as usize) < RANK_GAP_LOOKBACK {
            anyhow::bail!("form_window must be at least {}", RANK_GAP_LOOKBACK);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn filter_interval(&self) -> Duration {
        Duration::from_secs(self.filter_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
