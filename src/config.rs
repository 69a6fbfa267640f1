//! Runtime configuration for the cost cache.
//!
//! Everything the scanner, store and pricing resolver need is carried in one
//! [`CostConfig`] value built at startup; nothing reads process-wide state
//! after that.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use crate::cli::Args;
use crate::models::AggregationMode;
use crate::utils::{
    claude_paths, default_cache_dir, parse_bool_env, DEFAULT_DEDUP_CAP, DEFAULT_RETENTION_DAYS,
};

pub const DEFAULT_PRICING_URL: &str =
    "https://raw.githubusercontent.com/erwint/claude-code-statusline/main/pricing.json";
pub const DEFAULT_PRICING_TTL_HOURS: i64 = 24;

const CACHE_FILE: &str = "cost_cache.json";
const LOCK_FILE: &str = "cost_cache.lock";
const PRICING_FILE: &str = "pricing.json";
const PRICING_ATTEMPT_FILE: &str = "pricing.attempt";

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub url: String,
    /// How long a fetched table counts as fresh
    pub ttl: Duration,
    /// Spawn a background fetch when the cached table is stale or missing
    pub refresh: bool,
    pub fetch_timeout: StdDuration,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PRICING_URL.to_string(),
            ttl: Duration::hours(DEFAULT_PRICING_TTL_HOURS),
            refresh: true,
            fetch_timeout: StdDuration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CostConfig {
    /// Claude data roots; logs live under `<root>/projects/**/*.jsonl`
    pub claude_roots: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    pub retention_days: i64,
    /// Dedup-set size that triggers a full reset
    pub dedup_cap: usize,
    pub aggregation: AggregationMode,
    pub pricing: PricingConfig,
    pub lock_attempts: u32,
    pub lock_backoff: StdDuration,
}

impl CostConfig {
    /// Defaults for an explicit set of roots and cache directory.
    pub fn new(claude_roots: Vec<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            claude_roots,
            cache_dir: cache_dir.into(),
            retention_days: DEFAULT_RETENTION_DAYS,
            dedup_cap: DEFAULT_DEDUP_CAP,
            aggregation: AggregationMode::Fixed,
            pricing: PricingConfig::default(),
            lock_attempts: 10,
            lock_backoff: StdDuration::from_millis(50),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let cache_dir = match args.cache_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_cache_dir().context("Failed to find home directory")?,
        };
        let mut cfg = Self::new(claude_paths(args.claude_config_dir.as_deref()), cache_dir);
        cfg.aggregation = args.aggregation;
        cfg.retention_days = i64::from(args.retention_days.max(1));
        cfg.pricing.ttl = Duration::hours(i64::from(args.pricing_ttl_hours));
        if let Some(url) = args.pricing_url.as_deref().map(str::trim)
            && !url.is_empty()
        {
            cfg.pricing.url = url.to_string();
        }
        cfg.pricing.refresh = !args.no_pricing_refresh
            && parse_bool_env("CLAUDE_STATUS_PRICING_REFRESH").unwrap_or(true);
        Ok(cfg)
    }

    /// Oldest instant that still counts towards any window.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.retention_days)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.cache_dir.join(LOCK_FILE)
    }

    pub fn pricing_file(&self) -> PathBuf {
        self.cache_dir.join(PRICING_FILE)
    }

    /// Touched whenever a pricing fetch starts; backs off failed fetches.
    pub fn pricing_attempt_file(&self) -> PathBuf {
        self.cache_dir.join(PRICING_ATTEMPT_FILE)
    }

    pub fn projects_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.claude_roots.iter().map(|r| r.join("projects"))
    }
}
