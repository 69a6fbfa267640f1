//! # Pricing Module
//!
//! Maps a model identifier to input/output prices (USD per million tokens).
//!
//! ## Sources
//!
//! - An embedded default table (`pricing.json` at the crate root)
//! - A refreshed copy cached under the cache directory, fresh for a
//!   configurable TTL (24h by default)
//!
//! A stale or missing cached copy triggers a detached background fetch; the
//! current run keeps using whatever table it already has. Each fetch start is
//! recorded in `pricing.attempt`, and no new fetch starts within one TTL of
//! the last attempt, successful or not.
//!
//! ## Lookup order
//!
//! 1. Exact model id
//! 2. Id without its date suffix (`claude-sonnet-4-5-20250514` -> `claude-sonnet-4-5`)
//! 3. That id without numeric segments (`claude-sonnet-4-5` -> `claude-sonnet`)
//! 4. The original id without numeric segments
//! 5. [`ModelPrice::DEFAULT`]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::config::{CostConfig, PricingConfig};
use crate::models::{ModelPrice, PricingTable};
use crate::store::write_atomic;

const EMBEDDED_PRICING: &str = include_str!("../pricing.json");

// Hyphen followed by a year-like token running to the end of the id.
static DATE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-(?:19|20)\d{2}[0-9-]*$").unwrap());

#[derive(Debug, Clone)]
pub struct PriceResolver {
    table: PricingTable,
}

impl PriceResolver {
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    pub fn embedded() -> Self {
        Self::new(embedded_table())
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Never fails: unknown models get the mid-tier default.
    pub fn resolve(&self, model_id: &str) -> ModelPrice {
        if let Some(p) = self.table.get(model_id) {
            return p;
        }

        if let Some(versioned) = strip_date_suffix(model_id) {
            if let Some(p) = self.table.get(versioned) {
                return p;
            }
            if let Some(p) = self.table.get(&strip_version(versioned)) {
                return p;
            }
        }

        if let Some(p) = self.table.get(&strip_version(model_id)) {
            return p;
        }

        debug!(model = model_id, "no pricing entry, using default");
        ModelPrice::DEFAULT
    }
}

/// `claude-sonnet-4-5-20250514` -> `claude-sonnet-4-5`
pub fn strip_date_suffix(model_id: &str) -> Option<&str> {
    let m = DATE_SUFFIX_RE.find(model_id)?;
    if m.start() == 0 {
        return None;
    }
    Some(&model_id[..m.start()])
}

/// Drops hyphen-delimited numeric segments: `claude-3.5-haiku` -> `claude-haiku`.
pub fn strip_version(model_id: &str) -> String {
    model_id
        .split('-')
        .filter(|part| !is_numeric_segment(part))
        .collect::<Vec<_>>()
        .join("-")
}

fn is_numeric_segment(part: &str) -> bool {
    !part.is_empty()
        && part.starts_with(|c: char| c.is_ascii_digit())
        && part.chars().all(|c| c.is_ascii_digit() || c == '.')
}

pub fn embedded_table() -> PricingTable {
    // The embedded file is checked by tests; an empty table only means every
    // lookup lands on the default price.
    PricingTable::from_json(EMBEDDED_PRICING.as_bytes()).unwrap_or_default()
}

/// Which table the current run is priced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingSource {
    Cached,
    StaleCache,
    Embedded,
}

pub struct LoadedPricing {
    pub resolver: PriceResolver,
    pub source: PricingSource,
    /// Background fetch started by this load, if any. Never joined by the
    /// cost computation itself.
    pub refresh: Option<JoinHandle<()>>,
}

/// Pick the active table and kick off a refresh when the cached one is stale.
pub fn load_pricing(cfg: &CostConfig, now: DateTime<Utc>) -> LoadedPricing {
    let cache_file = cfg.pricing_file();

    let cached = fs::metadata(&cache_file)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
        .and_then(|mtime| {
            let table = fs::read(&cache_file)
                .ok()
                .and_then(|raw| PricingTable::from_json(&raw))?;
            Some((table, now - mtime < cfg.pricing.ttl))
        });

    match cached {
        Some((table, true)) => {
            debug!(updated = %table.updated, "using cached pricing");
            LoadedPricing {
                resolver: PriceResolver::new(table),
                source: PricingSource::Cached,
                refresh: None,
            }
        }
        Some((table, false)) => {
            debug!("pricing cache expired");
            LoadedPricing {
                resolver: PriceResolver::new(table),
                source: PricingSource::StaleCache,
                refresh: spawn_refresh(&cfg.pricing, cache_file, &cfg.pricing_attempt_file(), now),
            }
        }
        None => {
            debug!("no usable pricing cache, using embedded table");
            LoadedPricing {
                resolver: PriceResolver::embedded(),
                source: PricingSource::Embedded,
                refresh: spawn_refresh(&cfg.pricing, cache_file, &cfg.pricing_attempt_file(), now),
            }
        }
    }
}

/// True when a fetch was started less than one TTL ago, whatever its outcome.
fn attempted_recently(marker: &Path, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
    fs::metadata(marker)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
        .is_some_and(|at| now - at < ttl)
}

/// Start a background fetch unless disabled or one was already tried within
/// the TTL. The attempt is recorded before fetching so an unreachable host
/// costs at most one slow run per TTL.
fn spawn_refresh(
    pricing: &PricingConfig,
    cache_file: PathBuf,
    marker: &Path,
    now: DateTime<Utc>,
) -> Option<JoinHandle<()>> {
    if !pricing.refresh {
        return None;
    }
    if attempted_recently(marker, pricing.ttl, now) {
        debug!("pricing refresh attempted recently, not retrying yet");
        return None;
    }
    if let Err(e) = write_atomic(marker, now.to_rfc3339().as_bytes()) {
        debug!(path = %marker.display(), "cannot record pricing refresh attempt: {e}");
    }
    debug!(url = %pricing.url, "refreshing pricing in background");
    let pricing = pricing.clone();
    thread::Builder::new()
        .name("pricing-refresh".into())
        .spawn(move || match refresh_pricing(&pricing, &cache_file) {
            Ok(()) => debug!(path = %cache_file.display(), "pricing updated and cached"),
            Err(e) => debug!("pricing refresh failed: {e:#}"),
        })
        .map_err(|e| debug!("could not spawn pricing refresh: {e}"))
        .ok()
}

fn refresh_pricing(pricing: &PricingConfig, cache_file: &Path) -> Result<()> {
    let raw = fetch_pricing(pricing)?;
    store_fetched_pricing(cache_file, &raw)
}

fn fetch_pricing(pricing: &PricingConfig) -> Result<Vec<u8>> {
    let mut config = ureq::Agent::config_builder().timeout_global(Some(pricing.fetch_timeout));
    if is_loopback_url(&pricing.url) {
        config = config.proxy(None);
    }
    let agent: ureq::Agent = config.build().into();

    let mut response = agent
        .get(&pricing.url)
        .header("Accept", "application/json")
        .call()
        .with_context(|| format!("GET {}", pricing.url))?;

    response
        .body_mut()
        .read_to_vec()
        .context("read pricing response")
}

// Local mirrors are never sent through an environment proxy.
fn is_loopback_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let host = rest.split('/').next().unwrap_or_default();
    let host = match host.rsplit_once(':') {
        Some((h, port)) if !h.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    };
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

/// Persist a fetched payload after checking it parses as a pricing table.
pub fn store_fetched_pricing(cache_file: &Path, raw: &[u8]) -> Result<()> {
    PricingTable::from_json(raw).context("invalid pricing payload")?;
    write_atomic(cache_file, raw)
        .with_context(|| format!("write {}", cache_file.display()))
}
