//! # Tracker Module
//!
//! One "compute current cost stats" cycle:
//!
//! 1. take the cross-process cache lock (best effort)
//! 2. load and prune the cached snapshot
//! 3. pick the pricing table, possibly starting a background refresh
//! 4. list log files and scan what changed since last time
//! 5. decode, price and fold new events into day buckets
//! 6. save the snapshot, release the lock
//! 7. fold day buckets into the requested windows
//!
//! Nothing in the cycle is fatal; the worst case is an undercount.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fs;
use std::thread::JoinHandle;
use tracing::debug;

use crate::accumulator::CostAccumulator;
use crate::aggregate::aggregate;
use crate::config::CostConfig;
use crate::decoder::decode_line;
use crate::lock::platform_lock;
use crate::models::CostStats;
use crate::pricing::{load_pricing, PricingSource};
use crate::scanner::{scan_file, FsLogSource, LogSource, ScanOutcome, ScanPlan};
use crate::store::CacheStore;

/// Counters from one scan pass, reported in debug output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_seen: usize,
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_stale: usize,
    pub files_failed: usize,
    pub lines: usize,
    /// Events newly counted; repeats of known dedup keys go to `duplicates`
    pub events: usize,
    pub duplicates: usize,
}

pub struct CostReport {
    pub stats: CostStats,
    pub summary: ScanSummary,
    pub pricing_source: PricingSource,
    /// False when the run went ahead without the cache lock
    pub locked: bool,
    pub saved: bool,
    /// Pricing fetch started by this run. Join only after output is written.
    pub refresh: Option<JoinHandle<()>>,
}

pub struct CostTracker<S: LogSource> {
    cfg: CostConfig,
    source: S,
}

impl CostTracker<FsLogSource> {
    /// Tracker over the `projects/` directories of the configured roots.
    pub fn from_config(cfg: CostConfig) -> Self {
        let source = FsLogSource::new(cfg.projects_dirs());
        Self::new(cfg, source)
    }
}

impl<S: LogSource> CostTracker<S> {
    pub fn new(cfg: CostConfig, source: S) -> Self {
        Self { cfg, source }
    }

    pub fn config(&self) -> &CostConfig {
        &self.cfg
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Stats as of the local wall clock.
    pub fn compute_now(&self) -> CostReport {
        self.compute(Local::now())
    }

    /// Run one cycle. Day buckets follow `now`'s time zone.
    pub fn compute<Tz: TimeZone>(&self, now: DateTime<Tz>) -> CostReport {
        let cfg = &self.cfg;
        let now_utc = now.with_timezone(&Utc);
        let cutoff = cfg.retention_cutoff(now_utc);

        if let Err(e) = fs::create_dir_all(&cfg.cache_dir) {
            debug!(dir = %cfg.cache_dir.display(), "cannot create cache dir: {e}");
        }
        let guard = platform_lock(&cfg.lock_file()).try_acquire(cfg.lock_attempts, cfg.lock_backoff);
        if guard.is_none() {
            debug!("cost cache lock unavailable, continuing without it");
        }

        let store = CacheStore::new(cfg.cache_file());
        let mut snapshot = store.load(&cutoff.with_timezone(&now.timezone()), cfg.dedup_cap);
        let pricing = load_pricing(cfg, now_utc);

        let mut summary = ScanSummary::default();
        let mut file_state = std::mem::take(&mut snapshot.file_state);
        {
            let mut acc = CostAccumulator::new(&mut snapshot, &pricing.resolver, now.timezone());
            for file in self.source.list_files() {
                summary.files_seen += 1;
                let key = file.key();
                let mut events = 0usize;
                let outcome = scan_file(&self.source, &file, file_state.get(&key), cutoff, |line| {
                    if let Some(event) = decode_line(line, cutoff).event()
                        && acc.accumulate(&event)
                    {
                        events += 1;
                    }
                });
                match outcome {
                    ScanOutcome::Skipped(ScanPlan::SkipStale) => summary.files_stale += 1,
                    ScanOutcome::Skipped(_) => summary.files_unchanged += 1,
                    ScanOutcome::Completed { state, lines } => {
                        summary.files_scanned += 1;
                        summary.lines += lines;
                        summary.events += events;
                        file_state.insert(key, state);
                    }
                    ScanOutcome::Failed(e) => {
                        // Offsets stay put; the next run retries this file.
                        debug!(file = %file.path.display(), "skipping unreadable log file: {e}");
                        summary.files_failed += 1;
                    }
                }
            }
            summary.duplicates = acc.duplicates();
        }
        snapshot.file_state = file_state;

        let saved = store.save(&snapshot);
        let locked = guard.is_some();
        if let Some(guard) = guard {
            guard.release();
        }

        debug!(
            files = summary.files_seen,
            scanned = summary.files_scanned,
            unchanged = summary.files_unchanged,
            failed = summary.files_failed,
            events = summary.events,
            duplicates = summary.duplicates,
            "cost scan finished"
        );

        CostReport {
            stats: aggregate(&snapshot, &now, cfg.aggregation),
            summary,
            pricing_source: pricing.source,
            locked,
            saved,
            refresh: pricing.refresh,
        }
    }
}
