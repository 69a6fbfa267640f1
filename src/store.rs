//! # Store Module
//!
//! JSON persistence of the [`CacheSnapshot`] between invocations.
//!
//! - `load` never fails: a missing or unreadable file yields an empty snapshot
//! - `save` is best effort and replaces the file atomically (temp file + rename)
//! - pruning runs on every load

use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::models::CacheSnapshot;

// Unique temp names for writers sharing a process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// What pruning removed from a freshly loaded snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub days_dropped: usize,
    pub files_dropped: usize,
    /// Dedup set exceeded its cap and everything was reset
    pub reset: bool,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, falling back to an empty one on any error.
    pub fn read(&self) -> CacheSnapshot {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %self.path.display(), "cannot read cost cache: {e}");
                }
                return CacheSnapshot::default();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            debug!(path = %self.path.display(), "discarding unparseable cost cache: {e}");
            CacheSnapshot::default()
        })
    }

    /// Read and prune against the retention cutoff and dedup cap. Day buckets
    /// are compared in `cutoff`'s zone, the zone they were bucketed in.
    pub fn load<Tz: TimeZone>(&self, cutoff: &DateTime<Tz>, dedup_cap: usize) -> CacheSnapshot {
        let mut snapshot = self.read();
        let report = prune(&mut snapshot, cutoff, dedup_cap);
        if report != PruneReport::default() {
            debug!(
                days = report.days_dropped,
                files = report.files_dropped,
                reset = report.reset,
                "pruned cost cache"
            );
        }
        snapshot
    }

    /// Persist the snapshot. Failures are logged and reported, never fatal.
    pub fn save(&self, snapshot: &CacheSnapshot) -> bool {
        let data = match serde_json::to_vec(snapshot) {
            Ok(d) => d,
            Err(e) => {
                debug!("failed to serialize cost cache: {e}");
                return false;
            }
        };
        match write_atomic(&self.path, &data) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %self.path.display(), "failed to save cost cache: {e}");
                false
            }
        }
    }
}

/// Drop day buckets and file states older than `cutoff`; reset the dedup set,
/// file states and day buckets together once the set grows past `dedup_cap`.
///
/// Day buckets go with the reset because the forced rescan rebuilds them.
pub fn prune<Tz: TimeZone>(
    snapshot: &mut CacheSnapshot,
    cutoff: &DateTime<Tz>,
    dedup_cap: usize,
) -> PruneReport {
    let mut report = PruneReport::default();

    let cutoff_day = cutoff.date_naive();
    let cutoff = cutoff.with_timezone(&Utc);
    let before = snapshot.day_costs.len();
    snapshot.day_costs.retain(|day, _| *day >= cutoff_day);
    report.days_dropped = before - snapshot.day_costs.len();

    let before = snapshot.file_state.len();
    snapshot.file_state.retain(|_, st| st.mod_time >= cutoff);
    report.files_dropped = before - snapshot.file_state.len();

    if snapshot.processed.len() > dedup_cap {
        debug!(
            keys = snapshot.processed.len(),
            cap = dedup_cap,
            "dedup set over cap, forcing full rescan"
        );
        snapshot.processed.clear();
        snapshot.file_state.clear();
        snapshot.day_costs.clear();
        report.reset = true;
    }

    report
}

/// Write `data` next to `path` and rename it into place.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{seq}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);

    if let Err(e) = fs::write(&tmp, data).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileScanState;
    use chrono::{Duration, NaiveDate};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_cost_cache_load_save() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("nested").join("cost_cache.json"));

        let mut snapshot = CacheSnapshot::default();
        snapshot.day_costs.insert(day("2025-11-28"), 10.50);
        snapshot.day_costs.insert(day("2025-11-29"), 25.00);
        snapshot.file_state.insert(
            "/path/to/file.jsonl".into(),
            FileScanState {
                mod_time: at("2025-11-29T10:00:00.123456789Z"),
                size: 1000,
                offset: 500,
            },
        );
        snapshot.processed.insert("msg1:req1".into());
        snapshot.processed.insert("msg2:req2".into());
        assert!(store.save(&snapshot));

        let loaded = store.read();
        assert_eq!(loaded.day_costs, snapshot.day_costs);
        assert_eq!(loaded.file_state, snapshot.file_state);
        assert_eq!(loaded.processed, snapshot.processed);
    }

    #[test]
    fn on_disk_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cost_cache.json"));
        let mut snapshot = CacheSnapshot::default();
        snapshot.day_costs.insert(day("2025-11-29"), 1.5);
        snapshot.processed.insert("m:r".into());
        store.save(&snapshot);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["day_costs"]["2025-11-29"], 1.5);
        assert_eq!(raw["processed_messages"]["m:r"], true);
        assert!(raw["file_state"].is_object());
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cost_cache.json"));
        assert!(store.read().day_costs.is_empty());

        fs::write(store.path(), b"{not json").unwrap();
        let snapshot = store.load(&Utc::now(), 100);
        assert!(snapshot.day_costs.is_empty());
        assert!(snapshot.processed.is_empty());
    }

    #[test]
    fn save_failure_is_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"").unwrap();
        // parent "directory" is a regular file
        let store = CacheStore::new(blocker.join("cost_cache.json"));
        assert!(!store.save(&CacheSnapshot::default()));
    }

    #[test]
    fn test_cleanup_old_days() {
        let mut snapshot = CacheSnapshot::default();
        snapshot.day_costs.insert(day("2025-10-01"), 5.0);
        snapshot.day_costs.insert(day("2025-11-15"), 10.0);
        snapshot.day_costs.insert(day("2025-11-28"), 20.0);
        snapshot.file_state.insert(
            "old.jsonl".into(),
            FileScanState {
                mod_time: at("2025-10-02T00:00:00Z"),
                size: 1,
                offset: 1,
            },
        );

        let report = prune(&mut snapshot, &at("2025-11-01T00:00:00Z"), 100);
        assert_eq!(report.days_dropped, 1);
        assert_eq!(report.files_dropped, 1);
        assert!(!report.reset);
        assert!(!snapshot.day_costs.contains_key(&day("2025-10-01")));
        assert_eq!(snapshot.day_costs.len(), 2);
    }

    #[test]
    fn day_cutoff_uses_the_bucket_zone() {
        use chrono::FixedOffset;

        // 01:00Z on Nov 1st is still Oct 31st at -05:00
        let cutoff = at("2025-11-01T01:00:00Z");
        let mut snapshot = CacheSnapshot::default();
        snapshot.day_costs.insert(day("2025-10-31"), 2.0);
        snapshot.day_costs.insert(day("2025-10-30"), 1.0);

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let report = prune(&mut snapshot, &cutoff.with_timezone(&west), 100);
        assert_eq!(report.days_dropped, 1);
        assert!(snapshot.day_costs.contains_key(&day("2025-10-31")));

        // In UTC the same instant already excludes Oct 31st
        prune(&mut snapshot, &cutoff, 100);
        assert!(snapshot.day_costs.is_empty());
    }

    #[test]
    fn dedup_cap_clears_keys_and_file_states_together() {
        let now = Utc::now();
        let mut snapshot = CacheSnapshot::default();
        for i in 0..11 {
            snapshot.processed.insert(format!("m{i}:r{i}"));
        }
        snapshot.file_state.insert(
            "a.jsonl".into(),
            FileScanState {
                mod_time: now,
                size: 10,
                offset: 10,
            },
        );
        snapshot.day_costs.insert(now.date_naive(), 4.0);

        let report = prune(&mut snapshot, &(now - Duration::days(31)), 10);
        assert!(report.reset);
        assert!(snapshot.processed.is_empty());
        assert!(snapshot.file_state.is_empty());
        assert!(snapshot.day_costs.is_empty());

        // at the cap nothing is cleared
        let mut snapshot = CacheSnapshot::default();
        for i in 0..10 {
            snapshot.processed.insert(format!("m{i}:r{i}"));
        }
        let report = prune(&mut snapshot, &(now - Duration::days(31)), 10);
        assert!(!report.reset);
        assert_eq!(snapshot.processed.len(), 10);
    }
}
