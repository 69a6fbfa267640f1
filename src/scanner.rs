//! # Scanner Module
//!
//! Incremental reading of append-only usage logs.
//!
//! Each candidate file is compared with the state recorded on the previous
//! run and is either skipped, resumed at the last processed byte, or scanned
//! again from the start:
//!
//! | prior state | observation                 | plan    |
//! |-------------|-----------------------------|---------|
//! | none        |                             | fresh   |
//! | some        | same mtime, same size       | skip    |
//! | some        | size grew                   | resume  |
//! | some        | size shrank                 | restart |
//! | some        | same size, different mtime  | restart |
//!
//! A final line without a trailing newline counts as complete once it parses
//! as JSON. Until then it is treated as a writer mid-flush: it is not fed to
//! the sink and the recorded offset stops at its first byte, so the finished
//! line is read whole on a later run.
//!
//! Enumeration and byte access go through [`LogSource`] so the decision logic
//! can be exercised against in-memory files.

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::decoder::is_complete_json;
use crate::models::FileScanState;

/// A candidate log file as observed by a single stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

impl LogFile {
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Where usage logs come from.
pub trait LogSource {
    /// Candidate files with their current mtime and size.
    fn list_files(&self) -> Vec<LogFile>;

    /// Buffered reader positioned at `offset`.
    fn open_at(&self, path: &Path, offset: u64) -> io::Result<Box<dyn BufRead + '_>>;
}

/// `*.jsonl` files below one or more `projects/` directories.
#[derive(Debug, Clone)]
pub struct FsLogSource {
    roots: Vec<PathBuf>,
}

impl FsLogSource {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }
}

impl LogSource for FsLogSource {
    fn list_files(&self) -> Vec<LogFile> {
        let mut files = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file()
                    || entry.path().extension().and_then(|e| e.to_str()) != Some("jsonl")
                {
                    continue;
                }
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                let Ok(modified) = meta.modified() else {
                    continue;
                };
                files.push(LogFile {
                    path: entry.into_path(),
                    modified: modified.into(),
                    size: meta.len(),
                });
            }
        }
        files
    }

    fn open_at(&self, path: &Path, offset: u64) -> io::Result<Box<dyn BufRead + '_>> {
        let mut file = File::open(path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPlan {
    /// Last modified before the retention cutoff; never opened
    SkipStale,
    /// Same mtime and size as last time
    SkipUnchanged,
    Fresh,
    Resume(u64),
    /// Shrunk, rewritten in place, or recorded offset beyond the end
    Restart,
}

pub fn plan_scan(
    file: &LogFile,
    prior: Option<&FileScanState>,
    cutoff: DateTime<Utc>,
) -> ScanPlan {
    if file.modified < cutoff {
        return ScanPlan::SkipStale;
    }
    let Some(prior) = prior else {
        return ScanPlan::Fresh;
    };
    if prior.size == file.size && prior.mod_time == file.modified {
        return ScanPlan::SkipUnchanged;
    }
    // Growth alone is enough to resume: writers may flush with a stale mtime.
    if file.size > prior.size && prior.offset <= file.size {
        return ScanPlan::Resume(prior.offset);
    }
    ScanPlan::Restart
}

#[derive(Debug)]
pub enum ScanOutcome {
    Skipped(ScanPlan),
    Completed { state: FileScanState, lines: usize },
    /// Open or read failed; prior state must be kept
    Failed(io::Error),
}

/// Feed the unprocessed lines of `file` to `sink` and report the new state.
///
/// Reading stops at the size observed when the file was listed, so bytes
/// appended meanwhile are left for the next run. A trailing line without a
/// newline is treated as complete once it parses as JSON; until then the
/// offset stays at its start.
pub fn scan_file<S, F>(
    source: &S,
    file: &LogFile,
    prior: Option<&FileScanState>,
    cutoff: DateTime<Utc>,
    mut sink: F,
) -> ScanOutcome
where
    S: LogSource + ?Sized,
    F: FnMut(&[u8]),
{
    let plan = plan_scan(file, prior, cutoff);
    let start = match plan {
        ScanPlan::SkipStale | ScanPlan::SkipUnchanged => return ScanOutcome::Skipped(plan),
        ScanPlan::Fresh | ScanPlan::Restart => 0,
        ScanPlan::Resume(offset) => offset,
    };
    match plan {
        ScanPlan::Resume(offset) => debug!(
            file = %file.path.display(),
            offset,
            size = file.size,
            "resuming log file"
        ),
        ScanPlan::Restart => debug!(file = %file.path.display(), "rescanning log file from start"),
        _ => {}
    }

    let reader = match source.open_at(&file.path, start) {
        Ok(r) => r,
        Err(e) => return ScanOutcome::Failed(e),
    };
    let mut reader = reader.take(file.size.saturating_sub(start));

    let mut consumed = start;
    let mut lines = 0usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(file = %file.path.display(), offset = consumed, "read error: {e}");
                return ScanOutcome::Failed(e);
            }
        };
        let terminated = buf.last() == Some(&b'\n');
        if !terminated && !buf.trim_ascii().is_empty() && !is_complete_json(&buf) {
            debug!(file = %file.path.display(), offset = consumed, "partial trailing line, holding offset");
            break;
        }
        sink(&buf);
        consumed += n as u64;
        lines += 1;
    }

    ScanOutcome::Completed {
        state: FileScanState {
            mod_time: file.modified,
            size: file.size,
            offset: consumed,
        },
        lines,
    }
}
