use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_RETENTION_DAYS: i64 = 31;
pub const DEFAULT_DEDUP_CAP: usize = 100_000;
pub const CACHE_DIR_NAME: &str = "claude-code-statusline";

/// Claude data roots that carry a `projects/` directory.
pub fn claude_paths(override_env: Option<&str>) -> Vec<PathBuf> {
    let mut paths = vec![];
    if let Some(list) = override_env {
        let list = list.trim();
        if !list.is_empty() {
            for p in list.split(',') {
                let p = p.trim();
                if p.is_empty() {
                    continue;
                }
                let pb = PathBuf::from(p);
                if pb.join("projects").is_dir() {
                    paths.push(pb);
                }
            }
            if !paths.is_empty() {
                return paths;
            }
        }
    }
    let basedirs = directories::BaseDirs::new();
    let home = basedirs
        .as_ref()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~"));
    let xdg_config = basedirs
        .as_ref()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| home.join(".config"));
    // Prefer ~/.claude, then XDG config
    for base in [home.join(".claude"), xdg_config.join("claude")].into_iter() {
        if base.join("projects").is_dir() {
            paths.push(base);
        }
    }
    paths
}

/// `~/.cache/claude-code-statusline` (platform cache dir elsewhere).
pub fn default_cache_dir() -> Option<PathBuf> {
    let base = directories::BaseDirs::new()?;
    if cfg!(unix) {
        return Some(base.home_dir().join(".cache").join(CACHE_DIR_NAME));
    }
    Some(base.cache_dir().join(CACHE_DIR_NAME))
}

pub fn parse_bool_env(var: &str) -> Option<bool> {
    let val = env::var(var).ok()?;
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn format_currency(v: f64) -> String {
    format!("{v:.2}")
}

/// Calendar date of an instant as seen in `tz`.
pub fn local_day<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}
