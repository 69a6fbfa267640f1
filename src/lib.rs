//! # Claude Costline
//!
//! Daily, weekly and monthly spend for a Claude Code statusline, kept in an
//! incremental on-disk cache so each invocation only reads log bytes it has
//! not seen before.
//!
//! ## Overview
//!
//! Usage logs (`~/.claude/projects/**/*.jsonl`) are append-only. Every run:
//! - skips files whose mtime and size are unchanged
//! - resumes grown files at the last processed byte
//! - rescans truncated or rewritten files from the start
//! - counts each assistant message once (message id + request id)
//! - prices tokens per model and adds the cost to a local-date bucket
//!
//! Buckets are then folded into fixed (calendar) or sliding (trailing) windows.
//!
//! ## Features
//!
//! - `colors` (default): Enables terminal color output via owo-colors

/// Folding of priced events into day buckets
pub mod accumulator;

/// Day buckets to daily/weekly/monthly windows
pub mod aggregate;

/// Command-line argument parsing
pub mod cli;

/// Runtime configuration built from CLI/env
pub mod config;

/// Single log line decoding
pub mod decoder;

/// Display formatting for text and JSON output
pub mod display;

/// Cross-process cache lock
pub mod lock;

/// Data models for log lines, events, pricing and the cache snapshot
pub mod models;

/// Model pricing lookup and refresh
pub mod pricing;

/// Incremental log file scanning
pub mod scanner;

/// Cache snapshot persistence
pub mod store;

/// The load/scan/save cycle
pub mod tracker;

/// Utility functions for paths, formatting, and time
pub mod utils;
