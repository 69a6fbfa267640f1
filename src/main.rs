use anyhow::Result;
#[cfg(feature = "colors")]
use owo_colors::OwoColorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use claude_costline::cli::Args;
use claude_costline::config::CostConfig;
#[cfg(not(feature = "colors"))]
use claude_costline::display::color_shim::ColorizeShim;
use claude_costline::display::{print_json_output, print_text_output};
use claude_costline::tracker::CostTracker;

fn init_logging(debug: bool) {
    // Status lines own stdout; logs only go to stderr and only when asked for.
    if !debug {
        return;
    }
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claude_costline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let cfg = CostConfig::from_args(&args)?;
    let mode = cfg.aggregation;
    let tracker = CostTracker::from_config(cfg);
    let report = tracker.compute_now();

    if args.json {
        print_json_output(&report, mode)?;
    } else {
        print_text_output(&report.stats, mode, args.no_color)?;
    }

    if args.debug {
        let cfg = tracker.config();
        eprintln!("{}", "=== costline debug ===".bright_black());
        eprintln!(
            "Roots: {}",
            cfg.claude_roots
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        eprintln!("Cache: {}", cfg.cache_file().display());
        eprintln!(
            "Files: {} seen, {} scanned, {} unchanged, {} stale, {} failed",
            report.summary.files_seen,
            report.summary.files_scanned,
            report.summary.files_unchanged,
            report.summary.files_stale,
            report.summary.files_failed
        );
        eprintln!(
            "Events: {} new, {} duplicates; lock={}, saved={}, pricing={:?}",
            report.summary.events,
            report.summary.duplicates,
            report.locked,
            report.saved,
            report.pricing_source
        );
        eprintln!("{}", "======================".bright_black());
    }

    // Output is already flushed. A fetch starts at most once per pricing TTL
    // and is bounded by its HTTP timeout; waiting keeps the fetched table.
    if let Some(handle) = report.refresh {
        let _ = handle.join();
    }
    Ok(())
}
