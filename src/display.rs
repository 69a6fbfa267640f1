#[cfg(feature = "colors")]
use owo_colors::OwoColorize;
use std::env;
use std::io::{self, Write};

#[cfg(not(feature = "colors"))]
pub mod color_shim {
    use std::fmt::{self, Display, Formatter};

    #[derive(Clone)]
    pub struct Plain(pub String);

    impl Display for Plain {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    pub trait ColorizeShim {
        fn as_str(&self) -> &str;

        fn bright_black(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn bright_green(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn bright_yellow(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
        fn bright_magenta(&self) -> Plain {
            Plain(self.as_str().to_string())
        }
    }

    impl ColorizeShim for &str {
        fn as_str(&self) -> &str {
            self
        }
    }
    impl ColorizeShim for String {
        fn as_str(&self) -> &str {
            self.as_str()
        }
    }
}

#[cfg(not(feature = "colors"))]
use color_shim::ColorizeShim as OwoColorize;

use crate::models::{AggregationMode, CostStats};
use crate::pricing::PricingSource;
use crate::tracker::CostReport;
use crate::utils::format_currency;

fn colors_enabled(no_color: bool) -> bool {
    // Respect NO_COLOR even when the flag was not passed
    !no_color && env::var_os("NO_COLOR").is_none()
}

fn window_labels(mode: AggregationMode) -> [&'static str; 3] {
    match mode {
        AggregationMode::Fixed => ["today", "week", "month"],
        AggregationMode::Sliding => ["24h", "7d", "30d"],
    }
}

/// One-line summary, e.g. `$1.20 today · $8.40 week · $31.00 month`.
pub fn format_text_output(stats: &CostStats, mode: AggregationMode, no_color: bool) -> String {
    let [day, week, month] = window_labels(mode);
    let values = [
        (format!("${}", format_currency(stats.daily_cost)), day),
        (format!("${}", format_currency(stats.weekly_cost)), week),
        (format!("${}", format_currency(stats.monthly_cost)), month),
    ];
    let sep = " · ";

    if !colors_enabled(no_color) {
        return values
            .iter()
            .map(|(v, l)| format!("{v} {l}"))
            .collect::<Vec<_>>()
            .join(sep);
    }

    let parts = [
        format!("{} {}", values[0].0.bright_green(), day.bright_black()),
        format!("{} {}", values[1].0.bright_yellow(), week.bright_black()),
        format!("{} {}", values[2].0.bright_magenta(), month.bright_black()),
    ];
    let sep = sep.bright_black().to_string();
    parts.join(sep.as_str())
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pricing_source_str(source: PricingSource) -> &'static str {
    match source {
        PricingSource::Cached => "cached",
        PricingSource::StaleCache => "stale_cache",
        PricingSource::Embedded => "embedded",
    }
}

pub fn build_json_output(report: &CostReport, mode: AggregationMode) -> serde_json::Value {
    let s = &report.summary;
    serde_json::json!({
        "daily_cost": round_cents(report.stats.daily_cost),
        "weekly_cost": round_cents(report.stats.weekly_cost),
        "monthly_cost": round_cents(report.stats.monthly_cost),
        "aggregation": mode.as_str(),
        "pricing_source": pricing_source_str(report.pricing_source),
        "scan": {
            "files": s.files_seen,
            "scanned": s.files_scanned,
            "unchanged": s.files_unchanged,
            "failed": s.files_failed,
            "events": s.events,
            "duplicates": s.duplicates,
        },
    })
}

pub fn print_json_output(report: &CostReport, mode: AggregationMode) -> anyhow::Result<()> {
    let json = build_json_output(report, mode);
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, &json)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

pub fn print_text_output(stats: &CostStats, mode: AggregationMode, no_color: bool) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", format_text_output(stats, mode, no_color))?;
    out.flush()?;
    Ok(())
}
