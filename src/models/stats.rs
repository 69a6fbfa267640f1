use serde::Serialize;

/// Windowed spend handed to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostStats {
    pub daily_cost: f64,
    pub weekly_cost: f64,
    pub monthly_cost: f64,
}

/// Calendar policy for folding day buckets into windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AggregationMode {
    /// Today, Monday-to-today, first-of-month-to-today
    #[default]
    Fixed,
    /// Trailing 24h, 7d and the whole retention window
    Sliding,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Sliding => "sliding",
        }
    }
}
