use crate::models::AggregationMode;

#[derive(clap::Parser, Debug)]
#[command(name = "claude-costline", version, about = "Daily, weekly and monthly spend for a Claude Code statusline")]
pub struct Args {
    /// Force Claude data path(s), comma-separated. Defaults to ~/.claude and ~/.config/claude
    #[arg(long, env = "CLAUDE_CONFIG_DIR")]
    pub claude_config_dir: Option<String>,

    /// Directory holding cost_cache.json and the refreshed pricing table
    #[arg(long, env = "CLAUDE_STATUSLINE_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// Emit JSON instead of colored text
    #[arg(long)]
    pub json: bool,

    /// Cost aggregation: fixed (calendar periods) | sliding (trailing windows)
    #[arg(
        long,
        value_enum,
        env = "CLAUDE_STATUS_AGGREGATION",
        default_value_t = AggregationMode::Fixed
    )]
    pub aggregation: AggregationMode,

    /// Days of history kept in the cache
    #[arg(long, env = "CLAUDE_STATUS_RETENTION_DAYS", default_value_t = 31)]
    pub retention_days: u32,

    /// Where to fetch the pricing table from
    #[arg(long, env = "CLAUDE_STATUS_PRICING_URL")]
    pub pricing_url: Option<String>,

    /// Hours a fetched pricing table stays fresh
    #[arg(long, env = "CLAUDE_STATUS_PRICING_TTL_HOURS", default_value_t = 24)]
    pub pricing_ttl_hours: u32,

    /// Never fetch pricing over the network (embedded/cached table only)
    #[arg(long)]
    pub no_pricing_refresh: bool,

    /// Disable ANSI colors in text output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Debug mode: log cache decisions to stderr
    #[arg(long, env = "CLAUDE_STATUS_DEBUG")]
    pub debug: bool,
}

impl Args {
    pub fn parse() -> Self {
        <Args as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_sliding_aggregation() {
        let args = Args::try_parse_from(["claude-costline", "--aggregation", "sliding", "--json"])
            .unwrap();
        assert_eq!(args.aggregation, AggregationMode::Sliding);
        assert!(args.json);
        assert_eq!(args.retention_days, 31);
    }
}
