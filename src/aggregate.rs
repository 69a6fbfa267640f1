//! Folding of day buckets into daily, weekly and monthly totals.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

use crate::models::{AggregationMode, CacheSnapshot, CostStats};

/// Pure over `(snapshot, now)`; bucket dates are compared in `now`'s zone.
pub fn aggregate<Tz: TimeZone>(
    snapshot: &CacheSnapshot,
    now: &DateTime<Tz>,
    mode: AggregationMode,
) -> CostStats {
    let today = now.date_naive();
    match mode {
        AggregationMode::Sliding => {
            let day_start = (now.clone() - Duration::hours(24)).date_naive();
            let week_start = (now.clone() - Duration::days(7)).date_naive();
            CostStats {
                daily_cost: sum_since(snapshot, day_start, None),
                weekly_cost: sum_since(snapshot, week_start, None),
                monthly_cost: snapshot.total_cost(),
            }
        }
        AggregationMode::Fixed => {
            let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            let first = today.with_day(1).unwrap_or(today);
            CostStats {
                daily_cost: snapshot.day_costs.get(&today).copied().unwrap_or(0.0),
                weekly_cost: sum_since(snapshot, monday, Some(today)),
                monthly_cost: sum_since(snapshot, first, Some(today)),
            }
        }
    }
}

fn sum_since(snapshot: &CacheSnapshot, from: NaiveDate, to: Option<NaiveDate>) -> f64 {
    snapshot
        .day_costs
        .range(from..)
        .take_while(|(day, _)| to.is_none_or(|to| **day <= to))
        .fold(0.0, |acc, (_, cost)| acc + cost)
}
