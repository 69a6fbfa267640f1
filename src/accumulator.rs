//! Folding of decoded events into day buckets, counting each dedup key once.

use chrono::TimeZone;

use crate::models::{CacheSnapshot, ModelPrice, UsageEvent};
use crate::pricing::PriceResolver;
use crate::utils::local_day;

/// Cache writes are billed at 1.25x the input rate
pub const CACHE_WRITE_MULTIPLIER: f64 = 1.25;
/// Cache reads are billed at 0.1x the input rate
pub const CACHE_READ_MULTIPLIER: f64 = 0.10;

const PER_MILLION: f64 = 1_000_000.0;

/// USD cost of one event.
///
/// Output tokens are charged twice: once at the plain input rate and once at
/// the output rate.
pub fn event_cost(event: &UsageEvent, price: ModelPrice) -> f64 {
    let input = event.input as f64 / PER_MILLION;
    let output = event.output as f64 / PER_MILLION;
    let cache_create = event.cache_create as f64 / PER_MILLION;
    let cache_read = event.cache_read as f64 / PER_MILLION;

    input * price.input
        + output * price.input
        + cache_create * price.input * CACHE_WRITE_MULTIPLIER
        + cache_read * price.input * CACHE_READ_MULTIPLIER
        + output * price.output
}

pub struct CostAccumulator<'a, Tz: TimeZone> {
    snapshot: &'a mut CacheSnapshot,
    resolver: &'a PriceResolver,
    tz: Tz,
    counted: usize,
    duplicates: usize,
}

impl<'a, Tz: TimeZone> CostAccumulator<'a, Tz> {
    pub fn new(snapshot: &'a mut CacheSnapshot, resolver: &'a PriceResolver, tz: Tz) -> Self {
        Self {
            snapshot,
            resolver,
            tz,
            counted: 0,
            duplicates: 0,
        }
    }

    /// Add the event's cost to its local day. Returns false when the dedup
    /// key was already counted, in which case nothing changes.
    pub fn accumulate(&mut self, event: &UsageEvent) -> bool {
        if self.snapshot.processed.contains(&event.dedup_key) {
            self.duplicates += 1;
            return false;
        }
        self.snapshot.processed.insert(event.dedup_key.clone());

        let cost = event_cost(event, self.resolver.resolve(&event.model));
        let day = local_day(&event.ts, &self.tz);
        *self.snapshot.day_costs.entry(day).or_insert(0.0) += cost;
        self.counted += 1;
        true
    }

    pub fn counted(&self) -> usize {
        self.counted
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricingTable;
    use chrono::{DateTime, NaiveDate, Utc};

    const SONNET: ModelPrice = ModelPrice {
        input: 3.0,
        output: 15.0,
    };

    fn event(key: &str, ts: &str) -> UsageEvent {
        UsageEvent {
            ts: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            role: "assistant".into(),
            model: "claude-sonnet-4-5".into(),
            input: 0,
            output: 0,
            cache_create: 0,
            cache_read: 0,
            dedup_key: key.into(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn cache_tier_multipliers() {
        let mut e = event("m:r", "2025-11-29T10:00:00Z");
        e.cache_create = 1_000_000;
        assert!(approx(event_cost(&e, SONNET), 3.75));

        let mut e = event("m:r", "2025-11-29T10:00:00Z");
        e.cache_read = 1_000_000;
        assert!(approx(event_cost(&e, SONNET), 0.30));
    }

    #[test]
    fn input_and_output_rates() {
        let mut e = event("m:r", "2025-11-29T10:00:00Z");
        e.input = 1_000_000;
        assert!(approx(event_cost(&e, SONNET), 3.0));

        let mut e = event("m:r", "2025-11-29T10:00:00Z");
        e.output = 1_000_000;
        assert!(approx(event_cost(&e, SONNET), 3.0 + 15.0));
    }

    #[test]
    fn same_key_counts_once() {
        let mut snapshot = CacheSnapshot::default();
        let resolver = PriceResolver::new(PricingTable::default());
        let mut acc = CostAccumulator::new(&mut snapshot, &resolver, Utc);

        let mut e = event("msg1:req1", "2025-11-29T10:00:00Z");
        e.input = 1_000_000;
        assert!(acc.accumulate(&e));
        for _ in 0..5 {
            assert!(!acc.accumulate(&e));
        }
        assert_eq!(acc.counted(), 1);
        assert_eq!(acc.duplicates(), 5);

        let day = NaiveDate::from_ymd_opt(2025, 11, 29).unwrap();
        assert!(approx(snapshot.day_costs[&day], 3.0));
        assert_eq!(snapshot.processed.len(), 1);
    }

    #[test]
    fn events_land_in_their_own_day() {
        let mut snapshot = CacheSnapshot::default();
        let resolver = PriceResolver::new(PricingTable::default());
        let mut acc = CostAccumulator::new(&mut snapshot, &resolver, Utc);
        for (i, day) in ["2025-11-27", "2025-11-28", "2025-11-29"].iter().enumerate() {
            let mut e = event(&format!("msg{i}:req{i}"), &format!("{day}T12:00:00Z"));
            e.input = 1_000_000;
            acc.accumulate(&e);
        }
        assert_eq!(snapshot.day_costs.len(), 3);
        assert!(snapshot.day_costs.values().all(|c| approx(*c, 3.0)));
    }
}
