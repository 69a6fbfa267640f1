pub mod entry;
pub mod message;
pub mod pricing;
pub mod snapshot;
pub mod stats;

pub use entry::UsageEvent;
pub use message::{LogLine, MessageObj, MessageUsage};
pub use pricing::{ModelPrice, PricingTable};
pub use snapshot::{CacheSnapshot, FileScanState};
pub use stats::{AggregationMode, CostStats};
