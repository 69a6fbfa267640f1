use chrono::{DateTime, Utc};

/// A billable assistant turn decoded from a usage log.
#[derive(Clone, Debug, PartialEq)]
pub struct UsageEvent {
    pub ts: DateTime<Utc>,
    pub role: String,
    pub model: String,
    pub input: u64,
    pub output: u64,
    pub cache_create: u64,
    pub cache_read: u64,
    /// `message_id:request_id`
    pub dedup_key: String,
}

impl UsageEvent {
    pub fn has_tokens(&self) -> bool {
        self.input > 0 || self.output > 0 || self.cache_create > 0 || self.cache_read > 0
    }
}
