//! Decoding of single usage-log lines into billable events.

use chrono::{DateTime, Utc};

use crate::models::{LogLine, UsageEvent};

/// Why a line did not produce an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Blank,
    Malformed,
    NotAssistant,
    BadTimestamp,
    BeforeCutoff,
    NoTokens,
    MissingIds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(UsageEvent),
    Skip(SkipReason),
}

impl Decoded {
    pub fn event(self) -> Option<UsageEvent> {
        match self {
            Decoded::Event(e) => Some(e),
            Decoded::Skip(_) => None,
        }
    }
}

/// Decode one raw log line. Never fails; anything unusable is a skip.
pub fn decode_line(raw: &[u8], cutoff: DateTime<Utc>) -> Decoded {
    let line = raw.trim_ascii();
    if line.is_empty() {
        return Decoded::Skip(SkipReason::Blank);
    }

    let entry: LogLine = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(_) => return Decoded::Skip(SkipReason::Malformed),
    };

    if entry.kind.as_deref() != Some("assistant") {
        return Decoded::Skip(SkipReason::NotAssistant);
    }

    let ts = match entry
        .timestamp
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        Some(ts) => ts.with_timezone(&Utc),
        None => return Decoded::Skip(SkipReason::BadTimestamp),
    };
    if ts < cutoff {
        return Decoded::Skip(SkipReason::BeforeCutoff);
    }

    let message = entry.message.unwrap_or_default();
    let request_id = entry.request_id.unwrap_or_default();
    let event = UsageEvent {
        ts,
        role: "assistant".to_string(),
        model: message.model,
        input: message.usage.input_tokens,
        output: message.usage.output_tokens,
        cache_create: message.usage.cache_creation_input_tokens,
        cache_read: message.usage.cache_read_input_tokens,
        dedup_key: format!("{}:{}", message.id, request_id),
    };

    if !event.has_tokens() {
        return Decoded::Skip(SkipReason::NoTokens);
    }
    // A half-empty key still identifies the turn; only both-empty is rejected.
    if event.dedup_key == ":" {
        return Decoded::Skip(SkipReason::MissingIds);
    }

    Decoded::Event(event)
}

/// True when the bytes are a complete JSON document of any shape.
pub fn is_complete_json(raw: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(raw.trim_ascii()).is_ok()
}
