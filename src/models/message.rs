use serde::Deserialize;

/// Token counters attached to an assistant message.
#[derive(Deserialize, Debug, Default)]
pub struct MessageUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

#[derive(Deserialize, Debug, Default)]
pub struct MessageObj {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: MessageUsage,
}

/// One line of a session usage log. Unknown fields are ignored.
#[derive(Deserialize, Debug)]
pub struct LogLine {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<MessageObj>,
    #[serde(default, rename = "requestId")]
    pub request_id: Option<String>,
}
