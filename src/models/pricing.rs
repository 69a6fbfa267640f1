use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

impl ModelPrice {
    /// Mid-tier family rate used when no table entry matches.
    pub const DEFAULT: ModelPrice = ModelPrice {
        input: 3.0,
        output: 15.0,
    };
}

/// Pricing file layout, shared by the embedded table and the refreshed cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    pub updated: String,
    pub models: HashMap<String, ModelPrice>,
}

impl PricingTable {
    pub fn from_json(raw: &[u8]) -> Option<Self> {
        let table: PricingTable = serde_json::from_slice(raw).ok()?;
        if table.models.is_empty() {
            return None;
        }
        Some(table)
    }

    pub fn get(&self, model_id: &str) -> Option<ModelPrice> {
        self.models.get(model_id).copied()
    }
}
