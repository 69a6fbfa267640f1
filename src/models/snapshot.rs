use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where scanning of one log file left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileScanState {
    pub mod_time: DateTime<Utc>,
    pub size: u64,
    pub offset: u64,
}

/// Durable state of the cost cache: day buckets, per-file offsets and the
/// set of dedup keys already counted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default)]
    pub day_costs: BTreeMap<NaiveDate, f64>,
    #[serde(default)]
    pub file_state: HashMap<String, FileScanState>,
    #[serde(default, rename = "processed_messages", with = "dedup_keys")]
    pub processed: HashSet<String>,
}

impl CacheSnapshot {
    pub fn total_cost(&self) -> f64 {
        // `sum` of no f64s is -0.0
        self.day_costs.values().fold(0.0, |acc, c| acc + c)
    }
}

// On disk the dedup set is a `{key: true}` object.
mod dedup_keys {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap, HashSet};

    pub fn serialize<S: Serializer>(keys: &HashSet<String>, s: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<&str, bool> = keys.iter().map(|k| (k.as_str(), true)).collect();
        map.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<HashSet<String>, D::Error> {
        let map = HashMap::<String, bool>::deserialize(d)?;
        Ok(map.into_iter().filter(|(_, seen)| *seen).map(|(k, _)| k).collect())
    }
}
