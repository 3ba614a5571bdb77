use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::common::JsonMap;

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub actor: String,
    /// Dot path, e.g. "settings.update".
    pub action: String,
    pub object: String,
    #[serde(default)]
    pub metadata: JsonMap,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(actor: &str, action: &str, object: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: action.to_string(),
            object: object.to_string(),
            metadata: JsonMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
