use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingScope {
    System,
    Site,
    User,
    Default,
}

impl std::fmt::Display for SettingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SettingScope::System => write!(f, "system"),
            SettingScope::Site => write!(f, "site"),
            SettingScope::User => write!(f, "user"),
            SettingScope::Default => write!(f, "default"),
        }
    }
}

impl std::str::FromStr for SettingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(SettingScope::System),
            "site" => Ok(SettingScope::Site),
            "user" => Ok(SettingScope::User),
            _ => Err(format!("Unknown setting scope: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Bool,
    Number,
}

impl SettingType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            SettingType::String => value.is_string(),
            SettingType::Bool => value.is_boolean(),
            SettingType::Number => value.is_number(),
        }
    }

    pub fn expectation(&self) -> &'static str {
        match self {
            SettingType::String => "expected string",
            SettingType::Bool => "expected boolean",
            SettingType::Number => "expected number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefinition {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub default: Value,
    #[serde(rename = "type")]
    pub value_type: SettingType,
    /// Empty means every writable scope (system, site, user).
    #[serde(default)]
    pub allowed_scopes: BTreeSet<SettingScope>,
}

impl SettingDefinition {
    pub fn new(key: &str, value_type: SettingType, default: Value) -> Self {
        Self {
            key: key.to_string(),
            description: String::new(),
            default,
            value_type,
            allowed_scopes: BTreeSet::new(),
        }
    }

    pub fn scopes(mut self, scopes: &[SettingScope]) -> Self {
        self.allowed_scopes = scopes.iter().copied().collect();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A batch of writes into a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsBundle {
    pub scope: SettingScope,
    #[serde(default)]
    pub user_id: String,
    pub values: BTreeMap<String, Value>,
}

impl SettingsBundle {
    pub fn new(scope: SettingScope) -> Self {
        Self {
            scope,
            user_id: String::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::new(SettingScope::User)
        }
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

/// A setting value together with the layer it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSetting {
    pub key: String,
    pub value: Value,
    pub scope: SettingScope,
    /// Human readable origin, e.g. "user:alice" or "default".
    pub provenance: String,
}
