use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effective theme for a request after all overlays are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeSelection {
    pub name: String,
    pub variant: String,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logo_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub favicon_url: String,
    #[serde(default)]
    pub chart_theme: String,
}
