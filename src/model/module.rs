use serde::{Deserialize, Serialize};

/// Static description of a module contributed by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Module is loaded only when every listed feature is enabled.
    #[serde(default)]
    pub feature_flags: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ModuleManifest {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn requires(mut self, feature: &str) -> Self {
        self.feature_flags.push(feature.to_string());
        self
    }
}
