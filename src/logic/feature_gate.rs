//! Feature keys, their dependency graph and the gates answering "is it on".

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{AdminError, AdminResult, FeatureIssue};
use crate::model::AdminContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    Cms,
    Commands,
    Dashboard,
    Notifications,
    Bulk,
    Jobs,
    Search,
    Settings,
    Preferences,
    Profile,
    Users,
    Tenants,
    Organizations,
    Media,
    Export,
    TranslationExchange,
    TranslationQueue,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 17] = [
        FeatureKey::Cms,
        FeatureKey::Commands,
        FeatureKey::Dashboard,
        FeatureKey::Notifications,
        FeatureKey::Bulk,
        FeatureKey::Jobs,
        FeatureKey::Search,
        FeatureKey::Settings,
        FeatureKey::Preferences,
        FeatureKey::Profile,
        FeatureKey::Users,
        FeatureKey::Tenants,
        FeatureKey::Organizations,
        FeatureKey::Media,
        FeatureKey::Export,
        FeatureKey::TranslationExchange,
        FeatureKey::TranslationQueue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Cms => "cms",
            FeatureKey::Commands => "commands",
            FeatureKey::Dashboard => "dashboard",
            FeatureKey::Notifications => "notifications",
            FeatureKey::Bulk => "bulk",
            FeatureKey::Jobs => "jobs",
            FeatureKey::Search => "search",
            FeatureKey::Settings => "settings",
            FeatureKey::Preferences => "preferences",
            FeatureKey::Profile => "profile",
            FeatureKey::Users => "users",
            FeatureKey::Tenants => "tenants",
            FeatureKey::Organizations => "organizations",
            FeatureKey::Media => "media",
            FeatureKey::Export => "export",
            FeatureKey::TranslationExchange => "translation_exchange",
            FeatureKey::TranslationQueue => "translation_queue",
        }
    }

    /// Direct dependencies, in the order they are reported.
    pub fn dependencies(&self) -> &'static [FeatureKey] {
        use FeatureKey::*;
        match self {
            Bulk => &[Commands, Jobs],
            Jobs => &[Commands, Cms],
            Export => &[Commands, Jobs],
            Media => &[Cms],
            TranslationQueue => &[Commands, Cms],
            TranslationExchange => &[Commands],
            Profile => &[Preferences],
            Tenants | Organizations => &[Users],
            _ => &[],
        }
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeatureKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '.'], "_");
        FeatureKey::ALL
            .iter()
            .find(|key| key.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

pub trait FeatureGate: Send + Sync {
    fn enabled(&self, ctx: &AdminContext, key: &str) -> bool;

    fn is_on(&self, ctx: &AdminContext, key: FeatureKey) -> bool {
        self.enabled(ctx, key.as_str())
    }
}

/// Gates whose answers can be overridden at runtime.
pub trait MutableFeatureGate: FeatureGate {
    fn set(&self, key: &str, enabled: bool);
}

/// Gate backed by a plain map; unknown keys are off.
#[derive(Debug, Default)]
pub struct StaticFeatureGate {
    flags: RwLock<BTreeMap<String, bool>>,
}

impl StaticFeatureGate {
    pub fn new(flags: &BTreeMap<String, bool>) -> Self {
        let flags = flags
            .iter()
            .map(|(k, v)| (normalize_key(k), *v))
            .collect();
        Self {
            flags: RwLock::new(flags),
        }
    }

    pub fn with(self, key: FeatureKey, enabled: bool) -> Self {
        self.set(key.as_str(), enabled);
        self
    }

    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.flags.read().clone()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(['-', '.'], "_")
}

impl FeatureGate for StaticFeatureGate {
    fn enabled(&self, _ctx: &AdminContext, key: &str) -> bool {
        self.flags
            .read()
            .get(&normalize_key(key))
            .copied()
            .unwrap_or(false)
    }
}

impl MutableFeatureGate for StaticFeatureGate {
    fn set(&self, key: &str, enabled: bool) {
        self.flags.write().insert(normalize_key(key), enabled);
    }
}

/// Disabled transitive dependencies of `key`, depth first in declaration order.
pub fn missing_dependencies(gate: &dyn FeatureGate, ctx: &AdminContext, key: FeatureKey) -> Vec<FeatureKey> {
    fn walk(
        gate: &dyn FeatureGate,
        ctx: &AdminContext,
        key: FeatureKey,
        seen: &mut HashSet<FeatureKey>,
        missing: &mut Vec<FeatureKey>,
    ) {
        for dep in key.dependencies() {
            if !seen.insert(*dep) {
                continue;
            }
            if !gate.is_on(ctx, *dep) {
                missing.push(*dep);
            }
            walk(gate, ctx, *dep, seen, missing);
        }
    }

    let mut seen = HashSet::from([key]);
    let mut missing = Vec::new();
    walk(gate, ctx, key, &mut seen, &mut missing);
    missing
}

/// One issue per enabled feature with disabled dependencies, aggregated into a
/// single `invalid_feature_config` error.
pub fn validate_feature_dependencies(gate: &dyn FeatureGate, ctx: &AdminContext) -> AdminResult<()> {
    let issues: Vec<FeatureIssue> = FeatureKey::ALL
        .iter()
        .filter(|key| gate.is_on(ctx, **key))
        .filter_map(|key| {
            let missing = missing_dependencies(gate, ctx, *key);
            (!missing.is_empty()).then(|| FeatureIssue {
                feature: key.as_str().to_string(),
                missing: missing.iter().map(|m| m.as_str().to_string()).collect(),
            })
        })
        .collect();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AdminError::invalid_feature_config(issues))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Display metadata for features, optionally loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    #[serde(default)]
    pub features: Vec<FeatureDescriptor>,
}

impl FeatureCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading feature catalog {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing feature catalog {}", path.display()))
    }

    pub fn describe(&self, key: &str) -> Option<&FeatureDescriptor> {
        let key = normalize_key(key);
        self.features.iter().find(|f| normalize_key(&f.key) == key)
    }
}
