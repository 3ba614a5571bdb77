use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::contracts::{record_activity, ActivityAware, ActivitySink};
use crate::error::{AdminError, AdminResult};
use crate::model::{
    ActivityEntry, AdminContext, ResolvedSetting, SettingDefinition, SettingScope, SettingsBundle,
};
use crate::store::InMemoryActivitySink;

const WRITABLE_SCOPES: [SettingScope; 3] = [SettingScope::System, SettingScope::Site, SettingScope::User];

#[derive(Debug, Default)]
struct Layers {
    definitions: HashMap<String, SettingDefinition>,
    system: HashMap<String, Value>,
    site: HashMap<String, Value>,
    user: HashMap<String, HashMap<String, Value>>,
}

/// Layered typed key/value settings (user → site → system → default).
pub struct SettingsService {
    layers: RwLock<Layers>,
    activity: RwLock<Arc<dyn ActivitySink>>,
}

impl SettingsService {
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Layers::default()),
            activity: RwLock::new(Arc::new(InMemoryActivitySink::new())),
        }
    }

    pub fn register_definition(&self, mut definition: SettingDefinition) {
        if definition.allowed_scopes.is_empty() {
            definition.allowed_scopes = WRITABLE_SCOPES.iter().copied().collect();
        }
        self.layers
            .write()
            .definitions
            .insert(definition.key.clone(), definition);
    }

    pub fn definition(&self, key: &str) -> Option<SettingDefinition> {
        self.layers.read().definitions.get(key).cloned()
    }

    /// All definitions sorted by key.
    pub fn definitions(&self) -> Vec<SettingDefinition> {
        let mut defs: Vec<SettingDefinition> =
            self.layers.read().definitions.values().cloned().collect();
        defs.sort_by(|a, b| a.key.cmp(&b.key));
        defs
    }

    /// Validates every value of the bundle and writes them all, or none.
    pub async fn apply(&self, ctx: &AdminContext, bundle: SettingsBundle) -> AdminResult<()> {
        if bundle.scope == SettingScope::Default {
            return Err(AdminError::invalid_argument("the default layer is read-only"));
        }
        if bundle.scope == SettingScope::User && bundle.user_id.trim().is_empty() {
            return Err(AdminError::required_field("user_id"));
        }
        if bundle.values.is_empty() {
            return Ok(());
        }

        {
            let mut layers = self.layers.write();
            let mut failures = BTreeMap::new();
            for (key, value) in &bundle.values {
                let Some(def) = layers.definitions.get(key) else {
                    failures.insert(key.clone(), "unknown setting".to_string());
                    continue;
                };
                if !def.allowed_scopes.contains(&bundle.scope) {
                    failures.insert(
                        key.clone(),
                        format!("scope {} not allowed", bundle.scope),
                    );
                    continue;
                }
                if !def.value_type.accepts(value) {
                    failures.insert(key.clone(), def.value_type.expectation().to_string());
                }
            }
            if !failures.is_empty() {
                log::debug!("rejected settings bundle: {} invalid field(s)", failures.len());
                return Err(AdminError::validation(failures));
            }

            let layer = match bundle.scope {
                SettingScope::System => &mut layers.system,
                SettingScope::Site => &mut layers.site,
                _ => layers.user.entry(bundle.user_id.clone()).or_default(),
            };
            for (key, value) in &bundle.values {
                layer.insert(key.clone(), value.clone());
            }
        }

        let sink = self.activity.read().clone();
        let keys: Vec<&String> = bundle.values.keys().collect();
        let object = match bundle.scope {
            SettingScope::User => format!("settings:user:{}", bundle.user_id),
            scope => format!("settings:{scope}"),
        };
        let entry = ActivityEntry::new(&ctx.actor(), "settings.update", &object)
            .with("scope", json!(bundle.scope))
            .with("keys", json!(keys));
        record_activity(&sink, ctx, entry).await;
        Ok(())
    }

    /// First layer holding `key` in precedence order, else the default.
    pub fn resolve(&self, key: &str, user_id: &str) -> AdminResult<ResolvedSetting> {
        let layers = self.layers.read();
        let def = layers
            .definitions
            .get(key)
            .ok_or_else(|| AdminError::not_found("setting", key))?;
        Ok(Self::resolve_in(&layers, def, user_id))
    }

    fn resolve_in(layers: &Layers, def: &SettingDefinition, user_id: &str) -> ResolvedSetting {
        let key = def.key.as_str();
        let user_value = if user_id.is_empty() {
            None
        } else {
            layers.user.get(user_id).and_then(|values| values.get(key))
        };
        let (value, scope, provenance) = if let Some(v) = user_value {
            (v.clone(), SettingScope::User, format!("user:{user_id}"))
        } else if let Some(v) = layers.site.get(key) {
            (v.clone(), SettingScope::Site, "site".to_string())
        } else if let Some(v) = layers.system.get(key) {
            (v.clone(), SettingScope::System, "system".to_string())
        } else {
            (def.default.clone(), SettingScope::Default, "default".to_string())
        };
        ResolvedSetting {
            key: key.to_string(),
            value,
            scope,
            provenance,
        }
    }

    /// Resolution of every defined key, sorted by key.
    pub fn resolve_all(&self, user_id: &str) -> Vec<ResolvedSetting> {
        let layers = self.layers.read();
        let mut resolved: Vec<ResolvedSetting> = layers
            .definitions
            .values()
            .map(|def| Self::resolve_in(&layers, def, user_id))
            .collect();
        resolved.sort_by(|a, b| a.key.cmp(&b.key));
        resolved
    }

    pub fn value(&self, key: &str, user_id: &str) -> Option<Value> {
        self.resolve(key, user_id).ok().map(|r| r.value)
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityAware for SettingsService {
    fn set_activity_sink(&self, sink: Arc<dyn ActivitySink>) {
        *self.activity.write() = sink;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::SettingType;

    fn service() -> SettingsService {
        let svc = SettingsService::new();
        svc.register_definition(SettingDefinition::new(
            "site.title",
            SettingType::String,
            json!("Admin"),
        ));
        svc.register_definition(SettingDefinition::new(
            "feature.enabled",
            SettingType::Bool,
            json!(false),
        ));
        svc.register_definition(
            SettingDefinition::new("dashboard.columns", SettingType::Number, json!(12))
                .scopes(&[SettingScope::User]),
        );
        svc
    }

    #[tokio::test]
    async fn test_precedence_user_site_system_default() {
        let svc = service();
        let ctx = AdminContext::new("alice");
        assert_eq!(svc.resolve("site.title", "alice").unwrap().scope, SettingScope::Default);

        svc.apply(&ctx, SettingsBundle::new(SettingScope::System).set("site.title", json!("Sys")))
            .await
            .unwrap();
        assert_eq!(svc.resolve("site.title", "alice").unwrap().value, json!("Sys"));

        svc.apply(&ctx, SettingsBundle::new(SettingScope::Site).set("site.title", json!("Site")))
            .await
            .unwrap();
        let resolved = svc.resolve("site.title", "alice").unwrap();
        assert_eq!(resolved.value, json!("Site"));
        assert_eq!(resolved.scope, SettingScope::Site);

        svc.apply(&ctx, SettingsBundle::for_user("alice").set("site.title", json!("Mine")))
            .await
            .unwrap();
        let resolved = svc.resolve("site.title", "alice").unwrap();
        assert_eq!(resolved.value, json!("Mine"));
        assert_eq!(resolved.provenance, "user:alice");
        // other users still see the site layer
        assert_eq!(svc.resolve("site.title", "bob").unwrap().value, json!("Site"));
    }

    #[tokio::test]
    async fn test_type_mismatch_rejects_whole_bundle() {
        let svc = service();
        let err = svc
            .apply(
                &AdminContext::system(),
                SettingsBundle::new(SettingScope::Site)
                    .set("feature.enabled", json!("yes"))
                    .set("site.title", json!("ok")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            err.fields().get("feature.enabled").map(String::as_str),
            Some("expected boolean")
        );
        // nothing was written, not even the valid key
        assert_eq!(svc.resolve("site.title", "").unwrap().scope, SettingScope::Default);
    }

    #[tokio::test]
    async fn test_unknown_key_and_scope_are_field_errors() {
        let svc = service();
        let err = svc
            .apply(
                &AdminContext::system(),
                SettingsBundle::new(SettingScope::Site)
                    .set("nope", json!(1))
                    .set("dashboard.columns", json!(6)),
            )
            .await
            .unwrap_err();
        let fields = err.fields();
        assert_eq!(fields.get("nope").map(String::as_str), Some("unknown setting"));
        assert!(fields["dashboard.columns"].contains("not allowed"));
    }

    #[tokio::test]
    async fn test_user_scope_requires_user_id() {
        let svc = service();
        let err = svc
            .apply(
                &AdminContext::system(),
                SettingsBundle::new(SettingScope::User).set("site.title", json!("x")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequiredField);
    }

    #[tokio::test]
    async fn test_apply_then_resolve_all_round_trip() {
        let svc = service();
        svc.apply(
            &AdminContext::new("alice"),
            SettingsBundle::for_user("alice")
                .set("dashboard.columns", json!(6))
                .set("feature.enabled", json!(true)),
        )
        .await
        .unwrap();

        let all = svc.resolve_all("alice");
        let keys: Vec<_> = all.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["dashboard.columns", "feature.enabled", "site.title"]);
        for resolved in &all[..2] {
            assert_eq!(resolved.scope, SettingScope::User);
        }
        assert_eq!(all[0].value, json!(6));
    }

    #[tokio::test]
    async fn test_apply_records_activity() {
        let svc = service();
        let sink = Arc::new(InMemoryActivitySink::new());
        svc.set_activity_sink(sink.clone());
        svc.apply(
            &AdminContext::new("alice"),
            SettingsBundle::new(SettingScope::Site).set("site.title", json!("T")),
        )
        .await
        .unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "settings.update");
        assert_eq!(entries[0].actor, "alice");
    }
}
