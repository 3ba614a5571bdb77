use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::admin::Admin;
use crate::api::router::RequestContext;
use crate::error::{AdminError, AdminResult};
use crate::logic::FeatureKey;
use crate::model::{SettingScope, SettingsBundle, WidgetInstance};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub booted: bool,
}

fn to_json<T: Serialize>(value: &T) -> AdminResult<Value> {
    serde_json::to_value(value).map_err(|e| AdminError::internal(format!("failed to encode response: {e}")))
}

fn require_feature(admin: &Admin, req: &RequestContext, feature: FeatureKey) -> AdminResult<()> {
    if admin.is_enabled(&req.admin, feature) {
        Ok(())
    } else {
        Err(AdminError::service_not_configured(&format!("feature {feature}")))
    }
}

/// Health check endpoint
pub async fn health_check(admin: Arc<Admin>, _req: RequestContext) -> AdminResult<Value> {
    to_json(&HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        booted: admin.is_booted(),
    })
}

pub async fn panel_schema(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    let schema = admin.panel_schema(&req.admin, req.param("panel")?).await?;
    to_json(&schema)
}

pub async fn panel_tabs(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    let tabs = admin.resolve_panel_tabs(&req.admin, req.param("panel")?)?;
    Ok(json!({ "tabs": to_json(&tabs)? }))
}

pub async fn dashboard_widgets(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Dashboard)?;
    let widgets = admin.dashboard_widgets(&req.admin).await?;
    Ok(json!({ "widgets": widgets }))
}

pub async fn dashboard_layout(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Dashboard)?;
    let layout = admin.dashboard_layout(&req.admin).await?;
    to_json(&layout)
}

#[derive(Debug, Deserialize)]
struct LayoutBody {
    #[serde(default)]
    widgets: Vec<WidgetInstance>,
}

pub async fn save_dashboard_layout(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Dashboard)?;
    let body: LayoutBody = req.body_as()?;
    let count = body.widgets.len();
    admin
        .dashboard()
        .save_user_layout_with_context(&req.admin, body.widgets)
        .await?;
    Ok(json!({ "saved": count }))
}

pub async fn navigation(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    let items = admin.navigation_for(&req.admin).await;
    Ok(json!({ "items": to_json(&items)? }))
}

/// Dispatches a named command. The body is the payload; an `ids` string
/// array is lifted out for bulk commands.
pub async fn dispatch_command(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Commands)?;
    let name = req.param("name")?;
    let mut payload = req.body_map()?;
    let ids: Vec<String> = match payload.remove("ids") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value)
            .map_err(|_| AdminError::field("ids", "expected an array of strings"))?,
    };
    let result = admin
        .commands()
        .dispatch_by_name(&req.admin, name, &payload, &ids)
        .await?;
    Ok(json!({ "result": result }))
}

pub async fn get_settings(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Settings)?;
    admin.require(&req.admin, &admin.config().permissions.settings, "settings")?;
    let settings = admin.settings();
    Ok(json!({
        "values": to_json(&settings.resolve_all(&req.admin.user_id))?,
        "definitions": to_json(&settings.definitions())?,
    }))
}

/// Writes a settings bundle. A user bundle without a user id targets the
/// caller; writing any other layer needs the update permission.
pub async fn save_settings(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    require_feature(&admin, &req, FeatureKey::Settings)?;
    let mut bundle: SettingsBundle = req.body_as()?;
    if bundle.scope == SettingScope::User && bundle.user_id.trim().is_empty() {
        bundle.user_id = req.admin.user_id.clone();
    }
    let own = bundle.scope == SettingScope::User && bundle.user_id == req.admin.user_id;
    if !own {
        admin.require(
            &req.admin,
            &admin.config().permissions.settings_update,
            "settings",
        )?;
    }
    let count = bundle.values.len();
    admin.settings().apply(&req.admin, bundle).await?;
    Ok(json!({ "saved": count }))
}

pub async fn activity(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    admin.require(&req.admin, &admin.config().permissions.activity, "activity")?;
    let log = admin
        .activity_log()
        .ok_or_else(|| AdminError::service_not_configured("activity feed"))?;
    let limit = match req.query("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AdminError::field("limit", "expected a positive integer"))?,
        None => DEFAULT_ACTIVITY_LIMIT,
    };
    let entries = log.recent(limit, req.query("action"));
    Ok(json!({ "entries": to_json(&entries)? }))
}

pub async fn features(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    admin.require(
        &req.admin,
        &admin.config().permissions.feature_flags_view,
        "feature_flags",
    )?;
    Ok(json!({ "features": to_json(&admin.feature_statuses(&req.admin))? }))
}

#[derive(Debug, Deserialize)]
struct FeatureToggle {
    enabled: bool,
}

pub async fn set_feature(admin: Arc<Admin>, req: RequestContext) -> AdminResult<Value> {
    let raw = req.param("key")?;
    let key: FeatureKey = raw
        .parse()
        .map_err(|_: String| AdminError::not_found("feature", raw))?;
    let toggle: FeatureToggle = req.body_as()?;
    admin.set_feature(&req.admin, key, toggle.enabled).await?;
    Ok(json!({ "key": key.as_str(), "enabled": toggle.enabled }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminConfig;
    use crate::error::ErrorKind;
    use crate::model::{AdminContext, SettingDefinition, SettingType};
    use std::collections::BTreeMap;

    fn admin_with(features: &[&str]) -> Arc<Admin> {
        let features: BTreeMap<String, bool> =
            features.iter().map(|f| (f.to_string(), true)).collect();
        Arc::new(
            Admin::in_memory(AdminConfig {
                features,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn request(user: &str, body: Value) -> RequestContext {
        RequestContext {
            body,
            ..RequestContext::new(AdminContext::new(user))
        }
    }

    #[tokio::test]
    async fn test_dashboard_requires_feature() {
        let admin = admin_with(&[]);
        let err = dashboard_widgets(admin, request("alice", Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceNotConfigured);
    }

    #[tokio::test]
    async fn test_user_can_write_own_settings_without_update_permission() {
        let admin = admin_with(&["settings"]);
        admin.register_setting(SettingDefinition::new("ui.density", SettingType::String, json!("cozy")));

        let out = save_settings(
            admin.clone(),
            request("alice", json!({"scope": "user", "values": {"ui.density": "compact"}})),
        )
        .await
        .unwrap();
        assert_eq!(out["saved"], 1);
        assert_eq!(
            admin.settings().value("ui.density", "alice"),
            Some(json!("compact"))
        );
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected() {
        let admin = admin_with(&["commands"]);
        let mut req = request("alice", json!({"ids": [1, 2]}));
        req.params.insert("name".to_string(), "posts.publish".to_string());
        let err = dispatch_command(admin, req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unknown_feature_is_not_found() {
        let admin = admin_with(&[]);
        let mut req = request("alice", json!({"enabled": true}));
        req.params.insert("key".to_string(), "teleport".to_string());
        let err = set_feature(admin, req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
