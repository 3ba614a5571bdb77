use serde_json::json;

use crate::config::AdminConfig;
use crate::logic::{FeatureGate, FeatureKey};
use crate::model::{
    AdminContext, MenuItem, SettingDefinition, SettingScope, SettingType, WidgetAreaDefinition,
    AREA_FOOTER, AREA_MAIN, AREA_SIDEBAR,
};

/// Settings every console carries, defaulted from configuration.
pub fn default_settings(config: &AdminConfig) -> Vec<SettingDefinition> {
    vec![
        SettingDefinition::new("admin.title", SettingType::String, json!(config.title))
            .scopes(&[SettingScope::System, SettingScope::Site])
            .describe("Title shown in the console header"),
        SettingDefinition::new(
            "admin.default_locale",
            SettingType::String,
            json!(config.default_locale),
        )
        .describe("Locale used when a request names none"),
        SettingDefinition::new("admin.theme", SettingType::String, json!(config.theme)),
        SettingDefinition::new(
            "admin.theme_variant",
            SettingType::String,
            json!(config.theme_variant),
        ),
        SettingDefinition::new("dashboard.customizable", SettingType::Bool, json!(true))
            .scopes(&[SettingScope::System, SettingScope::Site])
            .describe("Users may rearrange their dashboard"),
        SettingDefinition::new("activity.retention_days", SettingType::Number, json!(90))
            .scopes(&[SettingScope::System]),
    ]
}

pub fn default_areas() -> Vec<WidgetAreaDefinition> {
    vec![
        WidgetAreaDefinition::new(AREA_MAIN, "Main"),
        WidgetAreaDefinition::new(AREA_SIDEBAR, "Sidebar"),
        WidgetAreaDefinition::new(AREA_FOOTER, "Footer"),
    ]
}

fn link(id: &str, label: &str, path: String, icon: &str, position: i32) -> MenuItem {
    let mut item = MenuItem::new(id, label)
        .with_target("type", json!("url"))
        .with_target("path", json!(path))
        .with_icon(icon)
        .at(position);
    item.label_key = format!("menu.{id}");
    item
}

/// Root entries of the admin menu; feature-backed entries only when the
/// feature is on.
pub fn default_menu_items(config: &AdminConfig, gate: &dyn FeatureGate, ctx: &AdminContext) -> Vec<MenuItem> {
    let base = config.base_path.trim_end_matches('/');
    let mut items = vec![link(
        "dashboard",
        "Dashboard",
        if base.is_empty() { "/".to_string() } else { base.to_string() },
        "lucide:layout-dashboard",
        1,
    )];
    if gate.is_on(ctx, FeatureKey::Settings) {
        items.push(
            link("settings", "Settings", format!("{base}/settings"), "lucide:settings", 90)
                .with_permission(&config.permissions.settings),
        );
    }
    items.push(
        link("activity", "Activity", format!("{base}/activity"), "lucide:history", 91)
            .with_permission(&config.permissions.activity),
    );
    items
}
