use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ThemeSelection;

pub const DEFAULT_BASE_PATH: &str = "/admin";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_TITLE: &str = "Admin";
pub const DEFAULT_NAV_MENU_CODE: &str = "admin.main";
pub const DEFAULT_THEME: &str = "admin";
pub const DEFAULT_THEME_VARIANT: &str = "light";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub server: ServerConfig,
    pub base_path: String,
    pub default_locale: String,
    pub title: String,
    pub theme: String,
    pub theme_variant: String,
    pub theme_tokens: BTreeMap<String, String>,
    pub theme_asset_prefix: String,
    pub logo_url: String,
    pub favicon_url: String,
    /// Feature key → enabled. Keys are normalized by the feature gate.
    pub features: BTreeMap<String, bool>,
    pub nav_menu_code: String,
    pub permissions: PermissionConfig,
    pub cms: CmsConfig,
    pub urls: UrlConfig,
    pub feature_catalog_path: Option<String>,
    pub debug: DebugConfig,
    pub enable_public_api: bool,
    /// Static files served under the theme asset prefix by the host binary.
    pub assets_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub settings: String,
    pub settings_update: String,
    pub feature_flags_view: String,
    pub feature_flags_update: String,
    pub activity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Use the menu backend for navigation; off means static fallbacks only.
    pub enabled: bool,
    /// Widget placements outside registered areas are dropped.
    pub enforce_known_areas: bool,
    pub media_library_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub admin_base_path: String,
    pub public_base_path: String,
    pub api_prefix: String,
    pub admin_api_version: String,
    pub public_api_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub repl_timeout_secs: u64,
    pub permission: String,
    pub allowed_packages: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

fn fill(slot: &mut String, value: &str) {
    if slot.trim().is_empty() {
        *slot = value.to_string();
    }
}

impl AdminConfig {
    /// Load configuration from defaults, an optional `admin.*` file and
    /// `ADMIN_` environment variables (`__` separates nested keys).
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AdminConfig::default())?);

        config = config.add_source(config::File::with_name("admin").required(false));

        config = config.add_source(
            config::Environment::with_prefix("ADMIN")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let mut admin_config: AdminConfig = config.try_deserialize()?;
        admin_config.apply_defaults();

        Ok(admin_config)
    }

    /// Fills every empty option with its default. Idempotent.
    pub fn apply_defaults(&mut self) {
        fill(&mut self.base_path, DEFAULT_BASE_PATH);
        if !self.base_path.starts_with('/') {
            self.base_path.insert(0, '/');
        }
        if self.base_path.len() > 1 {
            self.base_path = self.base_path.trim_end_matches('/').to_string();
        }
        fill(&mut self.default_locale, DEFAULT_LOCALE);
        fill(&mut self.title, DEFAULT_TITLE);
        fill(&mut self.theme, DEFAULT_THEME);
        fill(&mut self.theme_variant, DEFAULT_THEME_VARIANT);
        fill(&mut self.nav_menu_code, DEFAULT_NAV_MENU_CODE);

        fill(&mut self.permissions.settings, "admin.settings.view");
        fill(&mut self.permissions.settings_update, "admin.settings.edit");
        fill(&mut self.permissions.feature_flags_view, "admin.feature_flags.view");
        fill(&mut self.permissions.feature_flags_update, "admin.feature_flags.update");
        fill(&mut self.permissions.activity, "admin.activity.view");

        let base_path = self.base_path.clone();
        fill(&mut self.urls.admin_base_path, &base_path);
        fill(&mut self.urls.public_base_path, "/");
        fill(&mut self.urls.api_prefix, "api");
        fill(&mut self.urls.public_api_version, "v1");
        fill(&mut self.cms.media_library_path, &format!("{}/media/library", base_path));

        if self.debug.repl_timeout_secs == 0 {
            self.debug.repl_timeout_secs = 30;
        }
        fill(&mut self.debug.permission, "admin.debug.repl");
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// `{admin base}/{api prefix}[/{version}]`, e.g. `/admin/api`.
    pub fn admin_api_base(&self) -> String {
        join_api(
            &self.urls.admin_base_path,
            &self.urls.api_prefix,
            &self.urls.admin_api_version,
        )
    }

    pub fn public_api_base(&self) -> String {
        join_api(
            &self.urls.public_base_path,
            &self.urls.api_prefix,
            &self.urls.public_api_version,
        )
    }

    /// Theme selection before any per-user or per-request overlay.
    pub fn base_theme(&self) -> ThemeSelection {
        ThemeSelection {
            name: self.theme.clone(),
            variant: self.theme_variant.clone(),
            tokens: self.theme_tokens.clone(),
            asset_prefix: self.theme_asset_prefix.clone(),
            logo_url: self.logo_url.clone(),
            favicon_url: self.favicon_url.clone(),
            chart_theme: String::new(),
        }
    }
}

fn join_api(base: &str, prefix: &str, version: &str) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for segment in [prefix, version] {
        let segment = segment.trim_matches('/');
        if !segment.is_empty() {
            out.push('/');
            out.push_str(segment);
        }
    }
    if out.is_empty() {
        "/".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_empty_options() {
        let mut config = AdminConfig::default();
        config.apply_defaults();
        assert_eq!(config.base_path, "/admin");
        assert_eq!(config.default_locale, "en");
        assert_eq!(config.nav_menu_code, "admin.main");
        assert_eq!(config.permissions.settings_update, "admin.settings.edit");
        assert_eq!(config.urls.api_prefix, "api");
        assert_eq!(config.urls.admin_api_version, "");
        assert_eq!(config.urls.public_api_version, "v1");
        assert_eq!(config.admin_api_base(), "/admin/api");
        assert_eq!(config.public_api_base(), "/api/v1");

        let snapshot = format!("{:?}", config);
        config.apply_defaults();
        assert_eq!(format!("{:?}", config), snapshot);
    }

    #[test]
    fn test_base_path_is_normalized() {
        let mut config = AdminConfig {
            base_path: "console/".to_string(),
            ..Default::default()
        };
        config.apply_defaults();
        assert_eq!(config.base_path, "/console");
        assert_eq!(config.admin_api_base(), "/console/api");
    }

    #[test]
    fn test_base_theme_carries_config() {
        let mut config = AdminConfig {
            theme_variant: "dark".to_string(),
            logo_url: "/static/logo.svg".to_string(),
            ..Default::default()
        };
        config.apply_defaults();
        let theme = config.base_theme();
        assert_eq!(theme.name, "admin");
        assert_eq!(theme.variant, "dark");
        assert_eq!(theme.logo_url, "/static/logo.svg");
    }

    #[test]
    fn test_server_address() {
        assert_eq!(AdminConfig::default().server_address(), "127.0.0.1:3001");
    }
}
