use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a dashboard is being rendered for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Client,
    Ssr,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RenderMode::Client => write!(f, "client"),
            RenderMode::Ssr => write!(f, "ssr"),
        }
    }
}

impl std::str::FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(RenderMode::Client),
            "ssr" | "server" => Ok(RenderMode::Ssr),
            _ => Err(format!("Unknown render mode: {}", s)),
        }
    }
}

/// Request-scoped theme override (e.g. from a query parameter or header).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeOverride {
    /// Empty leaves the current value in place.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variant: String,
}

/// Per-request viewer context passed explicitly through every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminContext {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub org_id: Option<String>,
    pub locale: String,
    pub render_mode: Option<RenderMode>,
    pub theme: Option<ThemeOverride>,
    /// Free-form request attributes (request id, impersonation markers, ...).
    pub attributes: BTreeMap<String, String>,
}

impl AdminContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: None,
            org_id: None,
            locale: String::new(),
            render_mode: None,
            theme: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Context for internal operations (bootstrap, seeding, background jobs).
    pub fn system() -> Self {
        Self::new("system")
    }

    pub fn anonymous() -> Self {
        Self::new("")
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }

    pub fn with_theme(mut self, theme: ThemeOverride) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns a copy whose render mode is `mode` unless one is already set.
    pub fn defaulting_render_mode(&self, mode: RenderMode) -> Self {
        let mut ctx = self.clone();
        if ctx.render_mode.is_none() {
            ctx.render_mode = Some(mode);
        }
        ctx
    }

    /// Actor recorded in activity entries: the user id, or the `actor`
    /// attribute, or "system".
    pub fn actor(&self) -> String {
        if !self.user_id.trim().is_empty() {
            return self.user_id.clone();
        }
        self.attributes
            .get("actor")
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "system".to_string())
    }

    pub fn locale_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.locale.trim().is_empty() {
            fallback
        } else {
            &self.locale
        }
    }
}

impl Default for AdminContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mode_default_only_when_unset() {
        let ctx = AdminContext::new("u1");
        assert_eq!(
            ctx.defaulting_render_mode(RenderMode::Client).render_mode,
            Some(RenderMode::Client)
        );

        let ssr = AdminContext::new("u1").with_render_mode(RenderMode::Ssr);
        assert_eq!(
            ssr.defaulting_render_mode(RenderMode::Client).render_mode,
            Some(RenderMode::Ssr)
        );
    }

    #[test]
    fn test_actor_falls_back_to_attribute_then_system() {
        assert_eq!(AdminContext::new("alice").actor(), "alice");
        assert_eq!(
            AdminContext::anonymous().with_attribute("actor", "cron").actor(),
            "cron"
        );
        assert_eq!(AdminContext::anonymous().actor(), "system");
    }

    #[test]
    fn test_render_mode_parsing() {
        assert_eq!("SSR".parse::<RenderMode>(), Ok(RenderMode::Ssr));
        assert!("table".parse::<RenderMode>().is_err());
    }
}
