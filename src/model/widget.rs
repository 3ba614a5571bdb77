use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::contracts::ProviderHandler;
use crate::model::common::{clamp_span, JsonMap};
use crate::model::theme::ThemeSelection;

pub const AREA_MAIN: &str = "admin.dashboard.main";
pub const AREA_SIDEBAR: &str = "admin.dashboard.sidebar";
pub const AREA_FOOTER: &str = "admin.dashboard.footer";

/// Areas listed first, in this order; everything else follows lexicographically.
pub const PREFERRED_AREAS: [&str; 3] = [AREA_MAIN, AREA_SIDEBAR, AREA_FOOTER];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetAreaDefinition {
    pub code: String,
    pub name: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "global".to_string()
}

impl WidgetAreaDefinition {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            scope: default_scope(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub schema: JsonMap,
}

impl WidgetDefinition {
    /// Schema as handed to backends, which reject an empty object.
    pub fn persisted_schema(&self) -> JsonMap {
        if self.schema.is_empty() {
            match json!({ "fields": [] }) {
                Value::Object(map) => map,
                _ => JsonMap::new(),
            }
        } else {
            self.schema.clone()
        }
    }
}

/// Placement of a widget definition in an area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetInstance {
    #[serde(default)]
    pub id: String,
    pub definition: String,
    pub area: String,
    #[serde(default)]
    pub config: JsonMap,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub span: i32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
}

pub type DashboardWidgetInstance = WidgetInstance;

impl WidgetInstance {
    pub fn effective_span(&self) -> i32 {
        clamp_span(self.span)
    }
}

/// Registration record for a dashboard data provider.
#[derive(Clone, Default)]
pub struct DashboardProviderSpec {
    pub code: String,
    pub name: String,
    pub schema: Option<JsonMap>,
    pub default_area: String,
    pub default_config: JsonMap,
    pub default_span: i32,
    pub permission: Option<String>,
    pub command_name: Option<String>,
    pub handler: Option<Arc<dyn ProviderHandler>>,
}

impl fmt::Debug for DashboardProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardProviderSpec")
            .field("code", &self.code)
            .field("name", &self.name)
            .field("default_area", &self.default_area)
            .field("default_span", &self.default_span)
            .field("permission", &self.permission)
            .field("command_name", &self.command_name)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl DashboardProviderSpec {
    pub fn new(code: &str, handler: Arc<dyn ProviderHandler>) -> Self {
        Self {
            code: code.to_string(),
            name: code.to_string(),
            handler: Some(handler),
            ..Default::default()
        }
    }

    pub fn in_area(mut self, area: &str) -> Self {
        self.default_area = area.to_string();
        self
    }

    pub fn with_span(mut self, span: i32) -> Self {
        self.default_span = span;
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permission = Some(permission.to_string());
        self
    }

    pub fn with_command(mut self, command_name: &str) -> Self {
        self.command_name = Some(command_name.to_string());
        self
    }

    pub fn with_config(mut self, config: JsonMap) -> Self {
        self.default_config = config;
        self
    }

    pub fn definition(&self) -> WidgetDefinition {
        WidgetDefinition {
            code: self.code.clone(),
            name: if self.name.is_empty() {
                self.code.clone()
            } else {
                self.name.clone()
            },
            schema: self.schema.clone().unwrap_or_default(),
        }
    }

    pub fn area_or_default(&self) -> &str {
        if self.default_area.trim().is_empty() {
            AREA_MAIN
        } else {
            &self.default_area
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetLayoutMeta {
    pub width: i32,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWidget {
    pub id: String,
    pub definition: String,
    pub area: String,
    pub data: JsonMap,
    pub config: JsonMap,
    pub hidden: bool,
    pub span: i32,
    pub layout: WidgetLayoutMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardArea {
    pub code: String,
    pub title: String,
    pub widgets: Vec<ResolvedWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardLayout {
    pub areas: Vec<DashboardArea>,
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSelection>,
}

impl DashboardLayout {
    pub fn widgets(&self) -> impl Iterator<Item = &ResolvedWidget> {
        self.areas.iter().flat_map(|area| area.widgets.iter())
    }
}

/// Sort key placing preferred areas first, then the rest by code.
pub fn area_rank(code: &str) -> (usize, String) {
    let rank = PREFERRED_AREAS
        .iter()
        .position(|preferred| *preferred == code)
        .unwrap_or(PREFERRED_AREAS.len());
    (rank, code.to_string())
}
