use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::model::common::JsonMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuItemType {
    #[default]
    Item,
    Group,
    Separator,
}

impl std::fmt::Display for MenuItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MenuItemType::Item => write!(f, "item"),
            MenuItemType::Group => write!(f, "group"),
            MenuItemType::Separator => write!(f, "separator"),
        }
    }
}

impl std::str::FromStr for MenuItemType {
    type Err = String;

    /// Lenient: anything that is not a group or separator is an item.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "group" | "section" => Ok(MenuItemType::Group),
            "separator" | "divider" => Ok(MenuItemType::Separator),
            _ => Ok(MenuItemType::Item),
        }
    }
}

/// A navigation entry addressed by its canonical dot path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, rename = "type")]
    pub item_type: MenuItemType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_title_key: String,
    /// Recognised keys: type, path, key, url, slug.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub target: JsonMap,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub badge: JsonMap,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub permissions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub menu: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn group(id: &str, label: &str) -> Self {
        Self {
            item_type: MenuItemType::Group,
            ..Self::new(id, label)
        }
    }

    pub fn with_parent(mut self, parent_id: &str) -> Self {
        self.parent_id = parent_id.to_string();
        self
    }

    pub fn with_target(mut self, key: &str, value: Value) -> Self {
        self.target.insert(key.to_string(), value);
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permissions.insert(permission.to_string());
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = icon.to_string();
        self
    }

    pub fn at(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn collapsible(mut self) -> Self {
        self.collapsible = true;
        self
    }

    pub fn target_str(&self, key: &str) -> Option<&str> {
        self.target
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Depth-first walk over this item and all descendants.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a MenuItem>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// A resolved menu: normalized slug, deterministic id and item tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub id: Uuid,
    pub code: String,
    pub slug: String,
    pub locale: String,
    pub items: Vec<MenuItem>,
}

impl Menu {
    /// Every item in the tree, parents before children.
    pub fn flatten(&self) -> Vec<&MenuItem> {
        let mut out = Vec::new();
        for item in &self.items {
            item.walk(&mut out);
        }
        out
    }
}
