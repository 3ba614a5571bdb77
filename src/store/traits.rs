use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::ActivityAware;
use crate::model::{JsonMap, MenuItemType, WidgetAreaDefinition, WidgetDefinition, WidgetInstance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuRecord {
    pub id: Uuid,
    pub code: String,
    pub slug: String,
}

/// A menu item as persisted by a CMS backend, addressed by canonical path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItemRecord {
    pub path: String,
    #[serde(default)]
    pub parent_path: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub item_type: MenuItemType,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub target: JsonMap,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub badge: JsonMap,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub metadata: JsonMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItemTranslation {
    pub locale: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_key: String,
    #[serde(default)]
    pub group_title: String,
    #[serde(default)]
    pub group_title_key: String,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItemPatch {
    pub parent_path: Option<String>,
    pub position: Option<i32>,
    pub item_type: Option<MenuItemType>,
    pub target: Option<JsonMap>,
    pub icon: Option<String>,
    pub badge: Option<JsonMap>,
    pub permissions: Option<BTreeSet<String>>,
    pub classes: Option<Vec<String>>,
    pub styles: Option<BTreeMap<String, String>>,
    pub collapsible: Option<bool>,
    pub collapsed: Option<bool>,
}

impl MenuItemPatch {
    pub fn position(position: i32) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn apply(self, record: &mut MenuItemRecord) {
        if let Some(parent) = self.parent_path {
            record.parent_path = Some(parent).filter(|p| !p.is_empty());
        }
        if let Some(position) = self.position {
            record.position = Some(position);
        }
        if let Some(item_type) = self.item_type {
            record.item_type = item_type;
        }
        if let Some(target) = self.target {
            record.target = target;
        }
        if let Some(icon) = self.icon {
            record.icon = icon;
        }
        if let Some(badge) = self.badge {
            record.badge = badge;
        }
        if let Some(permissions) = self.permissions {
            record.permissions = permissions;
        }
        if let Some(classes) = self.classes {
            record.classes = classes;
        }
        if let Some(styles) = self.styles {
            record.styles = styles;
        }
        if let Some(collapsible) = self.collapsible {
            record.collapsible = collapsible;
        }
        if let Some(collapsed) = self.collapsed {
            record.collapsed = collapsed;
        }
    }
}

/// One entry of a resolved navigation, in backend insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMenuEntry {
    pub item: MenuItemRecord,
    pub translation: Option<MenuItemTranslation>,
}

/// Typed CMS menu backend.
#[async_trait::async_trait]
pub trait MenuService: Send + Sync {
    /// Upsert: succeeds whether or not the menu already existed.
    async fn create_menu(&self, code: &str) -> Result<MenuRecord>;
    async fn get_menu(&self, code: &str) -> Result<Option<MenuRecord>>;
    async fn upsert_item(&self, menu: &str, item: MenuItemRecord) -> Result<()>;
    async fn update_item(&self, menu: &str, path: &str, patch: MenuItemPatch) -> Result<()>;
    /// Removes the item and every descendant.
    async fn delete_item(&self, menu: &str, path: &str) -> Result<()>;
    /// Removes all items; a missing menu is not an error.
    async fn reset_menu(&self, code: &str) -> Result<()>;
    async fn upsert_translation(
        &self,
        menu: &str,
        path: &str,
        translation: MenuItemTranslation,
    ) -> Result<()>;
    async fn resolve_navigation(&self, menu: &str, locale: &str) -> Result<Vec<ResolvedMenuEntry>>;

    fn activity_aware(self: Arc<Self>) -> Option<Arc<dyn ActivityAware>> {
        None
    }
}

/// CMS widget backend.
#[async_trait::async_trait]
pub trait WidgetService: Send + Sync {
    async fn register_area(&self, area: WidgetAreaDefinition) -> Result<()>;
    async fn register_definition(&self, definition: WidgetDefinition) -> Result<()>;
    /// Persists an instance, assigning an id when empty; ids are stable on update.
    async fn save_instance(&self, instance: WidgetInstance) -> Result<WidgetInstance>;
    async fn delete_instance(&self, id: &str) -> Result<()>;
    async fn list_instances(&self, area: Option<&str>) -> Result<Vec<WidgetInstance>>;

    /// `None` when the backend cannot answer cheaply; callers then list instances.
    async fn has_instance_for_definition(&self, _definition: &str) -> Result<Option<bool>> {
        Ok(None)
    }

    fn activity_aware(self: Arc<Self>) -> Option<Arc<dyn ActivityAware>> {
        None
    }
}

/// Per-user preference storage.
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<Value>>;
    async fn set(&self, user_id: &str, key: &str, value: Value) -> Result<()>;

    /// Backends that record activity themselves return their sink hook here.
    fn activity_aware(self: Arc<Self>) -> Option<Arc<dyn ActivityAware>> {
        None
    }
}
