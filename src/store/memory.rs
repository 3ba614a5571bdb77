use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{generate_id, slug_uuid, WidgetAreaDefinition, WidgetDefinition, WidgetInstance};
use crate::store::traits::{
    MenuItemPatch, MenuItemRecord, MenuItemTranslation, MenuRecord, MenuService, PreferenceStore,
    ResolvedMenuEntry, WidgetService,
};

#[derive(Debug, Clone)]
struct StoredItem {
    seq: u64,
    record: MenuItemRecord,
}

#[derive(Debug, Clone)]
struct MenuState {
    record: MenuRecord,
    items: HashMap<String, StoredItem>,
    translations: HashMap<(String, String), MenuItemTranslation>,
    next_seq: u64,
}

fn is_descendant_or_self(path: &str, root: &str) -> bool {
    path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('.'))
}

/// Menu backend used when the host supplies none.
#[derive(Debug, Default)]
pub struct InMemoryMenuService {
    menus: RwLock<HashMap<String, MenuState>>,
}

impl InMemoryMenuService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_count(&self, menu: &str) -> usize {
        self.menus
            .read()
            .get(menu)
            .map(|state| state.items.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl MenuService for InMemoryMenuService {
    async fn create_menu(&self, code: &str) -> Result<MenuRecord> {
        let mut menus = self.menus.write();
        let state = menus.entry(code.to_string()).or_insert_with(|| MenuState {
            record: MenuRecord {
                id: slug_uuid(code),
                code: code.to_string(),
                slug: code.to_string(),
            },
            items: HashMap::new(),
            translations: HashMap::new(),
            next_seq: 0,
        });
        Ok(state.record.clone())
    }

    async fn get_menu(&self, code: &str) -> Result<Option<MenuRecord>> {
        Ok(self.menus.read().get(code).map(|state| state.record.clone()))
    }

    async fn upsert_item(&self, menu: &str, item: MenuItemRecord) -> Result<()> {
        let mut menus = self.menus.write();
        let state = menus
            .get_mut(menu)
            .ok_or_else(|| anyhow!("menu {} not found", menu))?;
        match state.items.get_mut(&item.path) {
            Some(existing) => existing.record = item,
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.items.insert(item.path.clone(), StoredItem { seq, record: item });
            }
        }
        Ok(())
    }

    async fn update_item(&self, menu: &str, path: &str, patch: MenuItemPatch) -> Result<()> {
        let mut menus = self.menus.write();
        let state = menus
            .get_mut(menu)
            .ok_or_else(|| anyhow!("menu {} not found", menu))?;
        let stored = state
            .items
            .get_mut(path)
            .ok_or_else(|| anyhow!("menu item {} not found", path))?;
        patch.apply(&mut stored.record);
        Ok(())
    }

    async fn delete_item(&self, menu: &str, path: &str) -> Result<()> {
        let mut menus = self.menus.write();
        let state = menus
            .get_mut(menu)
            .ok_or_else(|| anyhow!("menu {} not found", menu))?;
        if !state.items.contains_key(path) {
            return Err(anyhow!("menu item {} not found", path));
        }
        state.items.retain(|p, _| !is_descendant_or_self(p, path));
        state
            .translations
            .retain(|(p, _), _| !is_descendant_or_self(p, path));
        Ok(())
    }

    async fn reset_menu(&self, code: &str) -> Result<()> {
        if let Some(state) = self.menus.write().get_mut(code) {
            state.items.clear();
            state.translations.clear();
        }
        Ok(())
    }

    async fn upsert_translation(
        &self,
        menu: &str,
        path: &str,
        translation: MenuItemTranslation,
    ) -> Result<()> {
        let mut menus = self.menus.write();
        let state = menus
            .get_mut(menu)
            .ok_or_else(|| anyhow!("menu {} not found", menu))?;
        if !state.items.contains_key(path) {
            return Err(anyhow!("menu item {} not found", path));
        }
        state
            .translations
            .insert((path.to_string(), translation.locale.clone()), translation);
        Ok(())
    }

    async fn resolve_navigation(&self, menu: &str, locale: &str) -> Result<Vec<ResolvedMenuEntry>> {
        let menus = self.menus.read();
        let state = menus
            .get(menu)
            .ok_or_else(|| anyhow!("menu {} not found", menu))?;
        let mut items: Vec<&StoredItem> = state.items.values().collect();
        items.sort_by_key(|stored| stored.seq);
        Ok(items
            .into_iter()
            .map(|stored| ResolvedMenuEntry {
                item: stored.record.clone(),
                translation: state
                    .translations
                    .get(&(stored.record.path.clone(), locale.to_string()))
                    .cloned(),
            })
            .collect())
    }
}

/// Widget backend used when the host supplies none.
#[derive(Debug, Default)]
pub struct InMemoryWidgetService {
    areas: RwLock<Vec<WidgetAreaDefinition>>,
    definitions: RwLock<HashMap<String, WidgetDefinition>>,
    instances: RwLock<Vec<WidgetInstance>>,
}

impl InMemoryWidgetService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn areas(&self) -> Vec<WidgetAreaDefinition> {
        self.areas.read().clone()
    }

    pub fn definition(&self, code: &str) -> Option<WidgetDefinition> {
        self.definitions.read().get(code).cloned()
    }
}

#[async_trait::async_trait]
impl WidgetService for InMemoryWidgetService {
    async fn register_area(&self, area: WidgetAreaDefinition) -> Result<()> {
        let mut areas = self.areas.write();
        match areas.iter_mut().find(|a| a.code == area.code) {
            Some(existing) => *existing = area,
            None => areas.push(area),
        }
        Ok(())
    }

    async fn register_definition(&self, definition: WidgetDefinition) -> Result<()> {
        if definition.schema.is_empty() {
            return Err(anyhow!("widget definition {} requires a schema", definition.code));
        }
        self.definitions
            .write()
            .insert(definition.code.clone(), definition);
        Ok(())
    }

    async fn save_instance(&self, mut instance: WidgetInstance) -> Result<WidgetInstance> {
        if instance.id.is_empty() {
            instance.id = generate_id();
        }
        let mut instances = self.instances.write();
        match instances.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance.clone(),
            None => instances.push(instance.clone()),
        }
        Ok(instance)
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        let mut instances = self.instances.write();
        let before = instances.len();
        instances.retain(|i| i.id != id);
        if instances.len() == before {
            return Err(anyhow!("widget instance {} not found", id));
        }
        Ok(())
    }

    async fn list_instances(&self, area: Option<&str>) -> Result<Vec<WidgetInstance>> {
        Ok(self
            .instances
            .read()
            .iter()
            .filter(|i| area.map_or(true, |a| i.area == a))
            .cloned()
            .collect())
    }

    async fn has_instance_for_definition(&self, definition: &str) -> Result<Option<bool>> {
        Ok(Some(
            self.instances
                .read()
                .iter()
                .any(|i| i.definition == definition),
        ))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    values: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .values
            .read()
            .get(&(user_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, user_id: &str, key: &str, value: Value) -> Result<()> {
        self.values
            .write()
            .insert((user_id.to_string(), key.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MenuItemType;

    fn record(path: &str, parent: Option<&str>) -> MenuItemRecord {
        MenuItemRecord {
            path: path.to_string(),
            parent_path: parent.map(str::to_string),
            item_type: MenuItemType::Item,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_menu_upsert_keeps_insertion_order() {
        let svc = InMemoryMenuService::new();
        svc.create_menu("admin_main").await.unwrap();
        svc.upsert_item("admin_main", record("admin_main.b", None)).await.unwrap();
        svc.upsert_item("admin_main", record("admin_main.a", None)).await.unwrap();
        // re-upsert does not move the item
        svc.upsert_item("admin_main", record("admin_main.b", None)).await.unwrap();

        let nav = svc.resolve_navigation("admin_main", "en").await.unwrap();
        let paths: Vec<_> = nav.iter().map(|e| e.item.path.as_str()).collect();
        assert_eq!(paths, vec!["admin_main.b", "admin_main.a"]);
    }

    #[tokio::test]
    async fn test_menu_delete_cascades_to_children() {
        let svc = InMemoryMenuService::new();
        svc.create_menu("m").await.unwrap();
        svc.upsert_item("m", record("m.content", None)).await.unwrap();
        svc.upsert_item("m", record("m.content.pages", Some("m.content"))).await.unwrap();
        svc.upsert_item("m", record("m.contentful", None)).await.unwrap();

        svc.delete_item("m", "m.content").await.unwrap();
        assert_eq!(svc.item_count("m"), 1);
        assert!(svc.delete_item("m", "m.content").await.is_err());
    }

    #[tokio::test]
    async fn test_reset_missing_menu_is_tolerated() {
        let svc = InMemoryMenuService::new();
        assert!(svc.reset_menu("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_widget_definition_requires_schema() {
        let svc = InMemoryWidgetService::new();
        let def = WidgetDefinition {
            code: "w".to_string(),
            name: "W".to_string(),
            schema: Default::default(),
        };
        assert!(svc.register_definition(def.clone()).await.is_err());
        let persisted = WidgetDefinition {
            schema: def.persisted_schema(),
            ..def
        };
        assert!(svc.register_definition(persisted).await.is_ok());
    }

    #[tokio::test]
    async fn test_widget_instance_ids_are_stable() {
        let svc = InMemoryWidgetService::new();
        let saved = svc
            .save_instance(WidgetInstance {
                definition: "w".to_string(),
                area: "a".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!saved.id.is_empty());

        let updated = svc
            .save_instance(WidgetInstance {
                span: 6,
                ..saved.clone()
            })
            .await
            .unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(svc.list_instances(None).await.unwrap().len(), 1);
        assert_eq!(svc.has_instance_for_definition("w").await.unwrap(), Some(true));
    }
}
