use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::model::{JsonMap, WidgetAreaDefinition, WidgetDefinition, WidgetInstance};
use crate::store::reflect::{self, DynamicBackend};
use crate::store::traits::{
    MenuItemPatch, MenuItemRecord, MenuItemTranslation, MenuRecord, MenuService,
    ResolvedMenuEntry, WidgetService,
};

fn args(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).with_context(|| format!("decoding result of {}", method))
}

/// Menu contract over a backend discovered by method name.
pub struct DynamicMenuService {
    backend: Arc<dyn DynamicBackend>,
}

impl DynamicMenuService {
    pub fn new(backend: Arc<dyn DynamicBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl MenuService for DynamicMenuService {
    async fn create_menu(&self, code: &str) -> Result<MenuRecord> {
        let value = reflect::call(
            &*self.backend,
            &["CreateMenu", "UpsertMenu", "EnsureMenu"],
            args(json!({ "code": code })),
        )
        .await?;
        decode("CreateMenu", value)
    }

    async fn get_menu(&self, code: &str) -> Result<Option<MenuRecord>> {
        let value = reflect::call(
            &*self.backend,
            &["GetMenu", "MenuByCode", "FindMenu"],
            args(json!({ "code": code })),
        )
        .await?;
        decode("GetMenu", value)
    }

    async fn upsert_item(&self, menu: &str, item: MenuItemRecord) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["UpsertMenuItemByPath", "UpsertItem", "UpsertMenuItem"],
            args(json!({ "menu": menu, "path": item.path.clone(), "item": item })),
        )
        .await?;
        Ok(())
    }

    async fn update_item(&self, menu: &str, path: &str, patch: MenuItemPatch) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["UpdateMenuItemByPath", "UpdateItem", "UpdateMenuItem"],
            args(json!({ "menu": menu, "path": path, "patch": patch })),
        )
        .await?;
        Ok(())
    }

    async fn delete_item(&self, menu: &str, path: &str) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["DeleteMenuItemByPath", "DeleteItem", "DeleteMenuItem"],
            args(json!({ "menu": menu, "path": path, "cascade": true })),
        )
        .await?;
        Ok(())
    }

    async fn reset_menu(&self, code: &str) -> Result<()> {
        if !reflect::supports(&*self.backend, &["ResetMenuByCode", "ResetMenu"]) {
            log::debug!("dynamic menu backend has no reset operation; skipping reset of {}", code);
            return Ok(());
        }
        reflect::call(
            &*self.backend,
            &["ResetMenuByCode", "ResetMenu"],
            args(json!({ "code": code })),
        )
        .await?;
        Ok(())
    }

    async fn upsert_translation(
        &self,
        menu: &str,
        path: &str,
        translation: MenuItemTranslation,
    ) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["UpsertMenuItemTranslation", "UpsertTranslation"],
            args(json!({
                "menu": menu,
                "path": path,
                "locale": translation.locale.clone(),
                "translation": translation,
            })),
        )
        .await?;
        Ok(())
    }

    async fn resolve_navigation(&self, menu: &str, locale: &str) -> Result<Vec<ResolvedMenuEntry>> {
        let value = reflect::call(
            &*self.backend,
            &["ResolveNavigation", "Navigation", "ResolveMenu"],
            args(json!({ "menu": menu, "locale": locale })),
        )
        .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode("ResolveNavigation", value)
    }
}

/// Widget contract over a backend discovered by method name.
pub struct DynamicWidgetService {
    backend: Arc<dyn DynamicBackend>,
}

impl DynamicWidgetService {
    pub fn new(backend: Arc<dyn DynamicBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl WidgetService for DynamicWidgetService {
    async fn register_area(&self, area: WidgetAreaDefinition) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["RegisterAreaDefinition", "RegisterArea"],
            args(json!({ "code": area.code, "name": area.name, "scope": area.scope })),
        )
        .await?;
        Ok(())
    }

    async fn register_definition(&self, definition: WidgetDefinition) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["RegisterDefinition", "RegisterWidgetDefinition"],
            args(json!({
                "code": definition.code,
                "name": definition.name,
                "schema": Value::Object(definition.persisted_schema()),
            })),
        )
        .await?;
        Ok(())
    }

    async fn save_instance(&self, instance: WidgetInstance) -> Result<WidgetInstance> {
        let value = reflect::call(
            &*self.backend,
            &["SaveInstance", "CreateInstance", "UpsertInstance"],
            args(json!({ "instance": instance.clone() })),
        )
        .await?;
        if value.is_null() {
            return Ok(instance);
        }
        decode("SaveInstance", value)
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        reflect::call(
            &*self.backend,
            &["DeleteInstance", "RemoveInstance"],
            args(json!({ "id": id })),
        )
        .await?;
        Ok(())
    }

    async fn list_instances(&self, area: Option<&str>) -> Result<Vec<WidgetInstance>> {
        let value = reflect::call(
            &*self.backend,
            &["ListInstances", "Instances"],
            args(json!({ "area": area })),
        )
        .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        decode("ListInstances", value)
    }

    async fn has_instance_for_definition(&self, definition: &str) -> Result<Option<bool>> {
        let candidates = ["HasInstanceForDefinition"];
        if !reflect::supports(&*self.backend, &candidates) {
            return Ok(None);
        }
        let value = reflect::call(
            &*self.backend,
            &candidates,
            args(json!({ "definition": definition })),
        )
        .await?;
        Ok(value.as_bool())
    }
}
