use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AdminError, AdminResult};
use crate::model::{DashboardProviderSpec, ModuleManifest, Panel, PanelTab, SettingDefinition};

/// Process-wide store of named contributions.
#[derive(Default)]
pub struct Registry {
    panels: RwLock<HashMap<String, Arc<Panel>>>,
    modules: RwLock<Vec<ModuleManifest>>,
    providers: RwLock<Vec<DashboardProviderSpec>>,
    settings: RwLock<HashMap<String, SettingDefinition>>,
    panel_tabs: RwLock<HashMap<String, Vec<PanelTab>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_panel(&self, name: &str, panel: Panel) -> AdminResult<Arc<Panel>> {
        let mut panels = self.panels.write();
        if panels.contains_key(name) {
            return Err(AdminError::duplicate("panel", name));
        }
        let panel = Arc::new(panel);
        panels.insert(name.to_string(), panel.clone());
        Ok(panel)
    }

    pub fn unregister_panel(&self, name: &str) -> AdminResult<()> {
        self.panels
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdminError::not_found("panel", name))
    }

    pub fn panel(&self, name: &str) -> Option<Arc<Panel>> {
        self.panels.read().get(name).cloned()
    }

    /// All panels sorted by name.
    pub fn panels(&self) -> Vec<Arc<Panel>> {
        let mut panels: Vec<Arc<Panel>> = self.panels.read().values().cloned().collect();
        panels.sort_by(|a, b| a.name.cmp(&b.name));
        panels
    }

    pub fn register_module(&self, manifest: ModuleManifest) -> AdminResult<()> {
        if manifest.id.trim().is_empty() {
            return Err(AdminError::required_field("module.id"));
        }
        let mut modules = self.modules.write();
        if modules.iter().any(|m| m.id == manifest.id) {
            return Err(AdminError::duplicate("module", &manifest.id));
        }
        modules.push(manifest);
        Ok(())
    }

    /// Modules in registration order.
    pub fn modules(&self) -> Vec<ModuleManifest> {
        self.modules.read().clone()
    }

    /// Last write wins; the original slot keeps its insertion position.
    pub fn register_dashboard_provider(&self, spec: DashboardProviderSpec) {
        let mut providers = self.providers.write();
        match providers.iter_mut().find(|p| p.code == spec.code) {
            Some(existing) => *existing = spec,
            None => providers.push(spec),
        }
    }

    pub fn dashboard_provider(&self, code: &str) -> Option<DashboardProviderSpec> {
        self.providers.read().iter().find(|p| p.code == code).cloned()
    }

    /// Providers sorted by code.
    pub fn dashboard_providers(&self) -> Vec<DashboardProviderSpec> {
        let mut providers = self.providers.read().clone();
        providers.sort_by(|a, b| a.code.cmp(&b.code));
        providers
    }

    pub fn register_setting(&self, definition: SettingDefinition) {
        self.settings
            .write()
            .insert(definition.key.clone(), definition);
    }

    /// Setting definitions sorted by key.
    pub fn settings(&self) -> Vec<SettingDefinition> {
        let mut defs: Vec<SettingDefinition> = self.settings.read().values().cloned().collect();
        defs.sort_by(|a, b| a.key.cmp(&b.key));
        defs
    }

    /// Stores a tab against `panel`, which need not be registered yet.
    pub fn register_panel_tab(&self, panel: &str, tab: PanelTab) -> AdminResult<PanelTab> {
        let tab = tab.normalized()?;
        let mut tabs = self.panel_tabs.write();
        let entries = tabs.entry(panel.to_string()).or_default();
        if entries.iter().any(|t| t.id == tab.id) {
            return Err(AdminError::duplicate("panel tab", &format!("{panel}.{}", tab.id)));
        }
        entries.push(tab.clone());
        Ok(tab)
    }

    /// Installs `tab` in place of the tab currently stored under `replaces`
    /// (or appends it when there is none).
    pub fn set_panel_tab(&self, panel: &str, replaces: &str, tab: PanelTab) {
        let mut tabs = self.panel_tabs.write();
        let entries = tabs.entry(panel.to_string()).or_default();
        match entries.iter().position(|t| t.id == replaces) {
            Some(idx) => entries[idx] = tab,
            None => entries.push(tab),
        }
    }

    pub fn find_panel_tab(&self, panel: &str, id: &str) -> Option<PanelTab> {
        self.panel_tabs
            .read()
            .get(panel)
            .and_then(|tabs| tabs.iter().find(|t| t.id == id).cloned())
    }

    /// Tabs for `panel`, sorted by position then id.
    pub fn panel_tabs(&self, panel: &str) -> Vec<PanelTab> {
        let mut tabs = self
            .panel_tabs
            .read()
            .get(panel)
            .cloned()
            .unwrap_or_default();
        tabs.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        tabs
    }
}
