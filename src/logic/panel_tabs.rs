use std::sync::Arc;

use crate::contracts::Authorizer;
use crate::error::{AdminError, AdminResult};
use crate::logic::navigation::NAVIGATION_RESOURCE;
use crate::model::{AdminContext, PanelTab, TabScope};

pub const DETAILS_TAB_ID: &str = "details";

/// Picks the tab to keep when two tabs of a panel share an id.
pub trait TabCollisionHandler: Send + Sync {
    fn resolve(&self, panel: &str, existing: &PanelTab, incoming: &PanelTab) -> AdminResult<PanelTab>;
}

impl<F> TabCollisionHandler for F
where
    F: Fn(&str, &PanelTab, &PanelTab) -> AdminResult<PanelTab> + Send + Sync,
{
    fn resolve(&self, panel: &str, existing: &PanelTab, incoming: &PanelTab) -> AdminResult<PanelTab> {
        self(panel, existing, incoming)
    }
}

/// Default policy: the first registration wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepExisting;

impl TabCollisionHandler for KeepExisting {
    fn resolve(&self, panel: &str, existing: &PanelTab, incoming: &PanelTab) -> AdminResult<PanelTab> {
        log::warn!(
            "panel {}: duplicate tab id {}; keeping the first registration (dropped label {:?})",
            panel,
            existing.id,
            incoming.label
        );
        Ok(existing.clone())
    }
}

pub type TabPermissionEvaluator = Arc<dyn Fn(&AdminContext, &PanelTab) -> bool + Send + Sync>;

/// How tab permissions are checked: a dedicated evaluator wins over the
/// authorizer; with neither, every tab is visible.
#[derive(Clone, Default)]
pub struct TabGate {
    pub evaluator: Option<TabPermissionEvaluator>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
}

impl TabGate {
    pub fn allows(&self, ctx: &AdminContext, tab: &PanelTab) -> bool {
        if tab.permission.trim().is_empty() {
            return true;
        }
        if let Some(evaluator) = &self.evaluator {
            return evaluator(ctx, tab);
        }
        match &self.authorizer {
            Some(authorizer) => authorizer.can(ctx, &tab.permission, NAVIGATION_RESOURCE),
            None => true,
        }
    }
}

/// Installs the collision winner in `tabs` at `idx`. The winner is normalized
/// and may carry a new id, which must not collide with any other tab.
pub fn apply_collision(
    panel: &str,
    tabs: &mut [PanelTab],
    idx: usize,
    incoming: &PanelTab,
    handler: &dyn TabCollisionHandler,
) -> AdminResult<()> {
    let chosen = handler.resolve(panel, &tabs[idx], incoming)?.normalized()?;
    let clash = tabs
        .iter()
        .enumerate()
        .any(|(i, t)| i != idx && t.id == chosen.id);
    if clash {
        return Err(AdminError::conflict(format!(
            "panel {panel}: resolved tab {} collides with another tab",
            chosen.id
        )));
    }
    tabs[idx] = chosen;
    Ok(())
}

/// Effective tabs of a panel: owned tabs then registry tabs, normalized,
/// permission gated, collapsed by id, sorted by (position, id), with the
/// implicit details tab inserted when needed.
pub fn merge_panel_tabs(
    panel: &str,
    ctx: &AdminContext,
    owned: &[PanelTab],
    extra: &[PanelTab],
    gate: &TabGate,
    collisions: &dyn TabCollisionHandler,
) -> AdminResult<Vec<PanelTab>> {
    let mut merged: Vec<PanelTab> = Vec::with_capacity(owned.len() + extra.len() + 1);
    for tab in owned.iter().chain(extra) {
        let tab = tab.clone().normalized()?;
        if !gate.allows(ctx, &tab) {
            continue;
        }
        match merged.iter().position(|t| t.id == tab.id) {
            Some(idx) => apply_collision(panel, &mut merged, idx, &tab, collisions)?,
            None => merged.push(tab),
        }
    }
    merged.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    insert_details_tab(&mut merged);
    Ok(merged)
}

/// Puts an implicit `details` tab right before the first detail-scoped tab,
/// unless one already exists.
pub fn insert_details_tab(tabs: &mut Vec<PanelTab>) {
    if tabs.iter().any(|t| t.id == DETAILS_TAB_ID) {
        return;
    }
    let Some(idx) = tabs.iter().position(|t| t.scope == TabScope::Detail) else {
        return;
    };
    let details = PanelTab {
        id: DETAILS_TAB_ID.to_string(),
        label: "Details".to_string(),
        label_key: "panel.tabs.details".to_string(),
        target: None,
        scope: TabScope::Detail,
        contexts: vec![TabScope::Detail],
        position: tabs[idx].position,
        permission: String::new(),
    };
    tabs.insert(idx, details);
}
