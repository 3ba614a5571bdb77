//! Dot-path addressed menus over a [`MenuService`] backend.
//!
//! Every item is stored under a canonical path rooted at the menu's slug
//! (`admin.main` becomes `admin_main`), so that parent links are plain path
//! prefixes and repeated upserts land on the same record.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{AdminError, AdminResult};
use crate::logic::icons::IconReference;
use crate::model::{slug_uuid, slugify, Menu, MenuItem, MenuItemType};
use crate::store::{MenuItemPatch, MenuItemRecord, MenuItemTranslation, MenuService, ResolvedMenuEntry};

/// Lowercased slug of a menu code; `.`, `_` and `-` survive, any other run of
/// characters becomes a single `-`.
pub fn canonical_menu_slug(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut pending_dash = false;
    for ch in code.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Root segment of every item path of a menu.
pub fn canonical_menu_root(code: &str) -> String {
    canonical_menu_slug(code).replace('.', "_")
}

/// Canonical item path of `raw` inside `menu`. Idempotent: feeding a canonical
/// path back in returns it unchanged.
pub fn canonical_path(menu: &str, raw: &str) -> String {
    let root = canonical_menu_root(menu);
    let parts: Vec<&str> = raw
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // The menu code may lead the path in any spelling (`admin.main`,
    // `Admin Main`, `admin_main`); it spans at most as many segments as its slug.
    let code_segments = canonical_menu_slug(menu).split('.').count().max(1);
    let skip = (1..=code_segments.min(parts.len()))
        .find(|&n| canonical_menu_root(&parts[..n].join(".")) == root)
        .unwrap_or(0);

    let mut segments = vec![root];
    segments.extend(parts[skip..].iter().map(|part| slugify(part)).filter(|s| !s.is_empty()));
    segments.join(".")
}

/// Canonical rendering of an icon reference; unparseable icons pass through.
fn normalize_icon(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match raw.parse::<IconReference>() {
        Ok(icon) => icon.to_string(),
        Err(err) => {
            log::debug!("keeping icon as given: {}", err);
            raw.to_string()
        }
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Keys an item is known by for deduplication: its id plus any target
/// `key`/`path`.
pub fn canonical_keys(item: &MenuItem) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);
    if !item.id.trim().is_empty() {
        keys.push(item.id.clone());
    }
    for key in ["key", "path"] {
        if let Some(value) = item.target_str(key) {
            keys.push(format!("target.{key}:{value}"));
        }
    }
    keys
}

/// Positioned items first by (position, id); unpositioned ones after, in
/// insertion order.
pub fn sort_menu_items(items: &mut Vec<MenuItem>) {
    let (mut positioned, rest): (Vec<MenuItem>, Vec<MenuItem>) = std::mem::take(items)
        .into_iter()
        .partition(|item| item.position.is_some_and(|p| p > 0));
    positioned.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    positioned.extend(rest);
    *items = positioned;
    for item in items.iter_mut() {
        sort_menu_items(&mut item.children);
    }
}

pub struct MenuAdapter {
    service: Arc<dyn MenuService>,
}

impl MenuAdapter {
    pub fn new(service: Arc<dyn MenuService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> Arc<dyn MenuService> {
        self.service.clone()
    }

    /// Upsert; succeeds whether or not the menu existed.
    pub async fn create_menu(&self, code: &str) -> AdminResult<Menu> {
        let slug = canonical_menu_slug(code);
        if slug.is_empty() {
            return Err(AdminError::required_field("menu.code"));
        }
        self.service.create_menu(&canonical_menu_root(code)).await?;
        Ok(Menu {
            id: slug_uuid(&slug),
            code: code.trim().to_string(),
            slug,
            locale: String::new(),
            items: Vec::new(),
        })
    }

    /// Canonical path the item is stored under.
    pub fn item_path(&self, menu: &str, item: &MenuItem) -> AdminResult<String> {
        if !item.id.trim().is_empty() {
            return Ok(canonical_path(menu, &item.id));
        }
        let seed = [&item.label, &item.label_key, &item.code]
            .into_iter()
            .map(|s| slugify(s))
            .find(|s| !s.is_empty())
            .ok_or_else(|| AdminError::required_field("menu_item.id"))?;
        let base = self
            .parent_path(menu, item)
            .unwrap_or_else(|| canonical_menu_root(menu));
        Ok(format!("{base}.{seed}"))
    }

    pub fn parent_path(&self, menu: &str, item: &MenuItem) -> Option<String> {
        [&item.parent_id, &item.parent_code]
            .into_iter()
            .find(|p| !p.trim().is_empty())
            .map(|p| canonical_path(menu, p))
    }

    /// Upserts `item` at its canonical path and returns it in canonical form.
    pub async fn add_menu_item(&self, menu: &str, item: MenuItem) -> AdminResult<MenuItem> {
        let root = canonical_menu_root(menu);
        let path = self.item_path(menu, &item)?;
        let parent = self.parent_path(menu, &item).filter(|p| *p != path);

        let mut target = item.target.clone();
        if matches!(item.item_type, MenuItemType::Group | MenuItemType::Separator) {
            target.clear();
        } else if !target.is_empty() && !target.contains_key("key") {
            target.insert("key".to_string(), Value::String(path.clone()));
        }

        let mut metadata = crate::model::JsonMap::new();
        metadata.insert("path".to_string(), Value::String(path.clone()));
        if let Some(parent) = &parent {
            metadata.insert("parent_path".to_string(), Value::String(parent.clone()));
        }

        let code = if item.code.trim().is_empty() {
            last_segment(&path).to_string()
        } else {
            item.code.clone()
        };
        let record = MenuItemRecord {
            path: path.clone(),
            parent_path: parent.clone(),
            position: item.position,
            item_type: item.item_type,
            code: code.clone(),
            target: target.clone(),
            icon: normalize_icon(&item.icon),
            badge: item.badge.clone(),
            permissions: item.permissions.clone(),
            classes: item.classes.clone(),
            styles: item.styles.clone(),
            collapsible: item.collapsible,
            collapsed: item.collapsed,
            metadata,
        };
        self.service.upsert_item(&root, record).await?;
        self.write_translation(&root, &path, &item).await?;

        Ok(MenuItem {
            id: path,
            code,
            target,
            parent_id: parent.unwrap_or_default(),
            menu: root,
            ..item
        })
    }

    async fn write_translation(&self, root: &str, path: &str, item: &MenuItem) -> AdminResult<()> {
        if item.locale.trim().is_empty() {
            return Ok(());
        }
        if item.label.trim().is_empty() && item.label_key.trim().is_empty() {
            return Ok(());
        }
        let translation = MenuItemTranslation {
            locale: item.locale.clone(),
            label: item.label.clone(),
            label_key: item.label_key.clone(),
            group_title: item.group_title.clone(),
            group_title_key: item.group_title_key.clone(),
        };
        self.service.upsert_translation(root, path, translation).await?;
        Ok(())
    }

    /// Partial update by path; empty fields of `item` leave stored values alone.
    pub async fn update_menu_item(&self, menu: &str, item: MenuItem) -> AdminResult<()> {
        if item.id.trim().is_empty() {
            return Err(AdminError::required_field("menu_item.id"));
        }
        let root = canonical_menu_root(menu);
        let path = canonical_path(menu, &item.id);
        let patch = MenuItemPatch {
            parent_path: self.parent_path(menu, &item),
            position: item.position,
            item_type: Some(item.item_type).filter(|t| *t != MenuItemType::Item),
            target: Some(item.target.clone()).filter(|t| !t.is_empty()),
            icon: Some(item.icon.clone()).filter(|i| !i.is_empty()),
            badge: Some(item.badge.clone()).filter(|b| !b.is_empty()),
            permissions: Some(item.permissions.clone()).filter(|p| !p.is_empty()),
            classes: Some(item.classes.clone()).filter(|c| !c.is_empty()),
            styles: Some(item.styles.clone()).filter(|s| !s.is_empty()),
            collapsible: Some(true).filter(|_| item.collapsible),
            collapsed: Some(true).filter(|_| item.collapsed),
        };
        self.service.update_item(&root, &path, patch).await?;
        self.write_translation(&root, &path, &item).await
    }

    /// Deletes the item and its descendants.
    pub async fn delete_menu_item(&self, menu: &str, id: &str) -> AdminResult<()> {
        let root = canonical_menu_root(menu);
        self.service
            .delete_item(&root, &canonical_path(menu, id))
            .await?;
        Ok(())
    }

    /// Assigns positions 1.. in list order. Unknown ids are skipped; parents
    /// are left as stored.
    pub async fn reorder_menu(&self, menu: &str, ordered_ids: &[String]) -> AdminResult<()> {
        let root = canonical_menu_root(menu);
        let existing: HashSet<String> = self
            .service
            .resolve_navigation(&root, "")
            .await?
            .into_iter()
            .map(|entry| entry.item.path)
            .collect();

        let mut position = 1;
        for id in ordered_ids {
            let path = canonical_path(menu, id);
            if !existing.contains(&path) {
                log::debug!("reorder of {}: skipping unknown item {}", root, path);
                continue;
            }
            self.service
                .update_item(&root, &path, MenuItemPatch::position(position))
                .await?;
            position += 1;
        }
        Ok(())
    }

    /// The full item tree for `locale`.
    pub async fn menu(&self, code: &str, locale: &str) -> AdminResult<Menu> {
        let root = canonical_menu_root(code);
        let slug = canonical_menu_slug(code);
        let entries = self.service.resolve_navigation(&root, locale).await?;
        let flat: Vec<MenuItem> = entries
            .into_iter()
            .map(|entry| to_menu_item(&root, locale, entry))
            .collect();
        let mut items = build_tree(flat);
        sort_menu_items(&mut items);
        Ok(Menu {
            id: slug_uuid(&slug),
            code: code.trim().to_string(),
            slug,
            locale: locale.to_string(),
            items,
        })
    }

    /// Removes every item; a missing menu is not an error.
    pub async fn reset_menu_by_code(&self, code: &str) -> AdminResult<()> {
        self.service.reset_menu(&canonical_menu_root(code)).await?;
        Ok(())
    }

    /// Upserts each item unless one of its canonical keys was already seen in
    /// the menu (or earlier in the batch). Returns the number written.
    pub async fn add_menu_items(
        &self,
        menu: &str,
        items: Vec<MenuItem>,
        default_locale: &str,
    ) -> AdminResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.create_menu(menu).await?;
        let existing = self.menu(menu, default_locale).await?;
        let mut seen: HashSet<String> = existing
            .flatten()
            .into_iter()
            .flat_map(canonical_keys)
            .collect();

        let mut added = 0;
        for mut item in items {
            let path = self.item_path(menu, &item)?;
            let mut candidate = item.clone();
            candidate.id = path;
            let keys = canonical_keys(&candidate);
            if keys.iter().any(|k| seen.contains(k)) {
                log::debug!("menu {}: item {} already present", menu, candidate.id);
                continue;
            }
            if item.locale.trim().is_empty() {
                item.locale = default_locale.to_string();
            }
            let stored = self.add_menu_item(menu, item).await?;
            seen.extend(keys);
            seen.extend(canonical_keys(&stored));
            added += 1;
        }
        Ok(added)
    }
}

fn to_menu_item(root: &str, locale: &str, entry: ResolvedMenuEntry) -> MenuItem {
    let record = entry.item;
    let translation = entry.translation.unwrap_or_default();
    let label = if !translation.label.trim().is_empty() {
        translation.label
    } else if !translation.label_key.trim().is_empty() {
        translation.label_key.clone()
    } else {
        last_segment(&record.path).to_string()
    };
    MenuItem {
        id: record.path,
        code: record.code,
        item_type: record.item_type,
        label,
        label_key: translation.label_key,
        group_title: translation.group_title,
        group_title_key: translation.group_title_key,
        target: record.target,
        icon: record.icon,
        badge: record.badge,
        permissions: record.permissions,
        classes: record.classes,
        styles: record.styles,
        position: record.position,
        parent_id: record.parent_path.unwrap_or_default(),
        parent_code: String::new(),
        menu: root.to_string(),
        locale: locale.to_string(),
        collapsible: record.collapsible,
        collapsed: record.collapsed,
        children: Vec::new(),
    }
}

/// Links items to their parents; an item whose parent is absent becomes a root.
fn build_tree(flat: Vec<MenuItem>) -> Vec<MenuItem> {
    let known: HashSet<String> = flat.iter().map(|i| i.id.clone()).collect();
    let mut children: HashMap<String, Vec<MenuItem>> = HashMap::new();
    let mut roots = Vec::new();
    for item in flat {
        if !item.parent_id.is_empty() && item.parent_id != item.id && known.contains(&item.parent_id) {
            children.entry(item.parent_id.clone()).or_default().push(item);
        } else {
            roots.push(item);
        }
    }

    fn attach(item: &mut MenuItem, children: &mut HashMap<String, Vec<MenuItem>>) {
        if let Some(mut kids) = children.remove(&item.id) {
            for kid in kids.iter_mut() {
                attach(kid, children);
            }
            item.children = kids;
        }
    }
    for root in roots.iter_mut() {
        attach(root, &mut children);
    }
    // Leftovers only occur on parent cycles; surface them at the root.
    roots.extend(children.into_values().flatten());
    roots
}
