use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::contracts::{Authorizer, Translator};
use crate::logic::menu_adapter::{sort_menu_items, MenuAdapter};
use crate::model::{AdminContext, MenuItem};

pub const NAVIGATION_RESOURCE: &str = "navigation";

/// Permission-filtered navigation trees for one menu code.
pub struct NavigationResolver {
    menu: Option<Arc<MenuAdapter>>,
    use_cms: AtomicBool,
    menu_code: RwLock<String>,
    fallback: RwLock<Vec<MenuItem>>,
    authorizer: RwLock<Option<Arc<dyn Authorizer>>>,
    translator: RwLock<Option<Arc<dyn Translator>>>,
}

impl NavigationResolver {
    pub fn new(menu: Option<Arc<MenuAdapter>>, menu_code: &str) -> Self {
        Self {
            use_cms: AtomicBool::new(menu.is_some()),
            menu,
            menu_code: RwLock::new(menu_code.to_string()),
            fallback: RwLock::new(Vec::new()),
            authorizer: RwLock::new(None),
            translator: RwLock::new(None),
        }
    }

    /// Static items used when the menu backend is off or failing; kept in
    /// menu order.
    pub fn add_fallback(&self, items: impl IntoIterator<Item = MenuItem>) {
        let mut fallback = self.fallback.write();
        fallback.extend(items);
        sort_menu_items(&mut fallback);
    }

    pub fn set_default_menu_code(&self, code: &str) {
        *self.menu_code.write() = code.to_string();
    }

    pub fn default_menu_code(&self) -> String {
        self.menu_code.read().clone()
    }

    pub fn set_authorizer(&self, authorizer: Option<Arc<dyn Authorizer>>) {
        *self.authorizer.write() = authorizer;
    }

    pub fn set_translator(&self, translator: Option<Arc<dyn Translator>>) {
        *self.translator.write() = translator;
    }

    pub fn use_cms(&self, on: bool) {
        self.use_cms.store(on, Ordering::SeqCst);
    }

    /// Menu tree for `locale`, or the fallback list when the menu backend is
    /// off or fails; then translated and filtered for the viewer.
    pub async fn resolve(&self, ctx: &AdminContext, locale: &str) -> Vec<MenuItem> {
        let mut items = match self.load(locale).await {
            Some(items) => items,
            None => self.fallback.read().clone(),
        };

        if let Some(translator) = self.translator.read().clone() {
            translate_items(&mut items, translator.as_ref(), locale);
        }
        match self.authorizer.read().clone() {
            Some(authorizer) => filter_items(items, ctx, authorizer.as_ref()),
            None => items,
        }
    }

    async fn load(&self, locale: &str) -> Option<Vec<MenuItem>> {
        if !self.use_cms.load(Ordering::SeqCst) {
            return None;
        }
        let adapter = self.menu.as_ref()?;
        let code = self.default_menu_code();
        match adapter.menu(&code, locale).await {
            Ok(menu) => Some(menu.items),
            Err(err) => {
                log::warn!("navigation for menu {} unavailable, using fallback: {}", code, err);
                None
            }
        }
    }
}

fn translate_items(items: &mut [MenuItem], translator: &dyn Translator, locale: &str) {
    for item in items.iter_mut() {
        if let Some(label) = translate(translator, locale, &item.label_key) {
            item.label = label;
        }
        if let Some(title) = translate(translator, locale, &item.group_title_key) {
            item.group_title = title;
        }
        translate_items(&mut item.children, translator, locale);
    }
}

/// A translation that fails or echoes its key is no translation.
pub(crate) fn translate(translator: &dyn Translator, locale: &str, key: &str) -> Option<String> {
    if key.trim().is_empty() || locale.trim().is_empty() {
        return None;
    }
    translator
        .translate(locale, key)
        .ok()
        .filter(|text| !text.is_empty() && text != key)
}

/// Visible iff the node declares no permission or at least one is granted.
pub(crate) fn is_visible(item: &MenuItem, ctx: &AdminContext, authorizer: &dyn Authorizer) -> bool {
    item.permissions.is_empty()
        || item
            .permissions
            .iter()
            .any(|p| authorizer.can(ctx, p, NAVIGATION_RESOURCE))
}

fn filter_items(items: Vec<MenuItem>, ctx: &AdminContext, authorizer: &dyn Authorizer) -> Vec<MenuItem> {
    items
        .into_iter()
        .filter(|item| is_visible(item, ctx, authorizer))
        .filter_map(|mut item| {
            let had_children = !item.children.is_empty();
            item.children = filter_items(std::mem::take(&mut item.children), ctx, authorizer);
            if had_children && item.children.is_empty() && !item.permissions.is_empty() {
                return None;
            }
            Some(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{StaticAuthorizer, StaticTranslator};
    use crate::store::InMemoryMenuService;

    fn tree() -> Vec<MenuItem> {
        let mut users = MenuItem::group("users", "Users").with_permission("users.view");
        users.children = vec![
            MenuItem::new("users.roles", "Roles").with_permission("roles.view"),
        ];
        let mut content = MenuItem::group("content", "Content");
        content.children = vec![MenuItem::new("content.secret", "Secret").with_permission("secret")];
        vec![MenuItem::new("dashboard", "Dashboard"), users, content]
    }

    #[tokio::test]
    async fn test_fallback_without_menu_backend() {
        let nav = NavigationResolver::new(None, "admin.main");
        nav.add_fallback(tree());
        let items = nav.resolve(&AdminContext::new("alice"), "en").await;
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn test_permission_filter_keeps_shape() {
        let nav = NavigationResolver::new(None, "admin.main");
        nav.add_fallback(tree());
        nav.set_authorizer(Some(Arc::new(StaticAuthorizer::new().grant("alice", "users.view"))));

        let items = nav.resolve(&AdminContext::new("alice"), "en").await;
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        // users lost its only child and carries permissions itself: dropped.
        // content lost its only child but has no permissions: kept, empty.
        assert_eq!(ids, vec!["dashboard", "content"]);
        assert!(items[1].children.is_empty());

        nav.set_authorizer(Some(Arc::new(
            StaticAuthorizer::new()
                .grant("bob", "users.view")
                .grant("bob", "roles.view"),
        )));
        let items = nav.resolve(&AdminContext::new("bob"), "en").await;
        assert_eq!(items[1].id, "users");
        assert_eq!(items[1].children.len(), 1);
    }

    #[tokio::test]
    async fn test_menu_errors_fall_back() {
        let adapter = Arc::new(MenuAdapter::new(Arc::new(InMemoryMenuService::new())));
        let nav = NavigationResolver::new(Some(adapter), "never.created");
        nav.add_fallback(vec![MenuItem::new("home", "Home")]);
        let items = nav.resolve(&AdminContext::anonymous(), "en").await;
        assert_eq!(items[0].id, "home");
    }

    #[tokio::test]
    async fn test_labels_translated_when_key_resolves() {
        let nav = NavigationResolver::new(None, "admin.main");
        let mut item = MenuItem::new("home", "Home");
        item.label_key = "nav.home".into();
        let mut other = MenuItem::new("other", "Other");
        other.label_key = "nav.other".into();
        nav.add_fallback(vec![item, other]);
        nav.set_translator(Some(Arc::new(StaticTranslator::new().with("sv", "nav.home", "Hem"))));

        let items = nav.resolve(&AdminContext::anonymous(), "sv").await;
        assert_eq!(items[0].label, "Hem");
        assert_eq!(items[1].label, "Other");
    }
}
