use std::sync::Arc;

use crate::admin::Admin;
use crate::api::router::AdminRouter;
use crate::contracts::Translator;
use crate::error::AdminResult;
use crate::model::{MenuItem, ModuleManifest};

/// What a module sees while it registers itself.
pub struct ModuleContext<'a> {
    pub admin: &'a Admin,
    /// `None` when modules load from `prepare` before a router is attached.
    pub router: Option<Arc<dyn AdminRouter>>,
    pub locale: String,
    pub translator: Option<Arc<dyn Translator>>,
}

/// A pluggable slice of the console: panels, providers, settings, routes.
#[async_trait::async_trait]
pub trait Module: Send + Sync {
    fn manifest(&self) -> ModuleManifest;

    async fn register(&self, ctx: &ModuleContext<'_>) -> AdminResult<()>;

    /// Modules that contribute navigation return themselves here.
    fn menu_contributor(&self) -> Option<&dyn MenuContributor> {
        None
    }
}

pub trait MenuContributor: Send + Sync {
    fn menu_items(&self, locale: &str) -> Vec<MenuItem>;
}
