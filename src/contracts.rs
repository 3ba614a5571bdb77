//! Interfaces of the collaborators the core talks to but does not own.
//!
//! Storage-shaped backends (menus, widgets, preferences) live in
//! [`crate::store::traits`]; everything here is policy or callback shaped.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::AdminResult;
use crate::model::{ActivityEntry, AdminContext, JsonMap, ThemeSelection};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Permission checks for panels, tabs, navigation and widgets.
pub trait Authorizer: Send + Sync {
    fn can(&self, ctx: &AdminContext, permission: &str, resource: &str) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&AdminContext, &str, &str) -> bool + Send + Sync,
{
    fn can(&self, ctx: &AdminContext, permission: &str, resource: &str) -> bool {
        self(ctx, permission, resource)
    }
}

/// Grants keyed by user id; `*` grants everything to that user.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    grants: HashMap<String, Vec<String>>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: &str, permission: &str) -> Self {
        self.grants
            .entry(user_id.to_string())
            .or_default()
            .push(permission.to_string());
        self
    }
}

impl Authorizer for StaticAuthorizer {
    fn can(&self, ctx: &AdminContext, permission: &str, _resource: &str) -> bool {
        self.grants
            .get(&ctx.user_id)
            .map(|perms| perms.iter().any(|p| p == "*" || p == permission))
            .unwrap_or(false)
    }
}

/// Request authentication performed by the HTTP adapter before a handler runs.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the (possibly enriched) context, or an unauthorized error.
    async fn wrap(&self, ctx: AdminContext) -> AdminResult<AdminContext>;
}

/// A translation is accepted only when it differs from the key.
pub trait Translator: Send + Sync {
    fn translate(&self, locale: &str, key: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTranslator {
    entries: HashMap<(String, String), String>,
}

impl StaticTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locale: &str, key: &str, text: &str) -> Self {
        self.entries
            .insert((locale.to_string(), key.to_string()), text.to_string());
        self
    }
}

impl Translator for StaticTranslator {
    fn translate(&self, locale: &str, key: &str) -> anyhow::Result<String> {
        Ok(self
            .entries
            .get(&(locale.to_string(), key.to_string()))
            .cloned()
            .unwrap_or_else(|| key.to_string()))
    }
}

/// Decides whether a panel's content must be translated for a locale.
pub trait TranslationPolicy: Send + Sync {
    fn requires_translation(&self, panel: &str, locale: &str) -> bool;
}

/// Workflow binding attached to panels.
pub trait WorkflowEngine: Send + Sync {
    fn transitions(&self, entity: &str, state: &str) -> Vec<String>;
}

/// Last overlay of theme resolution.
pub trait ThemeProvider: Send + Sync {
    fn resolve(&self, ctx: &AdminContext, selection: ThemeSelection) -> ThemeSelection;
}

/// Write-only audit collector supplied by the host.
#[async_trait::async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, ctx: &AdminContext, entry: ActivityEntry) -> anyhow::Result<()>;
}

/// Capability of services that record activity and accept a replacement sink.
pub trait ActivityAware: Send + Sync {
    fn set_activity_sink(&self, sink: Arc<dyn ActivitySink>);
}

/// Records an entry and logs (never propagates) a failure.
pub async fn record_activity(sink: &Arc<dyn ActivitySink>, ctx: &AdminContext, entry: ActivityEntry) {
    let action = entry.action.clone();
    if let Err(err) = sink.record(ctx, entry).await {
        log::warn!("failed to record activity '{}': {:#}", action, err);
    }
}

/// Dashboard data provider: context + widget config in, payload out.
#[async_trait::async_trait]
pub trait ProviderHandler: Send + Sync {
    async fn fetch(&self, ctx: AdminContext, config: JsonMap) -> anyhow::Result<JsonMap>;
}

#[async_trait::async_trait]
impl<F, Fut> ProviderHandler for F
where
    F: Fn(AdminContext, JsonMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonMap>> + Send + 'static,
{
    async fn fetch(&self, ctx: AdminContext, config: JsonMap) -> anyhow::Result<JsonMap> {
        (self)(ctx, config).await
    }
}

pub fn provider_fn<F, Fut>(f: F) -> Arc<dyn ProviderHandler>
where
    F: Fn(AdminContext, JsonMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JsonMap>> + Send + 'static,
{
    Arc::new(f)
}

/// Bulk operation backend; only its rollback capability reaches schemas.
pub trait BulkService: Send + Sync {
    fn supports_rollback(&self) -> bool;
}
