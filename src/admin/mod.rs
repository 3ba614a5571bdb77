//! Composition root: owns the registry, command bus, settings, navigation
//! and dashboard, and drives the construct → prepare → initialize lifecycle.

pub mod module;
pub mod panels;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::router::AdminRouter;
use crate::config::AdminConfig;
use crate::contracts::{
    ActivityAware, ActivitySink, Authenticator, Authorizer, BoxFuture, BulkService, ThemeProvider,
    TranslationPolicy, Translator, WorkflowEngine,
};
use crate::error::{AdminError, AdminResult};
use crate::logic::menu_adapter::canonical_menu_slug;
use crate::logic::theme::{resolve_theme, theme_preference, THEME_PREFERENCE_KEY};
use crate::logic::{
    validate_feature_dependencies, CommandBus, Dashboard, FeatureCatalog, FeatureGate, FeatureKey,
    MenuAdapter, MutableFeatureGate, NavigationResolver, Registry, SettingsService,
    StaticFeatureGate, TabCollisionHandler, TabPermissionEvaluator,
};
use crate::model::{
    ActivityEntry, AdminContext, DashboardLayout, DashboardProviderSpec, JsonMap, MenuItem,
    SettingDefinition, ThemeSelection,
};
use crate::seed;
use crate::store::{
    InMemoryActivitySink, InMemoryMenuService, InMemoryPreferenceStore, InMemoryWidgetService,
    MenuService, PreferenceStore, WidgetService,
};

pub use module::{MenuContributor, Module, ModuleContext};

pub type InitHook = Arc<dyn Fn(Arc<Admin>) -> BoxFuture<'static, AdminResult<()>> + Send + Sync>;

/// Collaborators handed to [`Admin::new`]; every `None` gets an in-memory
/// implementation.
#[derive(Default)]
pub struct AdminDeps {
    pub registry: Option<Arc<Registry>>,
    pub commands: Option<Arc<CommandBus>>,
    pub menus: Option<Arc<dyn MenuService>>,
    pub widgets: Option<Arc<dyn WidgetService>>,
    pub preferences: Option<Arc<dyn PreferenceStore>>,
    pub features: Option<Arc<dyn FeatureGate>>,
    pub activity: Option<Arc<dyn ActivitySink>>,
}

/// Feature state as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStatus {
    pub key: String,
    pub enabled: bool,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

pub struct Admin {
    config: AdminConfig,
    registry: Arc<Registry>,
    commands: Arc<CommandBus>,
    features: Arc<dyn FeatureGate>,
    mutable_features: Option<Arc<dyn MutableFeatureGate>>,
    catalog: FeatureCatalog,
    settings: Arc<SettingsService>,
    dashboard: Arc<Dashboard>,
    menu: Arc<MenuAdapter>,
    navigation: Arc<NavigationResolver>,
    widgets: Arc<dyn WidgetService>,
    preferences: Arc<dyn PreferenceStore>,
    activity: RwLock<Arc<dyn ActivitySink>>,
    activity_log: RwLock<Option<Arc<InMemoryActivitySink>>>,
    activity_aware: RwLock<Vec<Arc<dyn ActivityAware>>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    workflow: Option<Arc<dyn WorkflowEngine>>,
    translator: Option<Arc<dyn Translator>>,
    translation_policy: Option<Arc<dyn TranslationPolicy>>,
    theme_provider: Option<Arc<dyn ThemeProvider>>,
    bulk: Option<Arc<dyn BulkService>>,
    tab_collisions: Option<Arc<dyn TabCollisionHandler>>,
    tab_permissions: Option<TabPermissionEvaluator>,
    modules: RwLock<Vec<Arc<dyn Module>>>,
    init_hooks: Mutex<Vec<InitHook>>,
    router: RwLock<Option<Arc<dyn AdminRouter>>>,
    prepared: tokio::sync::Mutex<bool>,
    booting: tokio::sync::Mutex<()>,
    booted: AtomicBool,
}

impl Admin {
    pub fn new(mut config: AdminConfig, deps: AdminDeps) -> AdminResult<Self> {
        config.apply_defaults();
        if canonical_menu_slug(&config.nav_menu_code).is_empty() {
            return Err(AdminError::invalid_argument(format!(
                "nav_menu_code {:?} has no usable characters",
                config.nav_menu_code
            )));
        }

        let catalog = match &config.feature_catalog_path {
            Some(path) if !path.trim().is_empty() => FeatureCatalog::load(path).map_err(|e| {
                AdminError::invalid_argument(format!("feature catalog {path}: {e:#}"))
            })?,
            _ => FeatureCatalog::default(),
        };

        let mut mutable_features: Option<Arc<dyn MutableFeatureGate>> = None;
        let features: Arc<dyn FeatureGate> = match deps.features {
            Some(gate) => gate,
            None => {
                let gate = Arc::new(StaticFeatureGate::new(&config.features));
                mutable_features = Some(gate.clone());
                gate
            }
        };

        let registry = deps.registry.unwrap_or_default();
        let commands = deps.commands.unwrap_or_default();
        let menus = deps
            .menus
            .unwrap_or_else(|| Arc::new(InMemoryMenuService::new()));
        let widgets = deps
            .widgets
            .unwrap_or_else(|| Arc::new(InMemoryWidgetService::new()));
        let preferences = deps
            .preferences
            .unwrap_or_else(|| Arc::new(InMemoryPreferenceStore::new()));

        let mut activity_log: Option<Arc<InMemoryActivitySink>> = None;
        let activity: Arc<dyn ActivitySink> = match deps.activity {
            Some(sink) => sink,
            None => {
                let log = Arc::new(InMemoryActivitySink::new());
                activity_log = Some(log.clone());
                log
            }
        };

        // backends with their own activity trail follow sink replacement too
        let mut activity_aware: Vec<Arc<dyn ActivityAware>> = Vec::new();
        activity_aware.extend(menus.clone().activity_aware());
        activity_aware.extend(widgets.clone().activity_aware());
        activity_aware.extend(preferences.clone().activity_aware());

        let settings = Arc::new(SettingsService::new());
        let dashboard = Arc::new(Dashboard::new(Some(widgets.clone()), Some(commands.clone())));
        dashboard.set_preferences(Some(preferences.clone()));
        dashboard.set_enforce_known_areas(config.cms.enforce_known_areas);

        let menu = Arc::new(MenuAdapter::new(menus));
        let navigation = Arc::new(NavigationResolver::new(
            Some(menu.clone()),
            &config.nav_menu_code,
        ));
        let ctx = AdminContext::system();
        navigation.use_cms(config.cms.enabled || features.is_on(&ctx, FeatureKey::Cms));

        activity_aware.push(settings.clone());
        activity_aware.push(dashboard.clone());

        let admin = Self {
            config,
            registry,
            commands,
            features,
            mutable_features,
            catalog,
            settings: settings.clone(),
            dashboard: dashboard.clone(),
            menu,
            navigation,
            widgets,
            preferences,
            activity: RwLock::new(activity.clone()),
            activity_log: RwLock::new(activity_log),
            activity_aware: RwLock::new(activity_aware),
            authenticator: None,
            authorizer: None,
            workflow: None,
            translator: None,
            translation_policy: None,
            theme_provider: None,
            bulk: None,
            tab_collisions: None,
            tab_permissions: None,
            modules: RwLock::new(Vec::new()),
            init_hooks: Mutex::new(Vec::new()),
            router: RwLock::new(None),
            prepared: tokio::sync::Mutex::new(false),
            booting: tokio::sync::Mutex::new(()),
            booted: AtomicBool::new(false),
        };
        admin.apply_activity_sink(activity);
        Ok(admin)
    }

    /// Configuration defaults and in-memory collaborators throughout.
    pub fn in_memory(config: AdminConfig) -> AdminResult<Self> {
        Self::new(config, AdminDeps::default())
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.navigation.set_authorizer(Some(authorizer.clone()));
        self.dashboard.set_authorizer(Some(authorizer.clone()));
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_workflow(mut self, workflow: Arc<dyn WorkflowEngine>) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.navigation.set_translator(Some(translator.clone()));
        self.translator = Some(translator);
        self
    }

    pub fn with_translation_policy(mut self, policy: Arc<dyn TranslationPolicy>) -> Self {
        self.translation_policy = Some(policy);
        self
    }

    pub fn with_theme_provider(mut self, provider: Arc<dyn ThemeProvider>) -> Self {
        self.theme_provider = Some(provider);
        self
    }

    pub fn with_bulk_service(mut self, bulk: Arc<dyn BulkService>) -> Self {
        self.bulk = Some(bulk);
        self
    }

    pub fn with_tab_collision_handler(mut self, handler: Arc<dyn TabCollisionHandler>) -> Self {
        self.tab_collisions = Some(handler);
        self
    }

    pub fn with_tab_permission_evaluator(mut self, evaluator: TabPermissionEvaluator) -> Self {
        self.tab_permissions = Some(evaluator);
        self
    }

    pub fn with_activity_sink(self, sink: Arc<dyn ActivitySink>) -> Self {
        *self.activity_log.write() = None;
        self.apply_activity_sink(sink);
        self
    }

    /// Uses an in-memory ring buffer as the sink and exposes it as the
    /// activity feed.
    pub fn with_activity_log(self, log: Arc<InMemoryActivitySink>) -> Self {
        *self.activity_log.write() = Some(log.clone());
        self.apply_activity_sink(log);
        self
    }

    /// Installs `sink` and pushes it to every activity-aware service.
    pub fn apply_activity_sink(&self, sink: Arc<dyn ActivitySink>) {
        *self.activity.write() = sink.clone();
        let services = self.activity_aware.read().clone();
        for service in services {
            service.set_activity_sink(sink.clone());
        }
    }

    /// Adds a host service to the set that follows sink replacement.
    pub fn register_activity_aware(&self, service: Arc<dyn ActivityAware>) {
        service.set_activity_sink(self.activity_sink());
        self.activity_aware.write().push(service);
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn commands(&self) -> &Arc<CommandBus> {
        &self.commands
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings
    }

    pub fn dashboard(&self) -> &Arc<Dashboard> {
        &self.dashboard
    }

    pub fn menu(&self) -> &Arc<MenuAdapter> {
        &self.menu
    }

    pub fn navigation(&self) -> &Arc<NavigationResolver> {
        &self.navigation
    }

    pub fn widgets(&self) -> &Arc<dyn WidgetService> {
        &self.widgets
    }

    pub fn preferences(&self) -> &Arc<dyn PreferenceStore> {
        &self.preferences
    }

    pub fn feature_gate(&self) -> &Arc<dyn FeatureGate> {
        &self.features
    }

    pub fn authorizer(&self) -> Option<&Arc<dyn Authorizer>> {
        self.authorizer.as_ref()
    }

    pub fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    pub fn translator(&self) -> Option<&Arc<dyn Translator>> {
        self.translator.as_ref()
    }

    pub fn activity_sink(&self) -> Arc<dyn ActivitySink> {
        self.activity.read().clone()
    }

    /// The ring buffer behind the activity feed, when the sink is one.
    pub fn activity_log(&self) -> Option<Arc<InMemoryActivitySink>> {
        self.activity_log.read().clone()
    }

    pub fn router(&self) -> Option<Arc<dyn AdminRouter>> {
        self.router.read().clone()
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self, ctx: &AdminContext, feature: FeatureKey) -> bool {
        self.features.is_on(ctx, feature)
    }

    /// Denies when an authorizer is installed and does not grant
    /// `permission`; without one everything is allowed.
    pub fn require(&self, ctx: &AdminContext, permission: &str, resource: &str) -> AdminResult<()> {
        if permission.trim().is_empty() {
            return Ok(());
        }
        match &self.authorizer {
            Some(authorizer) if !authorizer.can(ctx, permission, resource) => {
                Err(AdminError::forbidden(permission))
            }
            _ => Ok(()),
        }
    }

    fn locale<'a>(&'a self, ctx: &'a AdminContext) -> &'a str {
        ctx.locale_or(&self.config.default_locale)
    }

    pub fn register_module(&self, module: Arc<dyn Module>) -> AdminResult<()> {
        if self.is_booted() {
            return Err(AdminError::conflict(
                "modules must be registered before initialize",
            ));
        }
        self.registry.register_module(module.manifest())?;
        self.modules.write().push(module);
        Ok(())
    }

    /// Runs once `initialize` has attached a router and loaded every module.
    pub fn on_init<F, Fut>(&self, hook: F)
    where
        F: Fn(Arc<Admin>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AdminResult<()>> + Send + 'static,
    {
        let hook: InitHook = Arc::new(move |admin| -> BoxFuture<'static, AdminResult<()>> {
            Box::pin(hook(admin))
        });
        self.init_hooks.lock().push(hook);
    }

    pub fn register_setting(&self, definition: SettingDefinition) {
        self.registry.register_setting(definition.clone());
        self.settings.register_definition(definition);
    }

    /// Records the provider and hands it to the dashboard. Providers without
    /// handler are ignored.
    pub async fn register_dashboard_provider(&self, spec: DashboardProviderSpec) -> AdminResult<()> {
        if spec.handler.is_some() && !spec.code.trim().is_empty() {
            self.registry.register_dashboard_provider(spec.clone());
        }
        self.dashboard.register_provider(spec).await
    }

    /// Validates feature dependencies, bootstraps defaults and loads
    /// modules. Later calls are no-ops.
    pub async fn prepare(&self, ctx: &AdminContext) -> AdminResult<()> {
        let mut prepared = self.prepared.lock().await;
        if *prepared {
            return Ok(());
        }
        validate_feature_dependencies(self.features.as_ref(), ctx)?;
        self.commands
            .set_enabled(self.features.is_on(ctx, FeatureKey::Commands));

        self.bootstrap(ctx).await?;
        self.load_modules(ctx).await?;

        *prepared = true;
        log::info!(
            "admin prepared: {} modules, {} panels",
            self.modules.read().len(),
            self.registry.panels().len()
        );
        Ok(())
    }

    async fn bootstrap(&self, ctx: &AdminContext) -> AdminResult<()> {
        for definition in seed::default_settings(&self.config) {
            self.register_setting(definition);
        }
        for area in seed::default_areas() {
            self.dashboard.register_area(area).await;
        }

        let items = seed::default_menu_items(&self.config, self.features.as_ref(), ctx);
        self.navigation.add_fallback(items.clone());
        let menu_code = self.config.nav_menu_code.clone();
        self.menu.create_menu(&menu_code).await?;
        self.menu
            .add_menu_items(&menu_code, items, &self.config.default_locale)
            .await?;
        Ok(())
    }

    async fn load_modules(&self, ctx: &AdminContext) -> AdminResult<()> {
        let modules = self.modules.read().clone();
        let locale = self.locale(ctx).to_string();
        for module in modules {
            let manifest = module.manifest();
            let disabled: Vec<&String> = manifest
                .feature_flags
                .iter()
                .filter(|flag| !self.features.enabled(ctx, flag))
                .collect();
            if !disabled.is_empty() {
                log::info!(
                    "skipping module {}: features {:?} disabled",
                    manifest.id,
                    disabled
                );
                continue;
            }

            let module_ctx = ModuleContext {
                admin: self,
                router: self.router(),
                locale: locale.clone(),
                translator: self.translator.clone(),
            };
            module.register(&module_ctx).await?;

            if let Some(contributor) = module.menu_contributor() {
                let items: Vec<MenuItem> = contributor.menu_items(&locale);
                self.navigation.add_fallback(items.clone());
                let added = self
                    .menu
                    .add_menu_items(&self.config.nav_menu_code, items, &self.config.default_locale)
                    .await?;
                log::debug!("module {} contributed {} menu items", manifest.id, added);
            }
            log::info!("loaded module {}", manifest.id);
        }
        Ok(())
    }

    /// Attaches the router, prepares, contributes the core routes and runs
    /// init hooks. A second call is a no-op; a concurrent one waits for the
    /// first to finish.
    pub async fn initialize(self: &Arc<Self>, router: Option<Arc<dyn AdminRouter>>) -> AdminResult<()> {
        let router = router.ok_or_else(|| AdminError::invalid_argument("router is required"))?;
        let _boot = self.booting.lock().await;
        if self.is_booted() {
            return Ok(());
        }
        *self.router.write() = Some(router.clone());
        self.prepare(&AdminContext::system()).await?;

        crate::api::routes::register_core_routes(self, router.as_ref());

        let hooks = self.init_hooks.lock().clone();
        for hook in hooks {
            hook(self.clone()).await?;
        }
        self.booted.store(true, Ordering::SeqCst);
        log::info!("admin initialized at {}", self.config.base_path);
        Ok(())
    }

    /// Base theme, user preference (when preferences are enabled), request
    /// override, then the theme provider.
    pub async fn theme(&self, ctx: &AdminContext) -> ThemeSelection {
        let mut preference = None;
        if self.features.is_on(ctx, FeatureKey::Preferences) && !ctx.user_id.trim().is_empty() {
            match self.preferences.get(&ctx.user_id, THEME_PREFERENCE_KEY).await {
                Ok(Some(value)) => preference = theme_preference(&value),
                Ok(None) => {}
                Err(err) => log::warn!("failed to load theme preference of {}: {:#}", ctx.user_id, err),
            }
        }
        resolve_theme(
            &self.config.base_theme(),
            preference.as_ref(),
            ctx,
            self.theme_provider.as_ref(),
        )
    }

    pub async fn navigation_for(&self, ctx: &AdminContext) -> Vec<MenuItem> {
        self.navigation.resolve(ctx, self.locale(ctx)).await
    }

    pub async fn dashboard_widgets(&self, ctx: &AdminContext) -> AdminResult<Vec<JsonMap>> {
        self.dashboard.resolve(ctx).await
    }

    pub async fn dashboard_layout(&self, ctx: &AdminContext) -> AdminResult<DashboardLayout> {
        let theme = self.theme(ctx).await;
        self.dashboard
            .render_layout(ctx, Some(theme), &self.config.base_path)
            .await
    }

    /// Every known feature with its state and catalog description.
    pub fn feature_statuses(&self, ctx: &AdminContext) -> Vec<FeatureStatus> {
        FeatureKey::ALL
            .iter()
            .map(|key| {
                let descriptor = self.catalog.describe(key.as_str());
                FeatureStatus {
                    key: key.as_str().to_string(),
                    enabled: self.features.is_on(ctx, *key),
                    dependencies: key
                        .dependencies()
                        .iter()
                        .map(|d| d.as_str().to_string())
                        .collect(),
                    title: descriptor.map(|d| d.title.clone()).unwrap_or_default(),
                    description: descriptor.map(|d| d.description.clone()).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Flips a feature on a mutable gate. A change that leaves the
    /// dependency graph unsatisfied is rolled back.
    pub async fn set_feature(&self, ctx: &AdminContext, key: FeatureKey, enabled: bool) -> AdminResult<()> {
        self.require(
            ctx,
            &self.config.permissions.feature_flags_update,
            "feature_flags",
        )?;
        let gate = self
            .mutable_features
            .as_ref()
            .ok_or_else(|| AdminError::service_not_configured("mutable feature gate"))?;
        let previous = self.features.is_on(ctx, key);
        gate.set(key.as_str(), enabled);
        if let Err(err) = validate_feature_dependencies(self.features.as_ref(), ctx) {
            gate.set(key.as_str(), previous);
            return Err(err);
        }
        if key == FeatureKey::Commands {
            self.commands.set_enabled(enabled);
        }

        let entry = ActivityEntry::new(&ctx.actor(), "features.update", &format!("feature:{key}"))
            .with("enabled", serde_json::json!(enabled));
        crate::contracts::record_activity(&self.activity_sink(), ctx, entry).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router::RouteTable;
    use crate::contracts::StaticAuthorizer;
    use crate::error::ErrorKind;
    use crate::model::{ModuleManifest, PanelBuilder};
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    fn config(features: &[&str]) -> AdminConfig {
        let mut flags = BTreeMap::new();
        for feature in features {
            flags.insert(feature.to_string(), true);
        }
        AdminConfig {
            features: flags,
            ..Default::default()
        }
    }

    struct CountingModule {
        id: &'static str,
        requires: Vec<&'static str>,
        registered: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Module for CountingModule {
        fn manifest(&self) -> ModuleManifest {
            let mut manifest = ModuleManifest::new(self.id, self.id);
            for feature in &self.requires {
                manifest = manifest.requires(feature);
            }
            manifest
        }

        async fn register(&self, ctx: &ModuleContext<'_>) -> AdminResult<()> {
            self.registered.fetch_add(1, Ordering::SeqCst);
            let mut builder = PanelBuilder::new();
            builder.set_name(self.id);
            ctx.admin.register_panel(self.id, builder)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent() {
        let admin = Admin::in_memory(config(&[])).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        admin
            .register_module(Arc::new(CountingModule {
                id: "reports",
                requires: vec![],
                registered: counter.clone(),
            }))
            .unwrap();

        admin.prepare(&AdminContext::system()).await.unwrap();
        admin.prepare(&AdminContext::system()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(admin.registry().panel("reports").is_some());
    }

    #[tokio::test]
    async fn test_module_with_disabled_feature_is_skipped() {
        let admin = Admin::in_memory(config(&[])).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        admin
            .register_module(Arc::new(CountingModule {
                id: "media-browser",
                requires: vec!["media"],
                registered: counter.clone(),
            }))
            .unwrap();
        admin.prepare(&AdminContext::system()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(admin.registry().panel("media-browser").is_none());
    }

    #[tokio::test]
    async fn test_initialize_requires_router() {
        let admin = Arc::new(Admin::in_memory(config(&[])).unwrap());
        let err = admin.initialize(None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(!admin.is_booted());
    }

    #[tokio::test]
    async fn test_initialize_runs_hooks_once() {
        let admin = Arc::new(Admin::in_memory(config(&[])).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        admin.on_init(move |_admin| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let router: Arc<dyn AdminRouter> = Arc::new(RouteTable::new());
        admin.initialize(Some(router.clone())).await.unwrap();
        admin.initialize(Some(router)).await.unwrap();
        assert!(admin.is_booted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_boots_once() {
        let admin = Arc::new(Admin::in_memory(config(&[])).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        admin.on_init(move |_admin| {
            let seen = seen.clone();
            async move {
                tokio::task::yield_now().await;
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let table = Arc::new(RouteTable::new());
        let router: Arc<dyn AdminRouter> = table.clone();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let admin = admin.clone();
                let router = router.clone();
                tokio::spawn(async move { admin.initialize(Some(router)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(admin.is_booted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!table.routes().is_empty());
    }

    #[tokio::test]
    async fn test_activity_sink_propagates_to_services() {
        let admin = Admin::in_memory(config(&["settings"])).unwrap();
        admin.prepare(&AdminContext::system()).await.unwrap();
        let replacement = Arc::new(InMemoryActivitySink::new());
        let admin = admin.with_activity_log(replacement.clone());

        let bundle = crate::model::SettingsBundle::new(crate::model::SettingScope::Site)
            .set("admin.title", serde_json::json!("Back office"));
        admin
            .settings()
            .apply(&AdminContext::new("alice"), bundle)
            .await
            .unwrap();
        assert_eq!(replacement.recent(1, None)[0].action, "settings.update");
    }

    #[tokio::test]
    async fn test_set_feature_rolls_back_unsatisfied_change() {
        let admin = Admin::in_memory(config(&["commands"])).unwrap();
        let ctx = AdminContext::system();
        let err = admin.set_feature(&ctx, FeatureKey::Bulk, true).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidFeatureConfig);
        assert!(!admin.is_enabled(&ctx, FeatureKey::Bulk));

        admin.set_feature(&ctx, FeatureKey::Search, true).await.unwrap();
        assert!(admin.is_enabled(&ctx, FeatureKey::Search));
    }

    #[tokio::test]
    async fn test_set_feature_requires_permission() {
        let authz = StaticAuthorizer::new().grant("root", "*");
        let admin = Admin::in_memory(config(&[]))
            .unwrap()
            .with_authorizer(Arc::new(authz));
        let err = admin
            .set_feature(&AdminContext::new("bob"), FeatureKey::Search, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        admin
            .set_feature(&AdminContext::new("root"), FeatureKey::Search, true)
            .await
            .unwrap();
    }

    #[test]
    fn test_unusable_menu_code_is_rejected() {
        let config = AdminConfig {
            nav_menu_code: "***".to_string(),
            ..Default::default()
        };
        let err = Admin::in_memory(config).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
