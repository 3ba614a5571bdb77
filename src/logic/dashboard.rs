//! Dashboard composition: providers, default placements, per-user layouts and
//! render-mode aware resolution.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::contracts::{record_activity, ActivityAware, ActivitySink, Authorizer};
use crate::error::{AdminError, AdminResult};
use crate::logic::command_bus::{CommandBus, Message, QueryHandler};
use crate::logic::sanitize::sanitize_widget_data;
use crate::model::{
    area_rank, clamp_span, ActivityEntry, AdminContext, DashboardArea, DashboardLayout,
    DashboardProviderSpec, JsonMap, RenderMode, ResolvedWidget, ThemeSelection,
    WidgetAreaDefinition, WidgetInstance, WidgetLayoutMeta,
};
use crate::store::{InMemoryActivitySink, PreferenceStore, WidgetService};

pub const DASHBOARD_RESOURCE: &str = "dashboard";
pub const LAYOUT_PREFERENCE_KEY: &str = "dashboard.layout";

type ProviderMap = Arc<RwLock<HashMap<String, DashboardProviderSpec>>>;

/// Input of the shared handler behind every provider command name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardProviderCommand {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub config: JsonMap,
}

impl Message for DashboardProviderCommand {
    fn type_name(&self) -> &str {
        "dashboard.provider"
    }

    fn validate(&self) -> AdminResult<()> {
        if self.code.trim().is_empty() {
            return Err(AdminError::required_field("code"));
        }
        Ok(())
    }
}

struct ProviderCommandHandler {
    providers: ProviderMap,
}

#[async_trait::async_trait]
impl QueryHandler<DashboardProviderCommand> for ProviderCommandHandler {
    type Output = JsonMap;

    async fn query(&self, ctx: &AdminContext, message: DashboardProviderCommand) -> AdminResult<JsonMap> {
        let spec = self
            .providers
            .read()
            .get(&message.code)
            .cloned()
            .ok_or_else(|| AdminError::not_found("dashboard provider", &message.code))?;
        let handler = spec
            .handler
            .ok_or_else(|| AdminError::service_not_configured("dashboard provider handler"))?;
        let mut config = spec.default_config;
        config.extend(message.config);
        let mut data = handler.fetch(ctx.clone(), config).await?;
        sanitize_widget_data(&mut data);
        Ok(data)
    }
}

/// Read-mostly view, replaced wholesale after every provider or area write.
#[derive(Default)]
struct Components {
    providers: HashMap<String, DashboardProviderSpec>,
    areas: Vec<WidgetAreaDefinition>,
}

pub struct Dashboard {
    providers: ProviderMap,
    areas: RwLock<Vec<WidgetAreaDefinition>>,
    defaults: RwLock<Vec<WidgetInstance>>,
    enforce_known_areas: AtomicBool,
    handler_installed: AtomicBool,
    widgets: Option<Arc<dyn WidgetService>>,
    commands: Option<Arc<CommandBus>>,
    authorizer: RwLock<Option<Arc<dyn Authorizer>>>,
    preferences: RwLock<Option<Arc<dyn PreferenceStore>>>,
    activity: RwLock<Arc<dyn ActivitySink>>,
    components: RwLock<Arc<Components>>,
}

impl Dashboard {
    pub fn new(widgets: Option<Arc<dyn WidgetService>>, commands: Option<Arc<CommandBus>>) -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
            areas: RwLock::new(Vec::new()),
            defaults: RwLock::new(Vec::new()),
            enforce_known_areas: AtomicBool::new(false),
            handler_installed: AtomicBool::new(false),
            widgets,
            commands,
            authorizer: RwLock::new(None),
            preferences: RwLock::new(None),
            activity: RwLock::new(Arc::new(InMemoryActivitySink::new())),
            components: RwLock::new(Arc::new(Components::default())),
        }
    }

    pub fn set_authorizer(&self, authorizer: Option<Arc<dyn Authorizer>>) {
        *self.authorizer.write() = authorizer;
    }

    pub fn set_preferences(&self, preferences: Option<Arc<dyn PreferenceStore>>) {
        *self.preferences.write() = preferences;
    }

    pub fn set_enforce_known_areas(&self, enforce: bool) {
        self.enforce_known_areas.store(enforce, Ordering::SeqCst);
    }

    /// Publishes a fresh snapshot. The rebuild happens under the snapshot's
    /// write lock so the last writer always publishes the latest state.
    fn refresh(&self) {
        let mut components = self.components.write();
        *components = Arc::new(Components {
            providers: self.providers.read().clone(),
            areas: self.areas.read().clone(),
        });
    }

    fn components(&self) -> Arc<Components> {
        self.components.read().clone()
    }

    pub fn provider(&self, code: &str) -> Option<DashboardProviderSpec> {
        self.providers.read().get(code).cloned()
    }

    pub fn areas(&self) -> Vec<WidgetAreaDefinition> {
        let mut areas = self.areas.read().clone();
        areas.sort_by_key(|a| area_rank(&a.code));
        areas
    }

    /// Default placements, in registration order.
    pub fn default_instances(&self) -> Vec<WidgetInstance> {
        self.defaults.read().clone()
    }

    pub async fn register_area(&self, area: WidgetAreaDefinition) {
        {
            let mut areas = self.areas.write();
            match areas.iter_mut().find(|a| a.code == area.code) {
                Some(existing) => *existing = area.clone(),
                None => areas.push(area.clone()),
            }
        }
        self.refresh();
        if let Some(widgets) = &self.widgets {
            if let Err(err) = widgets.register_area(area.clone()).await {
                log::warn!("failed to register widget area {}: {:#}", area.code, err);
            }
        }
    }

    fn is_known_area(&self, code: &str) -> bool {
        self.areas.read().iter().any(|a| a.code == code)
    }

    /// Stores the provider, replacing any earlier one with the same code.
    /// A spec without handler is ignored. Seeding and command wiring are best
    /// effort and never fail the registration.
    pub async fn register_provider(&self, spec: DashboardProviderSpec) -> AdminResult<()> {
        if spec.code.trim().is_empty() {
            return Err(AdminError::required_field("provider.code"));
        }
        if spec.handler.is_none() {
            log::debug!("ignoring dashboard provider {} without handler", spec.code);
            return Ok(());
        }
        let code = spec.code.clone();
        let replaced = self.providers.write().insert(code.clone(), spec.clone()).is_some();
        if replaced {
            self.defaults.write().retain(|i| i.definition != code);
        }
        self.refresh();

        let area = spec.area_or_default().to_string();
        if self.enforce_known_areas.load(Ordering::SeqCst) && !self.is_known_area(&area) {
            log::warn!("dashboard provider {} targets unknown area {}; no default placement", code, area);
        } else {
            let instance = WidgetInstance {
                id: format!("default.{code}"),
                definition: code.clone(),
                area,
                config: spec.default_config.clone(),
                position: 0,
                span: clamp_span(spec.default_span),
                hidden: false,
                locale: String::new(),
            };
            self.defaults.write().push(instance.clone());
            self.seed_instance(&spec, instance).await;
        }

        self.install_command(&spec);
        Ok(())
    }

    async fn seed_instance(&self, spec: &DashboardProviderSpec, instance: WidgetInstance) {
        let Some(widgets) = &self.widgets else {
            return;
        };
        let mut definition = spec.definition();
        definition.schema = definition.persisted_schema();
        if let Err(err) = widgets.register_definition(definition).await {
            log::warn!("failed to register widget definition {}: {:#}", spec.code, err);
            return;
        }
        let exists = match widgets.has_instance_for_definition(&spec.code).await {
            Ok(Some(exists)) => Ok(exists),
            Ok(None) => widgets
                .list_instances(None)
                .await
                .map(|list| list.iter().any(|i| i.definition == spec.code)),
            Err(err) => Err(err),
        };
        match exists {
            Ok(true) => {}
            Ok(false) => {
                if let Err(err) = widgets.save_instance(instance).await {
                    log::warn!("failed to seed widget instance for {}: {:#}", spec.code, err);
                }
            }
            Err(err) => log::warn!("failed to look up widget instances for {}: {:#}", spec.code, err),
        }
    }

    fn install_command(&self, spec: &DashboardProviderSpec) {
        let (Some(bus), Some(name)) = (
            &self.commands,
            spec.command_name.as_deref().filter(|n| !n.trim().is_empty()),
        ) else {
            return;
        };
        if !self.handler_installed.swap(true, Ordering::SeqCst)
            && !bus.has_handler::<DashboardProviderCommand>()
        {
            let handler = ProviderCommandHandler {
                providers: self.providers.clone(),
            };
            if let Err(err) = bus.register_query::<DashboardProviderCommand, _>(handler) {
                log::warn!("dashboard command handler not installed: {}", err);
            }
        }
        if bus.has_factory(name) {
            log::warn!("command {} already registered; provider {} not bound", name, spec.code);
            return;
        }
        let code = spec.code.clone();
        let registered = bus.register_factory(name, move |payload: &JsonMap, _ids: &[String]| {
            Ok(DashboardProviderCommand {
                code: code.clone(),
                config: payload.clone(),
            })
        });
        if let Err(err) = registered {
            log::warn!("command {} not registered for provider {}: {}", name, spec.code, err);
        }
    }

    /// The layout saved by `user_id`, if any.
    pub async fn user_layout(&self, user_id: &str) -> Option<Vec<WidgetInstance>> {
        if user_id.trim().is_empty() {
            return None;
        }
        let preferences = self.preferences.read().clone()?;
        match preferences.get(user_id, LAYOUT_PREFERENCE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(layout) => Some(layout),
                Err(err) => {
                    log::warn!("ignoring unreadable dashboard layout of {}: {}", user_id, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                log::warn!("failed to load dashboard layout of {}: {:#}", user_id, err);
                None
            }
        }
    }

    pub async fn save_user_layout(&self, user_id: &str, layout: Vec<WidgetInstance>) -> AdminResult<()> {
        self.save_user_layout_with_context(&AdminContext::new(user_id), layout)
            .await
    }

    pub async fn save_user_layout_with_context(
        &self,
        ctx: &AdminContext,
        mut layout: Vec<WidgetInstance>,
    ) -> AdminResult<()> {
        if ctx.user_id.trim().is_empty() {
            return Err(AdminError::required_field("user_id"));
        }
        let preferences = self
            .preferences
            .read()
            .clone()
            .ok_or_else(|| AdminError::service_not_configured("preferences"))?;
        for instance in layout.iter_mut() {
            instance.span = clamp_span(instance.span);
        }
        let count = layout.len();
        let value = serde_json::to_value(&layout)
            .map_err(|e| AdminError::internal(format!("failed to encode dashboard layout: {e}")))?;
        preferences
            .set(&ctx.user_id, LAYOUT_PREFERENCE_KEY, value)
            .await?;

        let sink = self.activity.read().clone();
        let entry = ActivityEntry::new(&ctx.actor(), "dashboard.layout.save", &format!("dashboard:{}", ctx.user_id))
            .with("widgets", json!(count));
        record_activity(&sink, ctx, entry).await;
        Ok(())
    }

    async fn instances(&self) -> Vec<WidgetInstance> {
        if let Some(widgets) = &self.widgets {
            match widgets.list_instances(None).await {
                Ok(list) => return list,
                Err(err) => log::warn!("widget backend unavailable, using default placements: {:#}", err),
            }
        }
        self.default_instances()
    }

    async fn apply_user_layout(&self, ctx: &AdminContext, instances: &mut [WidgetInstance]) {
        let Some(saved) = self.user_layout(&ctx.user_id).await else {
            return;
        };
        for instance in instances.iter_mut() {
            let Some(pref) = saved.iter().find(|p| p.id == instance.id) else {
                continue;
            };
            if !pref.area.trim().is_empty() {
                instance.area = pref.area.clone();
            }
            instance.position = pref.position;
            instance.span = pref.span;
            instance.hidden = pref.hidden;
            instance
                .config
                .extend(pref.config.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    async fn fetch_data(&self, ctx: &AdminContext, spec: &DashboardProviderSpec, config: &JsonMap) -> JsonMap {
        let Some(handler) = spec.handler.clone() else {
            return JsonMap::new();
        };
        let mut merged = spec.default_config.clone();
        merged.extend(config.iter().map(|(k, v)| (k.clone(), v.clone())));
        match handler.fetch(ctx.clone(), merged).await {
            Ok(mut data) => {
                sanitize_widget_data(&mut data);
                data
            }
            Err(err) => {
                log::warn!("dashboard provider {} failed: {:#}", spec.code, err);
                let mut data = JsonMap::new();
                data.insert("error".to_string(), Value::String(err.to_string()));
                data
            }
        }
    }

    /// Areas in preferred order with their visible widgets resolved. Hidden
    /// widgets are kept (without data) only when `include_hidden`.
    async fn compose(&self, ctx: &AdminContext, include_hidden: bool) -> Vec<DashboardArea> {
        let components = self.components();
        let mut instances = self.instances().await;
        self.apply_user_layout(ctx, &mut instances).await;
        let authorizer = self.authorizer.read().clone();

        let mut grouped: BTreeMap<(usize, String), Vec<WidgetInstance>> = BTreeMap::new();
        for area in &components.areas {
            grouped.entry(area_rank(&area.code)).or_default();
        }
        for instance in instances {
            let Some(spec) = components.providers.get(&instance.definition) else {
                log::debug!("skipping widget {} without provider", instance.definition);
                continue;
            };
            if instance.hidden && !include_hidden {
                continue;
            }
            if let (Some(authorizer), Some(permission)) = (
                authorizer.as_ref(),
                spec.permission.as_deref().filter(|p| !p.trim().is_empty()),
            ) {
                if !authorizer.can(ctx, permission, DASHBOARD_RESOURCE) {
                    continue;
                }
            }
            let area = if instance.area.trim().is_empty() {
                spec.area_or_default().to_string()
            } else {
                instance.area.clone()
            };
            grouped.entry(area_rank(&area)).or_default().push(instance);
        }

        let mut areas = Vec::with_capacity(grouped.len());
        for ((_, code), mut placed) in grouped {
            // explicit order first, insertion order otherwise (stable sort)
            placed.sort_by_key(|i| if i.position > 0 { (0, i.position) } else { (1, 0) });
            let mut widgets = Vec::with_capacity(placed.len());
            for (order, instance) in placed.into_iter().enumerate() {
                let Some(spec) = components.providers.get(&instance.definition) else {
                    continue;
                };
                let data = if instance.hidden {
                    JsonMap::new()
                } else {
                    self.fetch_data(ctx, spec, &instance.config).await
                };
                let span = clamp_span(instance.span);
                widgets.push(ResolvedWidget {
                    id: instance.id,
                    definition: instance.definition,
                    area: code.clone(),
                    data,
                    config: instance.config,
                    hidden: instance.hidden,
                    span,
                    layout: WidgetLayoutMeta {
                        width: span,
                        order: order as i32,
                    },
                });
            }
            let title = components
                .areas
                .iter()
                .find(|a| a.code == code)
                .map(|a| a.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| code.clone());
            areas.push(DashboardArea { code, title, widgets });
        }
        areas
    }

    /// Flat widget list for client rendering.
    pub async fn resolve(&self, ctx: &AdminContext) -> AdminResult<Vec<JsonMap>> {
        let ctx = ctx.defaulting_render_mode(RenderMode::Client);
        let areas = self.compose(&ctx, false).await;
        Ok(areas
            .into_iter()
            .flat_map(|area| area.widgets)
            .map(|widget| {
                let mut out = JsonMap::new();
                out.insert("id".to_string(), Value::String(widget.id));
                out.insert("definition".to_string(), Value::String(widget.definition));
                out.insert("area".to_string(), Value::String(widget.area));
                out.insert("config".to_string(), Value::Object(widget.config));
                out.insert("data".to_string(), Value::Object(widget.data));
                out.insert("span".to_string(), json!(widget.span));
                out
            })
            .collect())
    }

    /// Grouped layout for server side rendering.
    pub async fn render_layout(
        &self,
        ctx: &AdminContext,
        theme: Option<ThemeSelection>,
        base_path: &str,
    ) -> AdminResult<DashboardLayout> {
        let ctx = ctx.defaulting_render_mode(RenderMode::Ssr);
        let areas = self.compose(&ctx, true).await;
        Ok(DashboardLayout {
            areas,
            base_path: base_path.to_string(),
            theme,
        })
    }
}

impl ActivityAware for Dashboard {
    fn set_activity_sink(&self, sink: Arc<dyn ActivitySink>) {
        *self.activity.write() = sink;
    }
}
