use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AdminError, AdminResult};
use crate::model::{AdminContext, JsonMap};

/// A typed command or query input.
///
/// `type_name` is what factories and handlers are registered under; for
/// handler registration it is read from `Default::default()`.
pub trait Message: Any + Send + Sync {
    fn type_name(&self) -> &str;

    fn validate(&self) -> AdminResult<()> {
        Ok(())
    }
}

/// Handler for a message that produces no value.
#[async_trait::async_trait]
pub trait CommandHandler<M: Message>: Send + Sync {
    async fn execute(&self, ctx: &AdminContext, message: M) -> AdminResult<()>;
}

/// Handler for a message that produces a value.
#[async_trait::async_trait]
pub trait QueryHandler<M: Message>: Send + Sync {
    type Output: Serialize + Send;

    async fn query(&self, ctx: &AdminContext, message: M) -> AdminResult<Self::Output>;
}

trait ErasedMessage: Send + Sync {
    fn type_name(&self) -> &str;
    fn validate(&self) -> AdminResult<()>;
    fn message_type(&self) -> TypeId;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M: Message> ErasedMessage for M {
    fn type_name(&self) -> &str {
        Message::type_name(self)
    }

    fn validate(&self) -> AdminResult<()> {
        Message::validate(self)
    }

    fn message_type(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

type Factory = Arc<dyn Fn(&JsonMap, &[String]) -> AdminResult<Box<dyn ErasedMessage>> + Send + Sync>;

#[async_trait::async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle(&self, ctx: &AdminContext, message: Box<dyn Any + Send>) -> AdminResult<Option<Value>>;
}

fn downcast<M: Message>(message: Box<dyn Any + Send>) -> AdminResult<M> {
    message
        .downcast::<M>()
        .map(|m| *m)
        .map_err(|_| AdminError::internal("command bus routed a message to the wrong handler"))
}

struct CommandAdapter<M, H> {
    handler: H,
    _message: PhantomData<fn() -> M>,
}

#[async_trait::async_trait]
impl<M, H> ErasedHandler for CommandAdapter<M, H>
where
    M: Message,
    H: CommandHandler<M>,
{
    async fn handle(&self, ctx: &AdminContext, message: Box<dyn Any + Send>) -> AdminResult<Option<Value>> {
        let message = downcast::<M>(message)?;
        self.handler.execute(ctx, message).await?;
        Ok(None)
    }
}

struct QueryAdapter<M, H> {
    handler: H,
    _message: PhantomData<fn() -> M>,
}

#[async_trait::async_trait]
impl<M, H> ErasedHandler for QueryAdapter<M, H>
where
    M: Message,
    H: QueryHandler<M>,
{
    async fn handle(&self, ctx: &AdminContext, message: Box<dyn Any + Send>) -> AdminResult<Option<Value>> {
        let message = downcast::<M>(message)?;
        let output = self.handler.query(ctx, message).await?;
        let value = serde_json::to_value(output)
            .map_err(|e| AdminError::internal(format!("failed to encode query result: {e}")))?;
        Ok(Some(value))
    }
}

struct RegisteredHandler {
    name: String,
    handler: Arc<dyn ErasedHandler>,
}

/// Name-indexed message factories plus one handler per message type.
///
/// Registration happens at startup; dispatch is safe from any number of
/// concurrent callers and holds no per-request state.
pub struct CommandBus {
    factories: RwLock<HashMap<String, Factory>>,
    handlers: RwLock<HashMap<TypeId, RegisteredHandler>>,
    enabled: AtomicBool,
}

impl CommandBus {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Registers a factory mapping `(payload, ids)` to a typed message.
    pub fn register_factory<M, F>(&self, name: &str, factory: F) -> AdminResult<()>
    where
        M: Message,
        F: Fn(&JsonMap, &[String]) -> AdminResult<M> + Send + Sync + 'static,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdminError::required_field("command.name"));
        }
        let mut factories = self.factories.write();
        if factories.contains_key(name) {
            return Err(AdminError::duplicate("command factory", name));
        }
        let erased: Factory = Arc::new(move |payload: &JsonMap, ids: &[String]| {
            factory(payload, ids).map(|m| Box::new(m) as Box<dyn ErasedMessage>)
        });
        factories.insert(name.to_string(), erased);
        Ok(())
    }

    /// Factory that deserializes the payload straight into `M`; `ids`, when
    /// given, are exposed to the payload under the `ids` key.
    pub fn register_message<M>(&self) -> AdminResult<()>
    where
        M: Message + Default + DeserializeOwned,
    {
        let name = Message::type_name(&M::default()).to_string();
        self.register_factory(&name, |payload: &JsonMap, ids: &[String]| {
            let mut payload = payload.clone();
            if !ids.is_empty() && !payload.contains_key("ids") {
                payload.insert("ids".to_string(), serde_json::json!(ids));
            }
            serde_json::from_value::<M>(Value::Object(payload))
                .map_err(|e| AdminError::field("payload", &e.to_string()))
        })
    }

    pub fn has_factory(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn unregister_factory(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    pub fn factory_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn install(&self, name: String, type_id: TypeId, handler: Arc<dyn ErasedHandler>) -> AdminResult<()> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&type_id) {
            return Err(AdminError::duplicate("command handler", &name));
        }
        handlers.insert(type_id, RegisteredHandler { name, handler });
        Ok(())
    }

    pub fn register_command<M, H>(&self, handler: H) -> AdminResult<()>
    where
        M: Message + Default,
        H: CommandHandler<M> + 'static,
    {
        let name = Message::type_name(&M::default()).to_string();
        self.install(
            name,
            TypeId::of::<M>(),
            Arc::new(CommandAdapter {
                handler,
                _message: PhantomData,
            }),
        )
    }

    pub fn register_query<M, H>(&self, handler: H) -> AdminResult<()>
    where
        M: Message + Default,
        H: QueryHandler<M> + 'static,
    {
        let name = Message::type_name(&M::default()).to_string();
        self.install(
            name,
            TypeId::of::<M>(),
            Arc::new(QueryAdapter {
                handler,
                _message: PhantomData,
            }),
        )
    }

    pub fn has_handler<M: Message>(&self) -> bool {
        self.handlers.read().contains_key(&TypeId::of::<M>())
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().values().map(|h| h.name.clone()).collect();
        names.sort();
        names
    }

    /// Factory → validate → handler, stopping at the first error.
    pub async fn dispatch_by_name(
        &self,
        ctx: &AdminContext,
        name: &str,
        payload: &JsonMap,
        ids: &[String],
    ) -> AdminResult<Option<Value>> {
        if !self.is_enabled() {
            return Err(AdminError::service_not_configured("command bus"));
        }
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AdminError::not_found("command", name))?;

        let message = factory(payload, ids)?;
        message.validate()?;

        let handler = self
            .handlers
            .read()
            .get(&message.message_type())
            .map(|h| h.handler.clone())
            .ok_or_else(|| AdminError::not_found("command handler", message.type_name()))?;

        log::debug!("dispatching command {}", name);
        handler.handle(ctx, message.into_any()).await
    }

    /// Typed dispatch that skips the factory.
    pub async fn dispatch<M: Message>(&self, ctx: &AdminContext, message: M) -> AdminResult<Option<Value>> {
        if !self.is_enabled() {
            return Err(AdminError::service_not_configured("command bus"));
        }
        Message::validate(&message)?;
        let handler = self
            .handlers
            .read()
            .get(&TypeId::of::<M>())
            .map(|h| h.handler.clone())
            .ok_or_else(|| AdminError::not_found("command handler", Message::type_name(&message)))?;
        handler.handle(ctx, Box::new(message)).await
    }

    /// Drops every factory and handler.
    pub fn reset(&self) {
        self.factories.write().clear();
        self.handlers.write().clear();
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    struct PublishPage {
        #[serde(default)]
        ids: Vec<String>,
        #[serde(default)]
        note: String,
    }

    impl Message for PublishPage {
        fn type_name(&self) -> &str {
            "pages.publish"
        }

        fn validate(&self) -> AdminResult<()> {
            if self.ids.is_empty() {
                return Err(AdminError::field("ids", "at least one id is required"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl CommandHandler<PublishPage> for Recorder {
        async fn execute(&self, _ctx: &AdminContext, message: PublishPage) -> AdminResult<()> {
            self.seen.lock().extend(message.ids);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountPages {
        status: String,
    }

    impl Message for CountPages {
        fn type_name(&self) -> &str {
            "pages.count"
        }
    }

    struct Counter;

    #[async_trait::async_trait]
    impl QueryHandler<CountPages> for Counter {
        type Output = serde_json::Value;

        async fn query(&self, _ctx: &AdminContext, message: CountPages) -> AdminResult<Self::Output> {
            Ok(json!({ "status": message.status, "count": 3 }))
        }
    }

    fn payload(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_dispatch_runs_factory_validator_handler() {
        let bus = CommandBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_message::<PublishPage>().unwrap();
        bus.register_command::<PublishPage, _>(Recorder { seen: seen.clone() }).unwrap();

        let ctx = AdminContext::new("editor");
        let ids = vec!["p1".to_string(), "p2".to_string()];
        let result = bus
            .dispatch_by_name(&ctx, "pages.publish", &payload(json!({"note": "go"})), &ids)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(*seen.lock(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_validation_error_stops_before_handler() {
        let bus = CommandBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_message::<PublishPage>().unwrap();
        bus.register_command::<PublishPage, _>(Recorder { seen: seen.clone() }).unwrap();

        let err = bus
            .dispatch_by_name(&AdminContext::system(), "pages.publish", &JsonMap::new(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.fields().contains_key("ids"));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_query_handler_returns_value() {
        let bus = CommandBus::new();
        bus.register_factory("pages.count", |payload: &JsonMap, _ids: &[String]| {
            Ok(CountPages {
                status: payload
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("any")
                    .to_string(),
            })
        })
        .unwrap();
        bus.register_query::<CountPages, _>(Counter).unwrap();

        let out = bus
            .dispatch_by_name(
                &AdminContext::system(),
                "pages.count",
                &payload(json!({"status": "draft"})),
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, json!({"status": "draft", "count": 3}));
    }

    #[test]
    fn test_duplicate_registration_fails_and_reset_clears() {
        let bus = CommandBus::new();
        bus.register_message::<PublishPage>().unwrap();
        let err = bus.register_message::<PublishPage>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Duplicate);

        bus.register_command::<PublishPage, _>(Recorder::default()).unwrap();
        assert_eq!(
            bus.register_command::<PublishPage, _>(Recorder::default()).unwrap_err().kind,
            ErrorKind::Duplicate
        );

        bus.reset();
        assert!(!bus.has_factory("pages.publish"));
        assert!(!bus.has_handler::<PublishPage>());
        assert!(bus.register_message::<PublishPage>().is_ok());
    }

    #[tokio::test]
    async fn test_disabled_bus_reports_not_configured() {
        let bus = CommandBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.register_message::<PublishPage>().unwrap();
        bus.register_command::<PublishPage, _>(Recorder { seen: seen.clone() }).unwrap();
        bus.set_enabled(false);

        let err = bus
            .dispatch_by_name(
                &AdminContext::system(),
                "pages.publish",
                &payload(json!({"ids": ["p1"]})),
                &[],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceNotConfigured);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_found() {
        let bus = CommandBus::new();
        let err = bus
            .dispatch_by_name(&AdminContext::system(), "nope", &JsonMap::new(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
