//! Host-agnostic route registration plus an axum-backed implementation.

use axum::{
    body::Bytes,
    extract::{Query, RawPathParams},
    response::{IntoResponse, Json, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::contracts::{Authenticator, BoxFuture};
use crate::error::{AdminError, AdminResult};
use crate::model::{AdminContext, JsonMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RouteMethod {
    fn filter(self) -> MethodFilter {
        match self {
            RouteMethod::Get => MethodFilter::GET,
            RouteMethod::Post => MethodFilter::POST,
            RouteMethod::Put => MethodFilter::PUT,
            RouteMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteMethod::Get => write!(f, "GET"),
            RouteMethod::Post => write!(f, "POST"),
            RouteMethod::Put => write!(f, "PUT"),
            RouteMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// Everything a route handler gets from the request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub admin: AdminContext,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

impl RequestContext {
    pub fn new(admin: AdminContext) -> Self {
        Self {
            admin,
            ..Default::default()
        }
    }

    pub fn param(&self, name: &str) -> AdminResult<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AdminError::required_field(name))
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// The body as an object; an absent body is an empty object.
    pub fn body_map(&self) -> AdminResult<JsonMap> {
        match &self.body {
            Value::Null => Ok(JsonMap::new()),
            Value::Object(map) => Ok(map.clone()),
            _ => Err(AdminError::invalid_argument("request body must be a JSON object")),
        }
    }

    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> AdminResult<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| AdminError::field("body", &e.to_string()))
    }
}

pub type RouteHandler = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, AdminResult<Value>> + Send + Sync>;

/// Wraps a handler; the first middleware of a chain runs outermost.
pub type Middleware = Arc<dyn Fn(RouteHandler) -> RouteHandler + Send + Sync>;

pub fn handler_fn<F, Fut>(f: F) -> RouteHandler
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdminResult<Value>> + Send + 'static,
{
    Arc::new(move |req: RequestContext| -> BoxFuture<'static, AdminResult<Value>> { Box::pin(f(req)) })
}

pub fn chain(handler: RouteHandler, middleware: &[Middleware]) -> RouteHandler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, layer| layer(next))
}

/// Replaces the request context with the authenticator's verdict.
pub fn authenticate(authenticator: Arc<dyn Authenticator>) -> Middleware {
    Arc::new(move |next: RouteHandler| {
        let authenticator = authenticator.clone();
        handler_fn(move |mut req: RequestContext| {
            let authenticator = authenticator.clone();
            let next = next.clone();
            async move {
                req.admin = authenticator.wrap(req.admin).await?;
                next(req).await
            }
        })
    })
}

/// Route registration surface the console contributes its handlers to.
pub trait AdminRouter: Send + Sync {
    fn handle(&self, method: RouteMethod, path: &str, handler: RouteHandler, middleware: &[Middleware]);

    fn get(&self, path: &str, handler: RouteHandler, middleware: &[Middleware]) {
        self.handle(RouteMethod::Get, path, handler, middleware);
    }

    fn post(&self, path: &str, handler: RouteHandler, middleware: &[Middleware]) {
        self.handle(RouteMethod::Post, path, handler, middleware);
    }

    fn put(&self, path: &str, handler: RouteHandler, middleware: &[Middleware]) {
        self.handle(RouteMethod::Put, path, handler, middleware);
    }

    fn delete(&self, path: &str, handler: RouteHandler, middleware: &[Middleware]) {
        self.handle(RouteMethod::Delete, path, handler, middleware);
    }
}

struct Route {
    method: RouteMethod,
    path: String,
    handler: RouteHandler,
}

/// Collects routes and turns them into an axum [`Router`]. Paths use axum's
/// `:param` syntax.
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered `(method, path)` pairs in registration order.
    pub fn routes(&self) -> Vec<(RouteMethod, String)> {
        self.routes
            .read()
            .iter()
            .map(|r| (r.method, r.path.clone()))
            .collect()
    }

    /// Runs a registered handler directly, bypassing HTTP.
    pub async fn call(&self, method: RouteMethod, path: &str, req: RequestContext) -> AdminResult<Value> {
        let handler = self
            .routes
            .read()
            .iter()
            .find(|r| r.method == method && r.path == path)
            .map(|r| r.handler.clone())
            .ok_or_else(|| AdminError::not_found("route", &format!("{method} {path}")))?;
        handler(req).await
    }

    pub fn to_axum(&self) -> Router {
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for route in self.routes.read().iter() {
            let handler = route.handler.clone();
            let endpoint = move |admin: AdminContext,
                                 params: Option<RawPathParams>,
                                 Query(query): Query<BTreeMap<String, String>>,
                                 body: Bytes| {
                let handler = handler.clone();
                let params: BTreeMap<String, String> = params
                    .iter()
                    .flat_map(|p| p.iter())
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                async move { respond(handler, admin, params, query, body).await }
            };
            let entry = by_path.remove(&route.path).unwrap_or_else(MethodRouter::new);
            by_path.insert(route.path.clone(), entry.on(route.method.filter(), endpoint));
        }
        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
    }
}

impl AdminRouter for RouteTable {
    fn handle(&self, method: RouteMethod, path: &str, handler: RouteHandler, middleware: &[Middleware]) {
        log::debug!("route {} {}", method, path);
        let handler = chain(handler, middleware);
        let mut routes = self.routes.write();
        match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(existing) => existing.handler = handler,
            None => routes.push(Route {
                method,
                path: path.to_string(),
                handler,
            }),
        }
    }
}

async fn respond(
    handler: RouteHandler,
    admin: AdminContext,
    params: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: Bytes,
) -> Response {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                return AdminError::invalid_argument(format!("invalid JSON body: {err}")).into_response()
            }
        }
    };
    let req = RequestContext {
        admin,
        params,
        query,
        body,
    };
    match handler(req).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_middleware_runs_outermost_first() {
        let tag = |label: &'static str| -> Middleware {
            Arc::new(move |next: RouteHandler| {
                handler_fn(move |mut req: RequestContext| {
                    let next = next.clone();
                    req.admin.attributes
                        .entry("trail".to_string())
                        .or_default()
                        .push_str(label);
                    async move { next(req).await }
                })
            })
        };
        let table = RouteTable::new();
        table.get(
            "/trail",
            handler_fn(|req: RequestContext| async move {
                Ok(json!(req.admin.attributes.get("trail").cloned().unwrap_or_default()))
            }),
            &[tag("a"), tag("b")],
        );
        let out = table
            .call(RouteMethod::Get, "/trail", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!("ab"));
    }

    #[test]
    fn test_body_map_accepts_objects_only() {
        let mut req = RequestContext::default();
        assert!(req.body_map().unwrap().is_empty());
        req.body = json!([1, 2]);
        assert!(req.body_map().is_err());
        req.body = json!({"a": 1});
        assert_eq!(req.body_map().unwrap()["a"], 1);
    }

    #[test]
    fn test_reregistering_replaces_handler() {
        let table = RouteTable::new();
        let ok = || handler_fn(|_req: RequestContext| async { Ok(Value::Null) });
        table.get("/a", ok(), &[]);
        table.get("/a", ok(), &[]);
        table.post("/a", ok(), &[]);
        assert_eq!(
            table.routes(),
            vec![(RouteMethod::Get, "/a".to_string()), (RouteMethod::Post, "/a".to_string())]
        );
    }
}
