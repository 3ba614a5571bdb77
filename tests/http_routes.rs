use admin_console::api::{AdminRouter, RouteTable};
use admin_console::contracts::Authenticator;
use admin_console::{build_app, Admin, AdminConfig, AdminContext, AdminError, AdminResult};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

fn config_with(features: &[&str]) -> AdminConfig {
    let features: BTreeMap<String, bool> = features.iter().map(|f| (f.to_string(), true)).collect();
    AdminConfig {
        features,
        ..Default::default()
    }
}

async fn send(app: &Router, method: &str, uri: &str, user: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if !user.is_empty() {
        request = request.header("x-user-id", user);
    }
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_booted_console() {
    let (_admin, app) = build_app(AdminConfig::default(), false).await.unwrap();
    let (status, body) = send(&app, "GET", "/admin/api/health", "", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["booted"], true);
}

#[tokio::test]
async fn test_disabled_feature_maps_to_service_unavailable() {
    let (_admin, app) = build_app(AdminConfig::default(), false).await.unwrap();
    let (status, body) = send(&app, "GET", "/admin/api/dashboard", "alice", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "service_not_configured");
}

#[tokio::test]
async fn test_demo_dashboard_and_publish_command() {
    let (admin, app) = build_app(config_with(&["dashboard", "commands"]), true)
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/admin/api/dashboard", "alice", None).await;
    assert_eq!(status, StatusCode::OK);
    let widgets = body["widgets"].as_array().unwrap();
    assert!(widgets.iter().any(|w| w["definition"] == "demo.post_stats"));

    let (status, body) = send(
        &app,
        "POST",
        "/admin/api/commands/posts.publish",
        "alice",
        Some(json!({ "ids": ["roadmap"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], Value::Null);
    assert_eq!(admin.activity_log().unwrap().recent(5, Some("posts.")).len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/admin/api/commands/posts.publish",
        "alice",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["metadata"]["fields"]["ids"].is_string());
}

#[tokio::test]
async fn test_panel_schema_route_uses_path_param() {
    let (_admin, app) = build_app(AdminConfig::default(), true).await.unwrap();
    let (status, body) = send(&app, "GET", "/admin/api/panels/posts/schema", "alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "posts");

    let (status, body) = send(&app, "GET", "/admin/api/panels/missing/schema", "alice", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_settings_round_trip_over_http() {
    let (_admin, app) = build_app(config_with(&["settings"]), false).await.unwrap();
    let (status, _) = send(
        &app,
        "POST",
        "/admin/api/settings",
        "alice",
        Some(json!({ "scope": "site", "values": { "admin.title": "Back office" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/admin/api/settings", "alice", None).await;
    assert_eq!(status, StatusCode::OK);
    let title = body["values"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["key"] == "admin.title")
        .unwrap()
        .clone();
    assert_eq!(title["value"], "Back office");
    assert_eq!(title["scope"], "site");

    let (status, body) = send(
        &app,
        "POST",
        "/admin/api/settings",
        "alice",
        Some(json!({ "scope": "site", "values": { "dashboard.customizable": "yes" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["metadata"]["fields"]["dashboard.customizable"], "expected boolean");
}

#[tokio::test]
async fn test_feature_toggle_switches_command_bus() {
    let (_admin, app) = build_app(config_with(&["commands"]), true).await.unwrap();

    let (status, body) = send(&app, "GET", "/admin/api/features", "alice", None).await;
    assert_eq!(status, StatusCode::OK);
    let commands = body["features"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["key"] == "commands")
        .unwrap()
        .clone();
    assert_eq!(commands["enabled"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/admin/api/features/commands",
        "alice",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/admin/api/commands/posts.publish",
        "alice",
        Some(json!({ "ids": ["faq"] })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_malformed_requests_are_bad_requests() {
    let (_admin, app) = build_app(config_with(&["settings"]), false).await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/admin/api/settings")
        .header("x-user-id", "alice")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/admin/api/navigation")
        .header("x-render-mode", "table")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

struct RequireUser;

#[async_trait::async_trait]
impl Authenticator for RequireUser {
    async fn wrap(&self, ctx: AdminContext) -> AdminResult<AdminContext> {
        if ctx.user_id.is_empty() {
            return Err(AdminError::unauthorized("missing user"));
        }
        Ok(ctx.with_attribute("authenticated", "true"))
    }
}

#[tokio::test]
async fn test_authenticator_guards_everything_but_health() {
    let admin = Arc::new(
        Admin::in_memory(AdminConfig::default())
            .unwrap()
            .with_authenticator(Arc::new(RequireUser)),
    );
    let table = Arc::new(RouteTable::new());
    admin
        .initialize(Some(table.clone() as Arc<dyn AdminRouter>))
        .await
        .unwrap();
    let app = table.to_axum();

    let (status, _) = send(&app, "GET", "/admin/api/health", "", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/admin/api/navigation", "", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, body) = send(&app, "GET", "/admin/api/navigation", "alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].is_array());
}
