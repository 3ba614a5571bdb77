use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Weak};

use crate::admin::Admin;
use crate::api::handlers;
use crate::api::router::{authenticate, handler_fn, AdminRouter, Middleware, RequestContext, RouteHandler};
use crate::error::{AdminError, AdminResult};

/// Adapts a core handler to the router. The handler holds the console
/// weakly since the console owns the router.
fn bind<F, Fut>(admin: &Arc<Admin>, f: F) -> RouteHandler
where
    F: Fn(Arc<Admin>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdminResult<Value>> + Send + 'static,
{
    let weak: Weak<Admin> = Arc::downgrade(admin);
    handler_fn(move |req: RequestContext| {
        let call = weak.upgrade().map(|admin| f(admin, req));
        async move {
            match call {
                Some(call) => call.await,
                None => Err(AdminError::service_not_configured("admin")),
            }
        }
    })
}

/// Contributes the console's own endpoints under the admin API base.
pub fn register_core_routes(admin: &Arc<Admin>, router: &dyn AdminRouter) {
    let base = admin.config().admin_api_base();
    let path = |suffix: &str| format!("{base}/{suffix}");
    let guarded: Vec<Middleware> = admin
        .authenticator()
        .map(|a| vec![authenticate(a.clone())])
        .unwrap_or_default();
    let mw = guarded.as_slice();

    // Health
    router.get(&path("health"), bind(admin, handlers::health_check), &[]);

    // Panels
    router.get(&path("panels/:panel/schema"), bind(admin, handlers::panel_schema), mw);
    router.get(&path("panels/:panel/tabs"), bind(admin, handlers::panel_tabs), mw);

    // Dashboard
    router.get(&path("dashboard"), bind(admin, handlers::dashboard_widgets), mw);
    router.get(&path("dashboard/layout"), bind(admin, handlers::dashboard_layout), mw);
    router.put(&path("dashboard/layout"), bind(admin, handlers::save_dashboard_layout), mw);
    router.post(&path("dashboard/layout"), bind(admin, handlers::save_dashboard_layout), mw);

    // Navigation
    router.get(&path("navigation"), bind(admin, handlers::navigation), mw);

    // Commands
    router.post(&path("commands/:name"), bind(admin, handlers::dispatch_command), mw);

    // Settings
    router.get(&path("settings"), bind(admin, handlers::get_settings), mw);
    router.post(&path("settings"), bind(admin, handlers::save_settings), mw);

    // Activity
    router.get(&path("activity"), bind(admin, handlers::activity), mw);

    // Feature flags
    router.get(&path("features"), bind(admin, handlers::features), mw);
    router.post(&path("features/:key"), bind(admin, handlers::set_feature), mw);

    log::info!("registered core admin routes under {}", base);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router::{RouteMethod, RouteTable};
    use crate::config::AdminConfig;
    use crate::error::ErrorKind;
    use crate::model::AdminContext;

    #[tokio::test]
    async fn test_handlers_fail_once_admin_is_dropped() {
        let table = RouteTable::new();
        let admin = Arc::new(Admin::in_memory(AdminConfig::default()).unwrap());
        register_core_routes(&admin, &table);
        assert!(table
            .routes()
            .contains(&(RouteMethod::Get, "/admin/api/health".to_string())));

        let ok = table
            .call(RouteMethod::Get, "/admin/api/health", RequestContext::default())
            .await
            .unwrap();
        assert_eq!(ok["status"], "healthy");

        drop(admin);
        let err = table
            .call(
                RouteMethod::Get,
                "/admin/api/navigation",
                RequestContext::new(AdminContext::new("alice")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceNotConfigured);
    }
}
