pub mod admin;
pub mod api;
pub mod config;
pub mod contracts;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use admin::{Admin, AdminDeps, FeatureStatus, MenuContributor, Module, ModuleContext};
pub use api::{AdminRouter, RequestContext, RouteMethod, RouteTable};
pub use config::AdminConfig;
pub use error::{AdminError, AdminResult, ErrorKind};
pub use logic::{CommandBus, Dashboard, FeatureKey, MenuAdapter, NavigationResolver, Registry, SettingsService};
pub use model::*;

use std::sync::Arc;

/// Builds an in-memory console, optionally with the demo module, boots it
/// against a fresh route table and returns the axum router for it.
pub async fn build_app(config: AdminConfig, with_demo: bool) -> AdminResult<(Arc<Admin>, axum::Router)> {
    let admin = Arc::new(Admin::in_memory(config)?);
    if with_demo {
        admin.register_module(Arc::new(seed::DemoModule::new()))?;
    }
    let table = Arc::new(RouteTable::new());
    admin.initialize(Some(table.clone() as Arc<dyn AdminRouter>)).await?;
    Ok((admin, table.to_axum()))
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = AdminConfig::load()?;
    let bind_address = config.server_address();
    let (_admin, app) = build_app(config, true).await?;

    let listener = TcpListener::bind(&bind_address).await?;
    serve(listener, app).await?;

    Ok(())
}
