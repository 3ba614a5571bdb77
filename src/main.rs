use admin_console::{build_app, AdminConfig};
use axum::serve;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("tower_http", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .init();

    println!("Admin console server");

    let config = AdminConfig::load()?;
    println!(
        "Configuration loaded: server={}:{} base_path={}",
        config.server.host, config.server.port, config.base_path
    );

    let load_demo = std::env::var("ADMIN_LOAD_DEMO").unwrap_or_default() == "true";
    if load_demo {
        println!("Loading demo module...");
    }

    let bind_address = config.server_address();
    let api_base = config.admin_api_base();
    let assets = config.assets_dir.clone().map(|dir| {
        let prefix = if config.theme_asset_prefix.trim().is_empty() {
            format!("{}/assets", config.base_path.trim_end_matches('/'))
        } else {
            config.theme_asset_prefix.trim_end_matches('/').to_string()
        };
        (prefix, dir)
    });

    let (_admin, mut app) = build_app(config, load_demo).await?;
    if let Some((prefix, dir)) = assets {
        println!("Serving assets from {} at {}", dir, prefix);
        app = app.nest_service(&prefix, ServeDir::new(dir));
    }

    let listener = TcpListener::bind(&bind_address).await?;
    println!("Admin console running on http://{}", bind_address);
    println!("Admin API available at http://{}{}", bind_address, api_base);

    serve(listener, app).await?;

    Ok(())
}
