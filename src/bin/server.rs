use log::{error, info, warn};
use std::net::SocketAddr;

use village_gate::config::GateConfig;
use village_gate::guard::RouteGuard;
use village_gate::handlers::routes;
use village_gate::navigation::Navigator;
use village_gate::security_logger::init_security_logger;
use village_gate::session::SessionStore;

#[tokio::main]
async fn main() {
    // Initialize env before logging so RUST_LOG from .env is honored
    let env_file = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match env_file {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    init_security_logger();

    let config = match GateConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let backend = match config.build_backend() {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to create identity backend: {}", e);
            std::process::exit(1);
        }
    };

    let store = SessionStore::new(backend, config.admin_email.clone(), &config.site_url);

    info!(
        "Configuration: host={}, port={}, backend={}, admin configured={}",
        config.host,
        config.port,
        store.backend_name(),
        config.admin_email.is_some()
    );
    let navigator = Navigator::new(store.clone(), RouteGuard::new(), config.routes.clone());
    navigator.spawn_recheck();

    // Resolve in the background; pages answer "resolving" until it is done
    let init_store = store.clone();
    tokio::spawn(async move {
        if let Err(e) = init_store.initialize().await {
            error!("Session initialization failed: {}", e);
        }
    });

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match warp::serve(routes(navigator)).try_bind_with_graceful_shutdown(addr, shutdown) {
        Ok((bound, server)) => {
            info!("Starting Village Gate on {}", bound);
            server.await;
            info!("Village Gate stopped");
        }
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}
