use std::process;
use std::sync::Arc;
use std::time::Duration;

use cable::BroadcastHub;
use log::*;
use service::{config::Config, logging::Logger, AppState};
use tokio::net::TcpListener;
use web::dispatcher::RouteSet;
use web::rpc::RpcRegistry;
use web::websocket::handler::start_heartbeat_task;
use web::ServerState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting turbo_runtime in {} mode",
        config.runtime_env()
    );

    let hub = Arc::new(BroadcastHub::new());
    let heartbeat = Duration::from_secs(config.cable_heartbeat_secs);
    let app_state = AppState::new(config, &hub);

    // Applications register their own routes and RPC actions before serving
    let routes = RouteSet::new();
    if routes.is_empty() {
        warn!("No routes registered; requests without an RPC action will get 404");
    } else {
        info!("Registered {} route(s)", routes.len());
    }
    let server_state =
        ServerState::from_config(app_state, Arc::new(routes), Arc::new(RpcRegistry::new()));

    let _heartbeat = start_heartbeat_task(Arc::clone(&hub), heartbeat);

    let address = server_state.app_state.config.listen_address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {address}: {e}");
            process::exit(1);
        }
    };
    info!("Server starting... listening for connections on http://{address}");

    let router = web::router::define_routes(server_state);
    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {e}");
        process::exit(1);
    }
}
