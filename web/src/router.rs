use crate::{
    controller::{health_check_controller, request_controller},
    rpc::RPC_ACTION_HEADER,
    websocket::handler::cable_handler,
    AppState, ServerState,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use csrf::CSRF_HEADER;
use log::*;
use tower_http::cors::CorsLayer;

pub fn define_routes(server_state: ServerState) -> Router {
    let cors = cors_layer(&server_state.app_state);

    Router::new()
        .merge(health_routes())
        .merge(cable_routes(server_state.app_state.clone()))
        .fallback(request_controller::handle)
        .with_state(server_state)
        .layer(cors)
}

fn health_routes() -> Router<ServerState> {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn cable_routes(app_state: AppState) -> Router<ServerState> {
    let path = app_state.config.cable_path.clone();
    Router::new()
        .route(&path, get(cable_handler))
        .with_state(app_state)
}

fn cors_layer(app_state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
            HeaderName::from_static(RPC_ACTION_HEADER),
        ])
}

#[cfg(test)]
mod router_tests;
