//! # web
//!
//! The HTTP surface of the runtime: the request [`Dispatcher`](dispatcher::Dispatcher),
//! the header-routed [`RpcGateway`](rpc::RpcGateway), the Action Cable
//! WebSocket endpoint and the router that puts them together.

use std::sync::Arc;

use axum::extract::FromRef;
use csrf::CsrfProtection;
use log::*;

use dispatcher::{Dispatcher, RouteTable};
use rpc::{RpcGateway, RpcRegistry};

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod router;
pub mod rpc;
pub mod websocket;

pub use dispatcher::HandlerError;
pub use error::{Error, Result};
pub use service::AppState;

/// Router state: the service state plus the two request paths built from it.
#[derive(Clone)]
pub struct ServerState {
    pub app_state: AppState,
    pub dispatcher: Arc<Dispatcher>,
    pub rpc: Arc<RpcGateway>,
}

impl ServerState {
    /// Build the dispatcher and RPC gateway from configuration. Both share one
    /// [`CsrfProtection`] so a token issued by either is accepted by both.
    pub fn from_config(
        app_state: AppState,
        routes: Arc<dyn RouteTable>,
        registry: Arc<RpcRegistry>,
    ) -> Self {
        let config = &app_state.config;

        let csrf = match config.csrf_secret() {
            Some(secret) => CsrfProtection::with_secret(secret),
            None => {
                warn!("No CSRF secret configured; tokens will not survive a restart");
                CsrfProtection::new()
            }
        };
        let max_age = i64::try_from(config.csrf_token_max_age_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        let csrf = Arc::new(csrf.with_max_age(max_age));

        let dispatcher = Dispatcher::builder(routes, Arc::clone(&csrf))
            .default_redirect(config.default_redirect.clone())
            .expose_error_details(config.expose_error_details())
            .max_body_bytes(config.max_body_bytes)
            .build();
        let rpc = RpcGateway::new(registry, csrf)
            .csrf_required(config.rpc_csrf_required)
            .max_body_bytes(config.max_body_bytes);

        Self {
            app_state,
            dispatcher: Arc::new(dispatcher),
            rpc: Arc::new(rpc),
        }
    }
}

impl FromRef<ServerState> for AppState {
    fn from_ref(state: &ServerState) -> Self {
        state.app_state.clone()
    }
}
