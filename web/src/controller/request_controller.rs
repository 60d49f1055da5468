use axum::extract::{Request, State};
use axum::response::Response;
use log::*;

use crate::rpc::is_rpc_request;
use crate::ServerState;

/// Every request no other route claims: RPC calls when `X-RPC-Action` is
/// present, the dispatcher otherwise.
pub async fn handle(State(state): State<ServerState>, request: Request) -> Response {
    if is_rpc_request(request.headers()) {
        trace!("RPC {} {}", request.method(), request.uri());
        state.rpc.handle(request).await
    } else {
        trace!("Dispatch {} {}", request.method(), request.uri());
        state.dispatcher.dispatch(request).await
    }
}
