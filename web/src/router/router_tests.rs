use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use cable::BroadcastHub;
use clap::Parser;
use csrf::CsrfProtection;
use serde_json::{json, Value};
use service::config::Config;
use tower::ServiceExt;

use super::define_routes;
use crate::dispatcher::{
    Action, ActionIds, ActionResult, HandlerError, Params, RequestContext, Route, RouteSet,
};
use crate::rpc::{RpcRegistry, RpcValue, RPC_ACTION_HEADER};
use crate::{AppState, ServerState};

const SECRET: &str = "router-test-secret";

struct Index;

#[async_trait]
impl Action for Index {
    async fn call(
        &self,
        _ctx: &mut RequestContext,
        _ids: ActionIds,
        _params: Params,
    ) -> Result<Option<ActionResult>, HandlerError> {
        Ok(Some(ActionResult::html("<h1>Articles</h1>")))
    }
}

fn server_state() -> ServerState {
    let config = Config::parse_from(["turbo_runtime"]).set_csrf_secret(SECRET.to_string());
    let hub = Arc::new(BroadcastHub::new());
    let app_state = AppState::new(config, &hub);

    let routes = RouteSet::new().route(Route::new(Method::GET, "/articles", Index));
    let registry = RpcRegistry::new();
    registry.register_fn("Echo.say", |args: Vec<Value>| async move {
        Ok(RpcValue::from(Value::Array(args)))
    });

    ServerState::from_config(app_state, Arc::new(routes), Arc::new(registry))
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = define_routes(server_state());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response: Response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "healthy");
}

#[tokio::test]
async fn test_ordinary_requests_reach_the_dispatcher() {
    let app = define_routes(server_state());

    let request = Request::builder().uri("/articles").body(Body::empty()).unwrap();
    let response: Response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<h1>Articles</h1>"));

    let request = Request::builder().uri("/missing").body(Body::empty()).unwrap();
    let response: Response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rpc_header_bypasses_path_routing() {
    let app = define_routes(server_state());
    let token = CsrfProtection::with_secret(SECRET).generate_token("");

    // the path would match a route, but the header wins
    let request = Request::builder()
        .method(Method::POST)
        .uri("/articles")
        .header(RPC_ACTION_HEADER, "Echo.say")
        .header("x-csrf-token", token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"args":["hi",2]}"#))
        .unwrap();
    let response: Response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, json!({ "result": ["hi", 2] }));
}

#[tokio::test]
async fn test_rpc_is_accepted_on_any_unclaimed_path() {
    let app = define_routes(server_state());
    let token = CsrfProtection::with_secret(SECRET).generate_token("");

    for path in ["/", "/rpc", "/no/such/route"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(RPC_ACTION_HEADER, "Echo.say")
            .header("x-csrf-token", &token)
            .body(Body::from(r#"{"args":[1]}"#))
            .unwrap();
        let response: Response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    // without the header the same path is ordinary routing
    let request = Request::builder()
        .uri("/no/such/route")
        .body(Body::empty())
        .unwrap();
    let response: Response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutation_without_token_is_rejected() {
    let app = define_routes(server_state());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/articles")
        .body(Body::empty())
        .unwrap();
    let response: Response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cable_path_requires_websocket_upgrade() {
    let app = define_routes(server_state());
    let request = Request::builder().uri("/cable").body(Body::empty()).unwrap();
    let response: Response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let app = define_routes(server_state());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/articles")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-csrf-token")
        .body(Body::empty())
        .unwrap();
    let response: Response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}
