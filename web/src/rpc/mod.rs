//! Header-routed calls to registered server functions.
//!
//! The endpoint is the router's fallback, so any path not claimed by another
//! route is accepted: a request carrying `X-RPC-Action` is an RPC call
//! whatever its path, and one without it goes on to the dispatcher. The body
//! is `{"args": [...]}` and the reply is `{"result": ...}` or
//! `{"error": {"message", "code"}}`:
//!
//! | Failure                             | Code            | Status |
//! |-------------------------------------|-----------------|--------|
//! | missing or invalid CSRF token       | `CSRF_INVALID`  | 422    |
//! | unknown action                      | `NOT_FOUND`     | 404    |
//! | handler error `RecordNotFound`      | `NOT_FOUND`     | 404    |
//! | body is not `{"args": [...]}`       | `PARSE_ERROR`   | 400    |
//! | any other handler error, or a panic | `HANDLER_ERROR` | 500    |
//!
//! A missing record is the one handler error that is not a 500; the model
//! actions report it as `"<Name> not found: <id>"`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use csrf::{CsrfProtection, AUTHENTICITY_TOKEN_FIELD, CSRF_HEADER};
use futures::FutureExt;
use log::*;
use serde::Serialize;
use serde_json::{json, Value};

use crate::dispatcher::panic_message;

pub mod error;
pub mod model;
pub mod registry;
pub mod value;

#[cfg(test)]
mod gateway_tests;

pub use error::{RpcError, RpcErrorKind};
pub use model::{Attributes, ModelStore};
pub use registry::{FnHandler, RpcHandler, RpcRegistry};
pub use value::{Record, RpcValue};

pub const RPC_ACTION_HEADER: &str = "x-rpc-action";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CsrfInvalid,
    NotFound,
    ParseError,
    HandlerError,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::CsrfInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ParseError => StatusCode::BAD_REQUEST,
            ErrorCode::HandlerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    let body = json!({ "error": { "message": message.into(), "code": code } });
    (code.status(), Json(body)).into_response()
}

/// Whether `headers` mark the request as an RPC call.
pub fn is_rpc_request(headers: &HeaderMap) -> bool {
    headers.contains_key(RPC_ACTION_HEADER)
}

pub struct RpcGateway {
    registry: Arc<RpcRegistry>,
    csrf: Arc<CsrfProtection>,
    csrf_required: bool,
    max_body_bytes: usize,
}

impl RpcGateway {
    pub fn new(registry: Arc<RpcRegistry>, csrf: Arc<CsrfProtection>) -> Self {
        Self {
            registry,
            csrf,
            csrf_required: true,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }

    pub fn csrf_required(mut self, required: bool) -> Self {
        self.csrf_required = required;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn registry(&self) -> &RpcRegistry {
        &self.registry
    }

    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let action = parts
            .headers
            .get(RPC_ACTION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_string();

        let body: Option<Value> = match to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) if bytes.is_empty() => Some(json!({})),
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(e) => {
                warn!("Failed to read RPC body for {action}: {e}");
                None
            }
        };

        if self.csrf_required {
            let token = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .or_else(|| {
                    body.as_ref()
                        .and_then(|b| b.get(AUTHENTICITY_TOKEN_FIELD))
                        .and_then(Value::as_str)
                });
            if !token.is_some_and(|t| self.csrf.validate_token(t, "")) {
                warn!("Rejected RPC {action}: invalid authenticity token");
                return error_response(ErrorCode::CsrfInvalid, "Invalid authenticity token");
            }
        }

        let Some(handler) = self.registry.get(&action) else {
            debug!("Unknown RPC action {action:?}");
            return error_response(ErrorCode::NotFound, format!("Unknown action: {action}"));
        };

        let Some(args) = body.as_ref().and_then(arguments) else {
            return error_response(ErrorCode::ParseError, "Request body must be {\"args\": [...]}");
        };

        match AssertUnwindSafe(handler.call(args)).catch_unwind().await {
            Ok(Ok(value)) => Json(json!({ "result": value.into_json() })).into_response(),
            Ok(Err(e)) => match e.kind {
                RpcErrorKind::RecordNotFound => {
                    debug!("RPC {action}: {e}");
                    error_response(ErrorCode::NotFound, e.message)
                }
                RpcErrorKind::Handler => {
                    error!("RPC {action} failed: {e}");
                    error_response(ErrorCode::HandlerError, e.message)
                }
            },
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!("RPC {action} panicked: {detail}");
                error_response(ErrorCode::HandlerError, detail)
            }
        }
    }
}

/// Positional arguments from an `{"args": [...]}` body; a missing `args` is none.
fn arguments(body: &Value) -> Option<Vec<Value>> {
    match body.as_object()?.get("args") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(args)) => Some(args.clone()),
        Some(_) => None,
    }
}
