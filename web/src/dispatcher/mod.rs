//! The ordinary request path: a request becomes exactly one response.
//!
//! Steps, strictly in order:
//!
//! 1. Normalize the path and read the body into parameters
//! 2. Resolve the effective method (`_method` overrides on POST)
//! 3. CSRF gate for POST/PATCH/PUT/DELETE: header `X-CSRF-Token`, else the
//!    `authenticity_token` field; failure is a 422 and nothing else runs
//! 4. Match a route; none is a 404, a redirect-only route skips the action
//! 5. Invoke the action; an error or panic is a 500
//! 6. Turn the [`ActionResult`] into a response, writing the flash cookie at most once

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{to_bytes, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use csrf::{CsrfProtection, AUTHENTICITY_TOKEN_FIELD, CSRF_HEADER};
use futures::FutureExt;
use log::*;
use serde_json::Value;

use crate::error::Error;

pub mod context;
pub mod flash;
pub mod params;
pub mod result;
pub mod route;


pub use context::{RequestContext, RequestInfo};
pub use flash::Flash;
pub use params::Params;
pub use result::{
    ActionResult, Content, ContentResolver, DefaultContentResolver, DefaultLayout, HandlerError,
    LayoutWrapper, Renderable,
};
pub use route::{Action, ActionIds, Route, RouteMatch, RouteSet, RouteTable};

/// Exact content type of Turbo Stream responses.
pub const TURBO_STREAM_CONTENT_TYPE: &str = "text/vnd.turbo-stream.html; charset=utf-8";

const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct Dispatcher {
    routes: Arc<dyn RouteTable>,
    csrf: Arc<CsrfProtection>,
    resolver: Arc<dyn ContentResolver>,
    layout: Arc<dyn LayoutWrapper>,
    default_redirect: String,
    expose_error_details: bool,
    max_body_bytes: usize,
}

pub struct DispatcherBuilder {
    dispatcher: Dispatcher,
}

impl DispatcherBuilder {
    pub fn resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.dispatcher.resolver = resolver;
        self
    }

    pub fn layout(mut self, layout: Arc<dyn LayoutWrapper>) -> Self {
        self.dispatcher.layout = layout;
        self
    }

    pub fn default_redirect(mut self, location: impl Into<String>) -> Self {
        self.dispatcher.default_redirect = location.into();
        self
    }

    /// Whether 500 bodies include the error detail. Turn off in production.
    pub fn expose_error_details(mut self, expose: bool) -> Self {
        self.dispatcher.expose_error_details = expose;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.dispatcher.max_body_bytes = limit;
        self
    }

    pub fn build(self) -> Dispatcher {
        self.dispatcher
    }
}

impl Dispatcher {
    pub fn builder(routes: Arc<dyn RouteTable>, csrf: Arc<CsrfProtection>) -> DispatcherBuilder {
        DispatcherBuilder {
            dispatcher: Dispatcher {
                routes,
                csrf,
                resolver: Arc::new(DefaultContentResolver),
                layout: Arc::new(DefaultLayout),
                default_redirect: "/".to_string(),
                expose_error_details: true,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
        }
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let path = params::normalize_path(parts.uri.path());

        let bytes = to_bytes(body, self.max_body_bytes)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to read request body for {path}: {e}");
                Bytes::new()
            });
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let mut query = params::parse_query(parts.uri.query());
        let mut body_params = params::parse_body(content_type, &bytes);
        let method = params::method_override(&parts.method, &query, &body_params);
        query.remove(params::METHOD_OVERRIDE_FIELD);
        body_params.remove(params::METHOD_OVERRIDE_FIELD);

        let body_token = match body_params.remove(AUTHENTICITY_TOKEN_FIELD) {
            Some(Value::String(token)) => Some(token),
            _ => None,
        };
        if params::is_mutating(&method) {
            let token = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .or(body_token);

            let valid = token.is_some_and(|t| self.csrf.validate_token(&t, ""));
            if !valid {
                warn!("Rejected {method} {path}: invalid authenticity token");
                return Error::invalid_authenticity_token().into_response();
            }
        }

        let Some(matched) = self.routes.match_route(&path, &method) else {
            debug!("No route matches {method} {path}");
            return Error::not_found().into_response();
        };

        let mut merged = query;
        merged.extend(body_params);
        for (name, value) in &matched.captured {
            merged.insert(name.clone(), Value::String(value.clone()));
        }

        let flash = Flash::from_cookie_header(
            parts
                .headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok()),
        );
        let info = RequestInfo::from_parts(&parts, method.clone(), path.clone());
        let mut ctx = RequestContext::new(info, flash, merged, self.csrf.generate_token(""));

        if let Some(target) = &matched.route.redirect_to {
            debug!("{method} {path} redirects to {target}");
            return self.render(ctx, ActionResult::redirect(target.clone())).await;
        }

        let (Some(action), Some(ids)) = (
            matched.route.action.clone(),
            ActionIds::for_route(&matched.route, &matched.captured),
        ) else {
            warn!("Route {} has no action or is missing its parent id", matched.route.pattern);
            return Error::not_found().into_response();
        };

        let action_params = ctx.params().clone();
        let outcome = AssertUnwindSafe(action.call(&mut ctx, ids, action_params))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Some(result))) => self.render(ctx, result).await,
            Ok(Ok(None)) if params::is_mutating(&method) => {
                let target = self.default_redirect.clone();
                self.render(ctx, ActionResult::redirect(target)).await
            }
            Ok(Ok(None)) => {
                self.render(ctx, ActionResult::html(String::new()))
                    .await
            }
            Ok(Err(e)) => {
                error!("Action for {method} {path} failed: {e:?}");
                self.handler_fault(e.detail())
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!("Action for {method} {path} panicked: {detail}");
                self.handler_fault(detail)
            }
        }
    }

    async fn render(&self, ctx: RequestContext, result: ActionResult) -> Response {
        match result {
            ActionResult::TurboStream { html } => {
                let response = (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, TURBO_STREAM_CONTENT_TYPE)],
                    html,
                )
                    .into_response();
                with_cookie(response, ctx.flash.clearing_cookie())
            }
            ActionResult::Redirect {
                target,
                notice,
                alert,
            } => {
                let mut flash = ctx.flash;
                if let Some(notice) = notice {
                    flash.set_notice(notice);
                }
                if let Some(alert) = alert {
                    flash.set_alert(alert);
                }
                let response = (StatusCode::FOUND, [(header::LOCATION, target)]).into_response();
                with_cookie(response, flash.response_cookie())
            }
            ActionResult::Render { html } => {
                let body = self.layout.wrap(&ctx, &html);
                let response = (StatusCode::UNPROCESSABLE_ENTITY, Html(body)).into_response();
                with_cookie(response, ctx.flash.response_cookie())
            }
            ActionResult::Content(content) => match self.resolver.resolve(content).await {
                Ok(html) => {
                    let body = self.layout.wrap(&ctx, &html);
                    let response = (StatusCode::OK, Html(body)).into_response();
                    with_cookie(response, ctx.flash.response_cookie())
                }
                Err(e) => {
                    error!("Failed to resolve content for {}: {e:?}", ctx.request.path);
                    self.handler_fault(e.detail())
                }
            },
        }
    }

    fn handler_fault(&self, detail: String) -> Response {
        Error::handler(self.expose_error_details.then_some(detail)).into_response()
    }
}

fn with_cookie(mut response: Response, cookie: Option<String>) -> Response {
    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Dropping unencodable flash cookie: {e}"),
        }
    }
    response
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with a non-string payload".to_string()
    }
}
