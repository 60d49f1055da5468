//! Request parameter parsing.
//!
//! Form keys in bracket notation collapse to the bracketed name:
//! `article[title]` becomes `title`, `a[b][c]` becomes `c` and `tags[]`
//! becomes `tags`. This is lossy; sibling keys that collapse to the same name
//! overwrite each other, last one wins.

use axum::http::Method;
use log::*;
use serde_json::{Map, Value};

pub type Params = Map<String, Value>;

/// Form field or query parameter that overrides the request method.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

pub fn parse_query(query: Option<&str>) -> Params {
    query
        .map(|q| parse_form(q.as_bytes()))
        .unwrap_or_default()
}

/// Parse a request body according to its content type.
///
/// JSON bodies that fail to parse, or that are not objects, yield no parameters.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Params {
    if body.is_empty() {
        return Params::new();
    }

    let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return parse_form(body);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!("Ignoring non-object JSON body: {other}");
            Params::new()
        }
        Err(e) => {
            debug!("Ignoring unparsable JSON body: {e}");
            Params::new()
        }
    }
}

pub fn parse_form(body: &[u8]) -> Params {
    url::form_urlencoded::parse(body)
        .map(|(key, value)| (collapse_key(&key), Value::String(value.into_owned())))
        .collect()
}

pub fn collapse_key(key: &str) -> String {
    let (Some(open), true) = (key.find('['), key.ends_with(']')) else {
        return key.to_string();
    };

    let inner = &key[open + 1..key.len() - 1];
    match inner.rsplit("][").next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => key[..open].to_string(),
    }
}

/// The method a POST asks to be treated as, via `_method` in the body or query.
///
/// Only POST can be overridden, and only to PATCH, PUT or DELETE.
pub fn method_override(method: &Method, query: &Params, body: &Params) -> Method {
    if *method != Method::POST {
        return method.clone();
    }

    let requested = body
        .get(METHOD_OVERRIDE_FIELD)
        .or_else(|| query.get(METHOD_OVERRIDE_FIELD))
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase);

    match requested.as_deref() {
        Some("PATCH") => Method::PATCH,
        Some("PUT") => Method::PUT,
        Some("DELETE") => Method::DELETE,
        Some(other) => {
            debug!("Ignoring unsupported method override {other:?}");
            method.clone()
        }
        None => method.clone(),
    }
}

/// Verbs that must carry a valid CSRF token.
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PATCH | Method::PUT | Method::DELETE
    )
}

/// Strip one trailing slash from every path except the root.
pub fn normalize_path(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ if path.is_empty() => "/".to_string(),
        _ => path.to_string(),
    }
}
