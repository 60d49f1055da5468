use std::collections::HashMap;

use axum::http::{header, request::Parts, Method};

use super::flash::Flash;
use super::params::Params;

/// Request headers copied into [`RequestInfo`], lowercased.
const FORWARDED_HEADERS: &[&str] = &[
    "accept",
    "content-type",
    "cookie",
    "host",
    "referer",
    "turbo-frame",
    "user-agent",
    "x-requested-with",
];

/// What an action may know about the request it serves.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// The effective method, after `_method` overrides.
    pub method: Method,
    /// The normalized path.
    pub path: String,
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl RequestInfo {
    pub(crate) fn from_parts(parts: &Parts, method: Method, path: String) -> Self {
        let headers = FORWARDED_HEADERS
            .iter()
            .filter_map(|name| {
                parts
                    .headers
                    .get(*name)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str());

        Self {
            method,
            path,
            url: format!("{scheme}://{host}{path_and_query}"),
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Per-request state handed to an action and then to the layout.
///
/// Created fresh for every dispatch and dropped with the response.
pub struct RequestContext {
    content_for: HashMap<String, String>,
    pub flash: Flash,
    params: Params,
    pub request: RequestInfo,
    /// Token for forms and meta tags rendered by this response; not the one
    /// this request was validated with.
    pub csrf_token: String,
}

impl RequestContext {
    pub fn new(request: RequestInfo, flash: Flash, params: Params, csrf_token: String) -> Self {
        Self {
            content_for: HashMap::new(),
            flash,
            params,
            request,
            csrf_token,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Append `html` to a named layout slot.
    pub fn content_for(&mut self, slot: &str, html: &str) {
        self.content_for
            .entry(slot.to_string())
            .or_default()
            .push_str(html);
    }

    /// The content collected for a slot.
    pub fn content(&self, slot: &str) -> Option<&str> {
        self.content_for.get(slot).map(String::as_str)
    }

    pub fn csrf_meta_tag(&self) -> String {
        csrf::csrf_meta_tag(&self.csrf_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_request_info_builds_url_and_header_subset() {
        let parts = parts_for(
            Request::builder()
                .uri("/articles?page=2")
                .header("Host", "example.test")
                .header("Accept", "text/html")
                .header("Authorization", "secret")
                .body(())
                .unwrap(),
        );
        let info = RequestInfo::from_parts(&parts, Method::GET, "/articles".to_string());

        assert_eq!(info.url, "http://example.test/articles?page=2");
        assert_eq!(info.header("Accept"), Some("text/html"));
        assert_eq!(info.header("authorization"), None);
    }

    #[test]
    fn test_content_for_appends() {
        let info = RequestInfo::from_parts(
            &parts_for(Request::builder().uri("/").body(()).unwrap()),
            Method::GET,
            "/".to_string(),
        );
        let mut ctx = RequestContext::new(info, Flash::default(), Params::new(), "t".into());
        ctx.content_for("head", "<link a>");
        ctx.content_for("head", "<link b>");
        assert_eq!(ctx.content("head"), Some("<link a><link b>"));
        assert_eq!(ctx.content("title"), None);
        assert_eq!(ctx.csrf_meta_tag(), r#"<meta name="csrf-token" content="t">"#);
    }
}
