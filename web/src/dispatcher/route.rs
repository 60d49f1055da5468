use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use super::context::RequestContext;
use super::params::Params;
use super::result::{ActionResult, HandlerError};

/// A controller action.
///
/// Read-only actions usually return [`ActionResult::Content`]; mutating ones a
/// redirect, render or turbo stream. `Ok(None)` from a mutating action
/// redirects to the dispatcher's default location.
#[async_trait]
pub trait Action: Send + Sync {
    async fn call(
        &self,
        ctx: &mut RequestContext,
        ids: ActionIds,
        params: Params,
    ) -> Result<Option<ActionResult>, HandlerError>;
}

/// Record ids captured from the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionIds {
    Flat { id: Option<String> },
    Nested { parent_id: String, id: Option<String> },
}

impl ActionIds {
    /// Ids for `route` from its captured path parameters. A nested route
    /// reads `<parent_name>_id`; `None` when that capture is missing.
    pub fn for_route(route: &Route, captured: &HashMap<String, String>) -> Option<Self> {
        let id = captured.get("id").cloned();
        match (route.nested, &route.parent_name) {
            (true, Some(parent)) => captured
                .get(&format!("{parent}_id"))
                .map(|parent_id| ActionIds::Nested {
                    parent_id: parent_id.clone(),
                    id,
                }),
            (true, None) => None,
            (false, _) => Some(ActionIds::Flat { id }),
        }
    }
}

/// An entry in the route table. Immutable once registered.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: String,
    pub action: Option<Arc<dyn Action>>,
    pub nested: bool,
    pub parent_name: Option<String>,
    pub redirect_to: Option<String>,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>, action: impl Action + 'static) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            action: Some(Arc::new(action)),
            nested: false,
            parent_name: None,
            redirect_to: None,
        }
    }

    /// A route that only redirects.
    pub fn redirect(method: Method, pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            action: None,
            nested: false,
            parent_name: None,
            redirect_to: Some(target.into()),
        }
    }

    /// Mark the route as nested under `parent_name` (e.g. `article` for
    /// `/articles/:article_id/comments`).
    pub fn nested_under(mut self, parent_name: impl Into<String>) -> Self {
        self.nested = true;
        self.parent_name = Some(parent_name.into());
        self
    }
}

pub struct RouteMatch {
    pub route: Arc<Route>,
    pub captured: HashMap<String, String>,
}

/// Route lookup; path-pattern matching lives behind this seam.
pub trait RouteTable: Send + Sync {
    fn match_route(&self, path: &str, method: &Method) -> Option<RouteMatch>;
}

/// Routes matched in registration order, segment by segment, with `:name`
/// segments capturing one percent-decoded path segment.
#[derive(Clone, Default)]
pub struct RouteSet {
    routes: Vec<Arc<Route>>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteTable for RouteSet {
    fn match_route(&self, path: &str, method: &Method) -> Option<RouteMatch> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                capture(&route.pattern, &segments).map(|captured| RouteMatch {
                    route: Arc::clone(route),
                    captured,
                })
            })
    }
}

fn capture(pattern: &str, segments: &[&str]) -> Option<HashMap<String, String>> {
    let expected: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    if expected.len() != segments.len() {
        return None;
    }

    let mut captured = HashMap::new();
    for (want, got) in expected.iter().zip(segments) {
        match want.strip_prefix(':') {
            Some(name) => {
                let value = urlencoding::decode(got).ok()?.into_owned();
                captured.insert(name.to_string(), value);
            }
            None if want == got => {}
            None => return None,
        }
    }
    Some(captured)
}
