//! What actions hand back, and how it becomes HTML.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;

use super::context::RequestContext;

/// The outcome of an action. Exactly one shape, never a mix.
pub enum ActionResult {
    /// 302 to `target`, merging `notice`/`alert` into the flash first.
    Redirect {
        target: String,
        notice: Option<String>,
        alert: Option<String>,
    },
    /// 200 with the Turbo Stream content type.
    TurboStream { html: String },
    /// 422 re-render, e.g. a form that failed validation.
    Render { html: String },
    /// 200 with layout-wrapped content.
    Content(Content),
}

impl ActionResult {
    pub fn redirect(target: impl Into<String>) -> Self {
        ActionResult::Redirect {
            target: target.into(),
            notice: None,
            alert: None,
        }
    }

    pub fn redirect_with_notice(target: impl Into<String>, notice: impl Into<String>) -> Self {
        ActionResult::Redirect {
            target: target.into(),
            notice: Some(notice.into()),
            alert: None,
        }
    }

    pub fn redirect_with_alert(target: impl Into<String>, alert: impl Into<String>) -> Self {
        ActionResult::Redirect {
            target: target.into(),
            notice: None,
            alert: Some(alert.into()),
        }
    }

    pub fn turbo_stream(html: impl Into<String>) -> Self {
        ActionResult::TurboStream { html: html.into() }
    }

    pub fn render(html: impl Into<String>) -> Self {
        ActionResult::Render { html: html.into() }
    }

    pub fn html(html: impl Into<String>) -> Self {
        ActionResult::Content(Content::Html(html.into()))
    }

    pub fn element(element: impl Renderable + 'static) -> Self {
        ActionResult::Content(Content::Element(Box::new(element)))
    }
}

/// Content for a read-only action.
pub enum Content {
    Html(String),
    Element(Box<dyn Renderable>),
}

/// A view value that is not yet HTML.
pub trait Renderable: Send + Sync {
    fn render(&self) -> Result<String, HandlerError>;
}

/// Turns [`Content`] into HTML.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, content: Content) -> Result<String, HandlerError>;
}

pub struct DefaultContentResolver;

#[async_trait]
impl ContentResolver for DefaultContentResolver {
    async fn resolve(&self, content: Content) -> Result<String, HandlerError> {
        match content {
            Content::Html(html) => Ok(html),
            Content::Element(element) => element.render(),
        }
    }
}

/// Wraps rendered HTML in the application layout.
pub trait LayoutWrapper: Send + Sync {
    fn wrap(&self, ctx: &RequestContext, html: &str) -> String;
}

/// A bare HTML5 document with the `title` and `head` slots and the CSRF meta tag.
pub struct DefaultLayout;

impl LayoutWrapper for DefaultLayout {
    fn wrap(&self, ctx: &RequestContext, html: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}\n{}</head>\n<body>\n{html}\n</body>\n</html>\n",
            ctx.content("title").unwrap_or_default(),
            ctx.csrf_meta_tag(),
            ctx.content("head").unwrap_or_default(),
        )
    }
}

/// A failure inside an action or view.
///
/// Any `std::error::Error` converts into one with `?`.
pub struct HandlerError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message followed by the chain of underlying causes, one per line.
    pub fn detail(&self) -> String {
        let mut detail = self.message.clone();
        let mut cause = self
            .source
            .as_deref()
            .and_then(|source| source.source());
        while let Some(err) = cause {
            detail.push_str(&format!("\ncaused by: {err}"));
            cause = err.source();
        }
        detail
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk on fire")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("could not load article")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    struct Greeting;

    impl Renderable for Greeting {
        fn render(&self) -> Result<String, HandlerError> {
            Ok("<p>hello</p>".to_string())
        }
    }

    #[test]
    fn test_detail_includes_cause_chain() {
        let err = HandlerError::from(Outer(Inner));
        assert_eq!(err.message(), "could not load article");
        assert_eq!(err.detail(), "could not load article\ncaused by: disk on fire");
    }

    #[tokio::test]
    async fn test_default_resolver() {
        let resolver = DefaultContentResolver;
        assert_eq!(
            resolver.resolve(Content::Html("x".into())).await.unwrap(),
            "x"
        );
        assert_eq!(
            resolver
                .resolve(Content::Element(Box::new(Greeting)))
                .await
                .unwrap(),
            "<p>hello</p>"
        );
    }
}
