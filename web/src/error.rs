use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use csrf::escape_html;

pub type Result<T> = core::result::Result<T, Error>;

/// Fixed body of the response to a mutating request without a valid token.
pub const INVALID_AUTHENTICITY_TOKEN_BODY: &str = "Invalid authenticity token";

/// Fixed body of the response to a request no route matches.
pub const NOT_FOUND_BODY: &str = "Not Found";

/// Terminal failures of the ordinary (non-RPC) request path.
#[derive(Debug)]
pub struct Error {
    pub error_kind: ErrorKind,
    detail: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    NotFound,
    InvalidAuthenticityToken,
    Handler,
}

impl Error {
    pub fn not_found() -> Self {
        Self {
            error_kind: ErrorKind::NotFound,
            detail: None,
        }
    }

    pub fn invalid_authenticity_token() -> Self {
        Self {
            error_kind: ErrorKind::InvalidAuthenticityToken,
            detail: None,
        }
    }

    /// A handler fault. `detail` ends up in the response body when given.
    pub fn handler(detail: Option<String>) -> Self {
        Self {
            error_kind: ErrorKind::Handler,
            detail,
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match &self.detail {
            Some(detail) => write!(fmt, "{:?}: {detail}", self.error_kind),
            None => write!(fmt, "{:?}", self.error_kind),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
            ErrorKind::InvalidAuthenticityToken => (
                StatusCode::UNPROCESSABLE_ENTITY,
                INVALID_AUTHENTICITY_TOKEN_BODY,
            )
                .into_response(),
            ErrorKind::Handler => {
                let body = match self.detail {
                    Some(detail) => format!(
                        "<h1>Internal Server Error</h1>\n<pre>{}</pre>",
                        escape_html(&detail)
                    ),
                    None => "<h1>Internal Server Error</h1>".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
            }
        }
    }
}
