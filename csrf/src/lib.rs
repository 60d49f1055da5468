//! # csrf
//!
//! Anti-forgery protection for mutating requests.
//!
//! Tokens are self-contained: nothing is stored server-side. A token carries
//! its issue time, a random nonce and the session it was issued for, and is
//! signed with a key held by the running process. The same [`CsrfProtection`]
//! value therefore has to be shared by everything that issues or checks tokens.
//!
//! ```rust,ignore
//! use csrf::CsrfProtection;
//!
//! let csrf = CsrfProtection::new();
//! let token = csrf.generate_token("");
//! assert!(csrf.validate_token(&token, ""));
//! ```

pub mod error;
pub mod token;

pub use error::{Error, ErrorKind};
pub use token::CsrfProtection;

/// Name of the header a client may carry its token in.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Name of the form field a client may carry its token in.
pub const AUTHENTICITY_TOKEN_FIELD: &str = "authenticity_token";

/// Render the `<meta>` tag client-side scripts read the token from.
pub fn csrf_meta_tag(token: &str) -> String {
    format!(
        r#"<meta name="csrf-token" content="{}">"#,
        escape_html(token)
    )
}

/// Escape text for HTML element content or a quoted attribute value.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
