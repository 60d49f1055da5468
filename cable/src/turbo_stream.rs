//! Turbo Stream markup.

use std::fmt;

/// DOM operations a `<turbo-stream>` element can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAction {
    Append,
    Prepend,
    Replace,
    Update,
    Remove,
    Before,
    After,
}

impl StreamAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamAction::Append => "append",
            StreamAction::Prepend => "prepend",
            StreamAction::Replace => "replace",
            StreamAction::Update => "update",
            StreamAction::Remove => "remove",
            StreamAction::Before => "before",
            StreamAction::After => "after",
        }
    }
}

impl fmt::Display for StreamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render one `<turbo-stream>` element. `remove` carries no template.
pub fn render(action: StreamAction, target: &str, html: &str) -> String {
    let target = escape_attribute(target);
    match action {
        StreamAction::Remove => {
            format!(r#"<turbo-stream action="remove" target="{target}"></turbo-stream>"#)
        }
        _ => format!(
            r#"<turbo-stream action="{action}" target="{target}"><template>{html}</template></turbo-stream>"#
        ),
    }
}

/// Matches `csrf::escape_html`; `cable` does not depend on `csrf`.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_append() {
        assert_eq!(
            render(StreamAction::Append, "messages", "<p>hi</p>"),
            r#"<turbo-stream action="append" target="messages"><template><p>hi</p></template></turbo-stream>"#
        );
    }

    #[test]
    fn test_render_remove_has_no_template() {
        assert_eq!(
            render(StreamAction::Remove, "message_1", "<p>ignored</p>"),
            r#"<turbo-stream action="remove" target="message_1"></turbo-stream>"#
        );
    }

    #[test]
    fn test_target_is_escaped() {
        let rendered = render(StreamAction::Update, r#"a"b"#, "");
        assert!(rendered.contains(r#"target="a&quot;b""#));
    }
}
