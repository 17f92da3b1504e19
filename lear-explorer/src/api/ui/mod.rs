//! UI routes - HTML pages for the explorer
//!
//! Pages are rendered from typed view models; every value taken from a book
//! goes through [`escape_html`] before it reaches the markup.
//!
//! - **Index** (`index`): cached book list plus a lookup form
//! - **Book Page** (`book_page`): book text with a live analysis panel

use axum::{routing::get, Router};

use crate::AppState;

mod book_page;
mod index;

pub use book_page::{book_page, BookPage};
pub use index::{index_page, IndexEntry, IndexPage};

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_page))
        .route("/books/:id", get(book_page))
}

/// Escape text for HTML element content and double-quoted attributes
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Shared page chrome
const PAGE_STYLE: &str = r#"
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 900px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
            color: #222;
        }
        h1 {
            border-bottom: 2px solid #6b3e26;
            padding-bottom: 10px;
        }
        a { color: #6b3e26; }
        table.meta th { text-align: left; padding-right: 16px; vertical-align: top; }
        pre.content {
            white-space: pre-wrap;
            background: #faf7f2;
            padding: 16px;
            max-height: 480px;
            overflow-y: auto;
        }
        #analysis {
            white-space: pre-wrap;
            border: 1px solid #ddd;
            padding: 16px;
            min-height: 80px;
        }
        .button {
            display: inline-block;
            padding: 8px 16px;
            background: #6b3e26;
            color: white;
            border: none;
            border-radius: 4px;
            cursor: pointer;
        }
"#;

fn render_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
{body}
    <p><small>lear-explorer v{version}</small></p>
</body>
</html>
"#,
        title = escape_html(title),
        style = PAGE_STYLE,
        body = body,
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("King Lear"), "King Lear");
    }

    #[test]
    fn test_render_page_escapes_title() {
        let html = render_page("<b>", "<p>body</p>");
        assert!(html.contains("<title>&lt;b&gt;</title>"));
        assert!(html.contains("<p>body</p>"));
    }
}
