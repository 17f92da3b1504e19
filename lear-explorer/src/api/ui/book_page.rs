//! Book page - text, catalog details and live analysis
//!
//! The analysis panel subscribes to `/books/:id/analyze` with `EventSource`,
//! appends every `CustomEvent` payload and stops on `Close`.

use axum::{
    extract::{Path, State},
    response::Html,
};

use super::{escape_html, render_page};
use crate::api::parse_external_id;
use crate::error::ApiResult;
use crate::models::Book;
use crate::AppState;

/// Book page view model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookPage {
    pub external_id: i64,
    pub title: String,
    /// (label, value) rows for non-empty metadata fields
    pub details: Vec<(&'static str, String)>,
    pub content: String,
}

impl From<Book> for BookPage {
    fn from(book: Book) -> Self {
        let title = book.metadata.display_title(book.external_id);
        let metadata = book.metadata;
        let details = [
            ("Author", metadata.author),
            ("Language", metadata.language),
            ("Subject", metadata.subject),
            ("Category", metadata.category),
            ("Credits", metadata.credits),
            ("Summary", metadata.summary),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();

        Self {
            external_id: book.external_id,
            title,
            details,
            content: book.content,
        }
    }
}

impl BookPage {
    pub fn render(&self) -> String {
        let rows: String = self
            .details
            .iter()
            .map(|(label, value)| {
                format!(
                    "        <tr><th>{}</th><td>{}</td></tr>\n",
                    label,
                    escape_html(value)
                )
            })
            .collect();

        let body = format!(
            r#"    <p><a href="/">&larr; All books</a></p>
    <h1>{title}</h1>
    <table class="meta">
{rows}    </table>

    <h2>Analysis</h2>
    <button class="button" id="analyze">Analyze</button>
    <div id="analysis"></div>

    <h2>Text</h2>
    <pre class="content">{content}</pre>

    <script>
        const button = document.getElementById('analyze');
        const output = document.getElementById('analysis');
        button.addEventListener('click', () => {{
            button.disabled = true;
            output.textContent = '';
            const source = new EventSource('/books/{id}/analyze');
            source.addEventListener('CustomEvent', (event) => {{
                output.textContent += JSON.parse(event.data).analysis;
            }});
            source.addEventListener('Close', () => {{
                source.close();
                button.disabled = false;
            }});
            source.onerror = () => {{
                source.close();
                button.disabled = false;
            }};
        }});
    </script>
"#,
            title = escape_html(&self.title),
            rows = rows,
            content = escape_html(&self.content),
            id = self.external_id,
        );

        render_page(&self.title, &body)
    }
}

/// GET /books/:id
pub async fn book_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let external_id = parse_external_id(&id)?;
    let book = state.acquisition.fetch_book(external_id).await?;
    Ok(Html(BookPage::from(book).render()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use chrono::Utc;

    fn book() -> Book {
        Book {
            id: 1,
            external_id: 1532,
            content: "Nothing will come of nothing & <more>".to_string(),
            metadata: Metadata {
                title: "King Lear".to_string(),
                author: "Shakespeare, William".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_metadata_fields_are_skipped() {
        let page = BookPage::from(book());
        assert_eq!(
            page.details,
            vec![("Author", "Shakespeare, William".to_string())]
        );
    }

    #[test]
    fn test_render_escapes_content_and_wires_event_source() {
        let html = BookPage::from(book()).render();

        assert!(html.contains("<h1>King Lear</h1>"));
        assert!(html.contains("Nothing will come of nothing &amp; &lt;more&gt;"));
        assert!(html.contains("new EventSource('/books/1532/analyze')"));
        assert!(html.contains("addEventListener('CustomEvent'"));
        assert!(html.contains("addEventListener('Close'"));
    }
}
