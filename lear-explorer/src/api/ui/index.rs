//! Index page - cached books and lookup form

use axum::{
    extract::State,
    response::Html,
};

use super::{escape_html, render_page};
use crate::error::ApiResult;
use crate::models::Book;
use crate::AppState;

/// One row of the book list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub external_id: i64,
    pub title: String,
    pub author: String,
}

impl From<&Book> for IndexEntry {
    fn from(book: &Book) -> Self {
        Self {
            external_id: book.external_id,
            title: book.metadata.display_title(book.external_id),
            author: book.metadata.author.clone(),
        }
    }
}

/// Index page view model
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub books: Vec<IndexEntry>,
}

impl IndexPage {
    pub fn render(&self) -> String {
        let list = if self.books.is_empty() {
            "    <p>No books cached yet.</p>\n".to_string()
        } else {
            let items: String = self
                .books
                .iter()
                .map(|entry| {
                    let author = if entry.author.is_empty() {
                        String::new()
                    } else {
                        format!(" by {}", escape_html(&entry.author))
                    };
                    format!(
                        "        <li><a href=\"/books/{}\">{}</a>{}</li>\n",
                        entry.external_id,
                        escape_html(&entry.title),
                        author
                    )
                })
                .collect();
            format!("    <ul>\n{}    </ul>\n", items)
        };

        let body = format!(
            r#"    <h1>Lear Explorer</h1>
    <p>Look up any public-domain book by its Project Gutenberg number.</p>
    <form onsubmit="window.location = '/books/' + encodeURIComponent(this.book.value); return false;">
        <input name="book" type="number" min="1" placeholder="e.g. 1532" required>
        <button class="button" type="submit">Open</button>
    </form>
    <h2>Cached books</h2>
{list}"#,
            list = list
        );

        render_page("Lear Explorer", &body)
    }
}

/// GET /
pub async fn index_page(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let books = state.acquisition.fetch_all_books().await?;
    let page = IndexPage {
        books: books.iter().map(IndexEntry::from).collect(),
    };
    Ok(Html(page.render()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let html = IndexPage::default().render();
        assert!(html.contains("No books cached yet."));
    }

    #[test]
    fn test_index_lists_escaped_entries() {
        let page = IndexPage {
            books: vec![IndexEntry {
                external_id: 1532,
                title: "King <Lear>".to_string(),
                author: "Shakespeare".to_string(),
            }],
        };
        let html = page.render();

        assert!(html.contains(r#"<a href="/books/1532">King &lt;Lear&gt;</a> by Shakespeare"#));
    }
}
