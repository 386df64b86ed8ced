use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

pub const UNTITLED_CHAPTER: &str = "Untitled Chapter";

/// Heading tags searched for a chapter title, highest priority first.
const TITLE_TAGS: [&str; 3] = ["h1", "h2", "h3"];

/// One titled unit of document content. `content` is an HTML fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

/// Parse one XHTML content document into a chapter.
///
/// The title is the text of the first `h1` anywhere in the document, else the
/// first `h2`, else the first `h3`; headings with no visible text are ignored.
/// The content is the inner HTML of `<body>`, or the whole document when no
/// body element exists.
#[must_use]
pub fn parse_chapter_html(html: &str) -> Chapter {
    let document = Html::parse_document(html);

    let title = find_title(&document).unwrap_or_else(|| UNTITLED_CHAPTER.to_owned());

    let content = match Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
    {
        Some(body) => body.inner_html(),
        None => document.root_element().html(),
    };

    Chapter { title, content }
}

fn find_title(document: &Html) -> Option<String> {
    for tag in TITLE_TAGS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        if let Some(text) = document.select(&selector).find_map(heading_text) {
            return Some(text);
        }
    }
    None
}

/// Heading text on one line: whitespace runs collapse to a single space.
fn heading_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() { None } else { Some(text) }
}
