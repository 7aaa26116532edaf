use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// Elements whose text never belongs in the flattened view.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Elements that start a new line in the flattened view.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "th",
    "thead", "tr", "ul", "button", "label", "option",
];

/// One fetched page. The HTML is kept as a string so the value stays `Send`;
/// callers parse a DOM with [`RenderedContent::document`] when they need one.
#[derive(Debug, Clone)]
pub struct RenderedContent {
    /// The URL the content was fetched from.
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

impl RenderedContent {
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Visible text of the page, one trimmed non-empty line per block.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        flatten_lines(&self.document())
    }
}

/// Flattens a parsed document into visible text lines, breaking at block
/// elements and `<br>`, dropping scripts and styles.
#[must_use]
pub fn flatten_lines(document: &Html) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    let root = match Selector::parse("body") {
        Ok(body) => document.select(&body).next(),
        Err(_) => None,
    }
    .unwrap_or_else(|| document.root_element());

    walk(root, &mut lines, &mut current);
    flush(&mut lines, &mut current);
    lines
}

fn walk(element: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            for word in text.split_whitespace() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            if name == "br" {
                flush(lines, current);
                continue;
            }
            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                flush(lines, current);
            }
            walk(child_element, lines, current);
            if is_block {
                flush(lines, current);
            }
        }
    }
}

fn flush(lines: &mut Vec<String>, current: &mut String) {
    let line = current.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    current.clear();
}
