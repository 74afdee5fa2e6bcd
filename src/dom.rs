//! Text providers for DOM mode.
//!
//! DOM mode summarises text the caller already has on screen. The controller
//! only asks a [`TextProvider`] for the text of a container by class name.

use std::path::Path;

use scraper::{Html, Selector};

use crate::extractor::clean_text;

/// Elements that start a new line of text; inline markup runs on
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure", "footer", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

/// Supplies the visible text of a container identified by a class name.
pub trait TextProvider: Send + Sync {
    /// `None` when no container carries the class
    fn container_text(&self, class_name: &str) -> Option<String>;
}

/// Reads container text out of an HTML document.
pub struct HtmlDocumentProvider {
    html: String,
}

impl HtmlDocumentProvider {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }
}

impl TextProvider for HtmlDocumentProvider {
    fn container_text(&self, class_name: &str) -> Option<String> {
        let document = Html::parse_document(&self.html);

        // First element carrying the class, scripts and styles never count as text
        let any = Selector::parse("*").ok()?;
        let container = document
            .select(&any)
            .find(|element| element.value().classes().any(|class| class == class_name))?;

        let mut text = String::new();
        for node in container.descendants() {
            if let Some(element) = node.value().as_element() {
                if BLOCK_ELEMENTS.contains(&element.name()) {
                    text.push('\n');
                }
                continue;
            }
            let Some(fragment) = node.value().as_text() else {
                continue;
            };
            let inside_code = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
            });
            if !inside_code {
                text.push_str(fragment);
            }
        }

        Some(clean_text(&text))
    }
}

impl<F> TextProvider for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn container_text(&self, class_name: &str) -> Option<String> {
        self(class_name)
    }
}
