//! Content extraction from web pages.
//!
//! Pages are fetched through a CORS proxy that wraps the raw HTML in JSON, then
//! parsed with scraper. Several pages are merged into one document whose
//! `Source: title (url)` headers keep track of where each part came from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::ExtractorConfig;
use crate::validator::UrlInput;

/// User-Agent string identifying this extractor
const USER_AGENT: &str = concat!("summa-button/", env!("CARGO_PKG_VERSION"));

/// Separator placed between sources in an aggregated document
pub const SOURCE_DELIMITER: &str = "\n\n---\n\n";

/// Minimum length for a content candidate to win over the next selector
const MIN_CANDIDATE_CHARS: usize = 200;

/// Minimum length of the cleaned text of a page
const MIN_CONTENT_CHARS: usize = 50;

/// Removed from the document before any text is read
const UNWANTED_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    "aside",
    "iframe",
    "noscript",
    "svg",
    ".advertisement",
    ".ad",
    ".ads",
    ".sidebar",
    ".popup",
    ".modal",
    ".cookie-banner",
    ".newsletter",
    ".social-share",
];

const TITLE_SELECTORS: &[&str] = &["title", "h1", ".title", "[class*=\"title\"]"];

/// Likely main-content containers, most specific first
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".article-body",
    ".post-content",
    ".entry-content",
    ".content",
    ".post",
    ".article",
    "#content",
];

const TEXT_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li, td, th, blockquote";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{0}")]
    FetchError(#[from] reqwest::Error),
    #[error("HTTP {status}: {reason}")]
    HttpStatus { status: u16, reason: String },
    #[error("invalid proxy URL: {0}")]
    InvalidProxyUrl(#[from] url::ParseError),
    #[error("invalid proxy response: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("No content received from URL")]
    EmptyPayload,
    #[error("Insufficient content extracted from URL")]
    InsufficientContent,
    #[error("Failed to extract content from {url}: {source}")]
    Failed {
        url: String,
        #[source]
        source: Box<ExtractError>,
    },
    #[error("No content could be extracted from any of the provided URLs")]
    NoContent,
}

/// Outcome of extracting a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub url: String,
    pub title: String,
    /// Cleaned text, empty when extraction failed
    pub content: String,
    pub word_count: usize,
    pub error: Option<String>,
}

impl ExtractionResult {
    fn failed(url: &str, error: &ExtractError) -> Self {
        Self {
            url: url.to_string(),
            title: "Failed to extract".to_string(),
            content: String::new(),
            word_count: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Somewhere raw HTML for a URL can be obtained from.
#[async_trait]
pub trait HtmlSource: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String, ExtractError>;
}

#[derive(Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    contents: Option<String>,
}

/// Fetches pages through an allorigins-style proxy: `GET <proxy>?url=<target>`
/// answered with `{"contents": "<html>"}`.
pub struct ProxyClient {
    client: Client,
    proxy_url: String,
}

impl ProxyClient {
    pub fn new(proxy_url: impl Into<String>, timeout: Duration) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            proxy_url: proxy_url.into(),
        })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ExtractError> {
        Self::new(&config.proxy_url, Duration::from_secs(config.timeout_secs))
    }

    /// Proxy request URL for a target, with the target percent-encoded
    fn request_url(&self, target: &str) -> Result<Url, ExtractError> {
        Ok(Url::parse_with_params(&self.proxy_url, &[("url", target)])?)
    }
}

#[async_trait]
impl HtmlSource for ProxyClient {
    async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
        let request_url = self.request_url(url)?;
        tracing::debug!(%request_url, "fetching through proxy");

        let response = self
            .client
            .get(request_url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        proxy_contents(status, &body)
    }
}

/// Map a proxy reply to the page HTML it wraps
fn proxy_contents(status: StatusCode, body: &str) -> Result<String, ExtractError> {
    if !status.is_success() {
        return Err(ExtractError::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    let reply: ProxyResponse = serde_json::from_str(body)?;
    match reply.contents {
        Some(html) if !html.is_empty() => Ok(html),
        _ => Err(ExtractError::EmptyPayload),
    }
}

/// Turns URLs into text, one page or a whole batch at a time.
#[derive(Clone)]
pub struct ContentExtractor {
    source: Arc<dyn HtmlSource>,
    concurrency: usize,
}

impl ContentExtractor {
    pub fn new(source: Arc<dyn HtmlSource>) -> Self {
        Self {
            source,
            concurrency: 1,
        }
    }

    /// Allow up to `limit` pages in flight. Output order never changes.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Fetch and extract a single URL
    pub async fn extract_from_url(&self, url: &str) -> Result<ExtractionResult, ExtractError> {
        let extracted = async {
            let html = self.source.fetch_html(url).await?;
            parse_page(&html)
        }
        .await;

        match extracted {
            Ok((title, content)) => Ok(ExtractionResult {
                url: url.to_string(),
                title,
                word_count: word_count(&content),
                content,
                error: None,
            }),
            Err(e) => Err(ExtractError::Failed {
                url: url.to_string(),
                source: Box::new(e),
            }),
        }
    }

    /// Extract every URL, keeping failures as placeholder results.
    ///
    /// `on_progress` receives `round(i / n * 100)` before URL `i` is fetched and
    /// 100 once all of them are done.
    pub async fn extract_all<P>(&self, urls: &UrlInput, mut on_progress: P) -> Vec<ExtractionResult>
    where
        P: FnMut(u8) + Send,
    {
        let total = urls.len();

        let results = stream::iter(urls.as_slice().iter().enumerate())
            .map(|(i, url)| {
                on_progress(percent(i, total));
                async move {
                    match self.extract_from_url(url).await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!(%url, error = %e, "skipping source");
                            ExtractionResult::failed(url, &e)
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        on_progress(100);
        results
    }

    /// Extract every URL and merge the successful ones into one document.
    pub async fn extract_from_urls<P>(&self, urls: &UrlInput, on_progress: P) -> Result<String, ExtractError>
    where
        P: FnMut(u8) + Send,
    {
        let results = self.extract_all(urls, on_progress).await;
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(succeeded, total = results.len(), "extraction finished");

        let document = aggregate(&results);
        if document.is_empty() {
            return Err(ExtractError::NoContent);
        }
        Ok(document)
    }
}

fn percent(index: usize, total: usize) -> u8 {
    ((index as f64 / total as f64) * 100.0).round() as u8
}

/// Join the successful results, each under a `Source: title (url)` header.
pub fn aggregate(results: &[ExtractionResult]) -> String {
    results
        .iter()
        .filter(|result| result.is_success())
        .map(|result| {
            let header = format!("Source: {} ({})", result.title, result.url);
            let rule = "=".repeat(header.chars().count());
            format!("{header}\n{rule}\n\n{}", result.content)
        })
        .collect::<Vec<_>>()
        .join(SOURCE_DELIMITER)
}

/// Parse a page into its title and cleaned main text
pub fn parse_page(html: &str) -> Result<(String, String), ExtractError> {
    let mut document = Html::parse_document(html);
    remove_unwanted(&mut document);

    let title = extract_title(&document);
    let content = clean_text(&extract_main_text(&document));

    if content.chars().count() < MIN_CONTENT_CHARS {
        return Err(ExtractError::InsufficientContent);
    }

    Ok((title, content))
}

/// Detach boilerplate nodes from the tree
fn remove_unwanted(document: &mut Html) {
    for selector_str in UNWANTED_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

/// Text of the first title candidate present, "Untitled" otherwise.
///
/// Whitespace is collapsed to single spaces so the title fits on the one
/// line of its `Source:` header.
fn extract_title(document: &Html) -> String {
    TITLE_SELECTORS
        .iter()
        .filter_map(|selector_str| Selector::parse(selector_str).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| {
                    let text = element.text().collect::<String>();
                    text.split_whitespace().collect::<Vec<_>>().join(" ")
                })
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

fn extract_main_text(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect();
            if text.trim().chars().count() > MIN_CANDIDATE_CHARS {
                return extract_text_from_element(element);
            }
        }
    }

    // Fall back to the body, or the whole document if there is none
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());
    extract_text_from_element(body)
}

/// Text of the text-bearing descendants, or all text if there are none
fn extract_text_from_element(element: ElementRef<'_>) -> String {
    let Ok(selector) = Selector::parse(TEXT_SELECTOR) else {
        return element.text().collect();
    };

    let blocks: Vec<ElementRef<'_>> = element.select(&selector).collect();
    if blocks.is_empty() {
        return element.text().collect();
    }

    blocks
        .into_iter()
        .map(|block| block.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Collapse horizontal whitespace, trim lines and drop blank ones.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            let collapsed = line.split([' ', '\t']).filter(|s| !s.is_empty()).collect::<Vec<_>>();
            collapsed.join(" ").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PROSE: &str = "Rust gives you memory safety without a garbage collector. \
        Ownership rules are checked at compile time, so whole classes of bugs never reach production. \
        The borrow checker can feel strict at first, but it pays off in large codebases.";

    struct FakeSource {
        pages: HashMap<String, String>,
    }

    impl FakeSource {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages.iter().map(|(u, h)| (u.to_string(), h.to_string())).collect(),
            }
        }
    }

    #[async_trait]
    impl HtmlSource for FakeSource {
        async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
            self.pages.get(url).cloned().ok_or(ExtractError::HttpStatus {
                status: 404,
                reason: "Not Found".to_string(),
            })
        }
    }

    fn page(title: &str, body: &str) -> String {
        format!("<html><head><title>{title}</title></head><body><article><p>{body}</p></article></body></html>")
    }

    #[test]
    fn test_parse_page_strips_boilerplate() {
        let html = format!(
            "<html><head><title>Guide</title><script>var tracking = 1;</script></head><body>\
             <nav><li>Home</li><li>About</li></nav>\
             <div class=\"cookie-banner\"><p>We use cookies to improve things for everyone here.</p></div>\
             <article><h2>Intro</h2><p>{PROSE}</p></article>\
             <footer><p>Copyright notice that should never be read</p></footer></body></html>"
        );

        let (title, content) = parse_page(&html).unwrap();
        assert_eq!(title, "Guide");
        assert!(content.starts_with("Intro\n"));
        assert!(content.contains("memory safety"));
        assert!(!content.contains("cookies"));
        assert!(!content.contains("Copyright"));
        assert!(!content.contains("Home"));
    }

    #[test]
    fn test_title_fallbacks() {
        let html = format!("<html><body><h1>Heading Title</h1><p>{PROSE}</p></body></html>");
        assert_eq!(parse_page(&html).unwrap().0, "Heading Title");

        let html = format!("<html><body><div class=\"post-title-main\">Classy</div><p>{PROSE}</p></body></html>");
        assert_eq!(parse_page(&html).unwrap().0, "Classy");

        let html = format!("<html><body><p>{PROSE}</p></body></html>");
        assert_eq!(parse_page(&html).unwrap().0, "Untitled");
    }

    #[test]
    fn test_short_candidate_falls_through_to_body() {
        let html = format!(
            "<html><body><main><p>Too short to count.</p></main><section><p>{PROSE}</p></section></body></html>"
        );
        let (_, content) = parse_page(&html).unwrap();
        assert!(content.contains("Too short to count."));
        assert!(content.contains("memory safety"));
    }

    #[test]
    fn test_raw_text_when_no_text_tags() {
        let html = format!("<html><body><div>{PROSE}</div></body></html>");
        let (_, content) = parse_page(&html).unwrap();
        assert!(content.contains("borrow checker"));
    }

    #[test]
    fn test_insufficient_content() {
        let html = "<html><body><p>Hello there.</p></body></html>";
        assert!(matches!(parse_page(html), Err(ExtractError::InsufficientContent)));
    }

    #[test]
    fn test_clean_text() {
        let raw = "  first \t  line  \n\n\n\n   \nsecond\tline\n";
        assert_eq!(clean_text(raw), "first line\nsecond line");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  one two\n\nthree\t"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_proxy_request_url_encodes_target() {
        let client = ProxyClient::new("https://api.allorigins.win/get", Duration::from_secs(5)).unwrap();
        let url = client.request_url("https://example.com/a b?x=1&y=2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.allorigins.win/get?url=https%3A%2F%2Fexample.com%2Fa+b%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_multiline_title_survives_source_round_trip() {
        let html = format!("<html><head><title>\n  My Blog\n  |\tPost\n</title></head><body><article><p>{PROSE}</p></article></body></html>");
        let (title, content) = parse_page(&html).unwrap();
        assert_eq!(title, "My Blog | Post");

        let document = aggregate(&[ExtractionResult {
            url: "https://blog.dev/post".to_string(),
            title,
            word_count: word_count(&content),
            content,
            error: None,
        }]);
        let sources = crate::generator::extract_source_info(&document);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "My Blog | Post");
        assert_eq!(sources[0].url, "https://blog.dev/post");
    }

    #[test]
    fn test_proxy_reply_unwraps_contents() {
        let body = r#"{"contents":"<html><body>hi</body></html>","status":{"http_code":200}}"#;
        assert_eq!(
            proxy_contents(StatusCode::OK, body).unwrap(),
            "<html><body>hi</body></html>"
        );
    }

    #[test]
    fn test_proxy_error_status() {
        let err = proxy_contents(StatusCode::BAD_GATEWAY, r#"{"contents":"ignored"}"#).unwrap_err();
        assert!(matches!(err, ExtractError::HttpStatus { status: 502, .. }));
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_proxy_reply_without_contents() {
        for body in [r#"{}"#, r#"{"contents":null}"#, r#"{"contents":""}"#] {
            let err = proxy_contents(StatusCode::OK, body).unwrap_err();
            assert!(matches!(err, ExtractError::EmptyPayload));
            assert_eq!(err.to_string(), "No content received from URL");
        }
        assert!(matches!(
            proxy_contents(StatusCode::OK, "<html>not json</html>"),
            Err(ExtractError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_source_is_isolated() {
        let source = FakeSource::new(&[
            ("https://a.com", page("Alpha", PROSE).as_str()),
            ("https://c.com", page("Gamma", PROSE).as_str()),
        ]);
        let extractor = ContentExtractor::new(Arc::new(source));
        let urls = UrlInput::from(vec!["https://a.com", "https://b.com", "https://c.com"]);

        let results = extractor.extract_all(&urls, |_| {}).await;
        assert_eq!(results.len(), 3);
        assert!(results[1].error.as_deref().unwrap().contains("https://b.com"));
        assert!(results[1].content.is_empty());

        let document = extractor.extract_from_urls(&urls, |_| {}).await.unwrap();
        assert_eq!(document.matches("Source: ").count(), 2);
        assert!(document.starts_with("Source: Alpha (https://a.com)\n"));
        assert!(document.contains("Source: Gamma (https://c.com)"));
        assert!(document.contains(SOURCE_DELIMITER));
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let extractor = ContentExtractor::new(Arc::new(FakeSource::new(&[])));
        let urls = UrlInput::from(vec!["https://a.com", "https://b.com"]);

        let err = extractor.extract_from_urls(&urls, |_| {}).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoContent));
    }

    #[tokio::test]
    async fn test_progress_sequence() {
        let pages: Vec<(String, String)> = (0..3)
            .map(|i| (format!("https://site{i}.com"), page(&format!("Page {i}"), PROSE)))
            .collect();
        let refs: Vec<(&str, &str)> = pages.iter().map(|(u, h)| (u.as_str(), h.as_str())).collect();
        let extractor = ContentExtractor::new(Arc::new(FakeSource::new(&refs)));
        let urls = UrlInput::from(pages.iter().map(|(u, _)| u.clone()).collect::<Vec<_>>());

        let seen = Mutex::new(Vec::new());
        extractor
            .extract_from_urls(&urls, |p| seen.lock().unwrap().push(p))
            .await
            .unwrap();

        assert_eq!(seen.into_inner().unwrap(), vec![0, 33, 67, 100]);
    }

    #[tokio::test]
    async fn test_concurrent_extraction_keeps_input_order() {
        let pages: Vec<(String, String)> = (0..5)
            .map(|i| (format!("https://site{i}.com"), page(&format!("Page {i}"), PROSE)))
            .collect();
        let refs: Vec<(&str, &str)> = pages.iter().map(|(u, h)| (u.as_str(), h.as_str())).collect();
        let extractor = ContentExtractor::new(Arc::new(FakeSource::new(&refs))).with_concurrency(3);
        let urls = UrlInput::from(pages.iter().map(|(u, _)| u.clone()).collect::<Vec<_>>());

        let mut seen = Vec::new();
        let document = extractor.extract_from_urls(&urls, |p| seen.push(p)).await.unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));

        let positions: Vec<usize> = (0..5)
            .map(|i| document.find(&format!("Source: Page {i} ")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
