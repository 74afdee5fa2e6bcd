//! Input validation for URLs and API credentials.
//!
//! Two URL policies live here: [`validate_urls`] rejects a whole batch when a
//! single entry is bad, [`sanitize_urls`] keeps the good entries and drops the rest.

use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix every OpenAI secret key starts with
const API_KEY_PREFIX: &str = "sk-";

/// One URL or a list of URLs, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlInput {
    One(String),
    Many(Vec<String>),
}

impl UrlInput {
    /// View the input as a list, whatever shape it was given in
    pub fn as_slice(&self) -> &[String] {
        match self {
            UrlInput::One(url) => std::slice::from_ref(url),
            UrlInput::Many(urls) => urls,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<&str> for UrlInput {
    fn from(url: &str) -> Self {
        UrlInput::One(url.to_string())
    }
}

impl From<String> for UrlInput {
    fn from(url: String) -> Self {
        UrlInput::One(url)
    }
}

impl From<Vec<String>> for UrlInput {
    fn from(urls: Vec<String>) -> Self {
        UrlInput::Many(urls)
    }
}

impl From<Vec<&str>> for UrlInput {
    fn from(urls: Vec<&str>) -> Self {
        UrlInput::Many(urls.into_iter().map(String::from).collect())
    }
}

/// Check that every URL in the batch is a well-formed http(s) URL.
///
/// Absent input and empty lists are rejected. The scheme check is made on the
/// raw text, so surrounding whitespace fails validation.
pub fn validate_urls(urls: Option<&UrlInput>) -> bool {
    let Some(urls) = urls else {
        return false;
    };

    if urls.is_empty() {
        return false;
    }

    urls.as_slice().iter().all(|url| {
        Url::parse(url).is_ok() && (url.starts_with("http://") || url.starts_with("https://"))
    })
}

/// Check the shape of an OpenAI API key: non-blank and starting with `sk-`.
pub fn validate_api_key(api_key: Option<&str>) -> bool {
    match api_key.map(str::trim) {
        Some(key) => !key.is_empty() && key.starts_with(API_KEY_PREFIX),
        None => false,
    }
}

/// Trim every URL and drop the ones that are not valid http(s) URLs.
pub fn sanitize_urls(urls: &UrlInput) -> Vec<String> {
    urls.as_slice()
        .iter()
        .map(|url| url.trim())
        .filter(|url| {
            Url::parse(url).is_ok() && (url.starts_with("http://") || url.starts_with("https://"))
        })
        .map(String::from)
        .collect()
}

/// Check a single URL by its parsed scheme.
pub fn is_valid_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_urls_accepts_http_and_https() {
        let urls = UrlInput::from(vec!["http://a.com", "https://b.com/path?q=1"]);
        assert!(validate_urls(Some(&urls)));
        assert!(validate_urls(Some(&UrlInput::from("https://example.org"))));
    }

    #[test]
    fn test_validate_urls_rejects_whole_batch() {
        let urls = UrlInput::from(vec!["http://a.com", "ftp://b.com"]);
        assert!(!validate_urls(Some(&urls)));

        let urls = UrlInput::from(vec!["http://a.com", "not a url"]);
        assert!(!validate_urls(Some(&urls)));
    }

    #[test]
    fn test_validate_urls_rejects_absent_and_empty() {
        assert!(!validate_urls(None));
        assert!(!validate_urls(Some(&UrlInput::Many(Vec::new()))));
    }

    #[test]
    fn test_validate_urls_requires_exact_prefix() {
        assert!(!validate_urls(Some(&UrlInput::from(" http://a.com"))));
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key(Some("sk-abc")));
        assert!(validate_api_key(Some("  sk-abc  ")));
        assert!(!validate_api_key(Some("")));
        assert!(!validate_api_key(Some("  ")));
        assert!(!validate_api_key(Some("abc-123")));
        assert!(!validate_api_key(None));
    }

    #[test]
    fn test_sanitize_urls_trims_and_drops_invalid() {
        let urls = UrlInput::from(vec!["http://a.com", "not a url", " https://b.com "]);
        assert_eq!(sanitize_urls(&urls), vec!["http://a.com", "https://b.com"]);
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("HTTP://EXAMPLE.COM"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url("example.com"));
    }

    #[test]
    fn test_url_input_deserializes_either_shape() {
        let one: UrlInput = serde_json::from_str(r#""https://a.com""#).unwrap();
        assert_eq!(one.as_slice(), ["https://a.com".to_string()]);

        let many: UrlInput = serde_json::from_str(r#"["https://a.com", "https://b.com"]"#).unwrap();
        assert_eq!(many.len(), 2);
    }
}
