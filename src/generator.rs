//! LLM summary generation.
//!
//! Builds the prompt, calls an OpenAI-compatible chat-completion endpoint and
//! turns the reply into a [`SummaryResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OpenAiConfig;
use crate::extractor::word_count;
use crate::summary::{OutputFormat, SourceInfo, SummaryConfig, SummaryLength, SummaryResult};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise, accurate, and well-structured \
summaries of web content. Focus on extracting key information, main arguments, and important conclusions.";

lazy_static! {
    static ref SOURCE_HEADER: Regex = Regex::new(r"Source: (.+?) \((.+?)\)").unwrap();
    static ref BULLET_MARKER: Regex = Regex::new(r"^[-•*]\s+").unwrap();
    static ref NUMBER_MARKER: Regex = Regex::new(r"^\d+\.\s+").unwrap();
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Failed to generate summary: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("{0}")]
    Api(String),
    #[error("Malformed response from OpenAI: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("No summary content generated from OpenAI")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// A chat-completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and return the text of the first choice
    async fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<String, GenerateError>;
}

/// Client for the OpenAI `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GenerateError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &OpenAiConfig) -> Result<Self, GenerateError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<String, GenerateError> {
        let response = self
            .client
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        chat_reply(status, &body)
    }
}

/// Map a chat-completion reply to the text of its first choice
fn chat_reply(status: StatusCode, body: &str) -> Result<String, GenerateError> {
    if !status.is_success() {
        return Err(GenerateError::Api(api_error_message(status, body)));
    }

    let reply: ChatResponse = serde_json::from_str(body)?;
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or(GenerateError::EmptyResponse)
}

/// The provider usually explains itself in `{"error": {"message": ...}}`
fn api_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|reply| reply.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| {
            format!(
                "OpenAI API error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
        })
}

/// Produces summaries through a [`ChatBackend`].
#[derive(Clone)]
pub struct SummaryGenerator {
    backend: Arc<dyn ChatBackend>,
}

impl SummaryGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Summarise `config.content` and attribute it to the sources it names
    pub async fn generate(&self, config: &SummaryConfig) -> Result<SummaryResult, GenerateError> {
        let started = Instant::now();

        let request = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(config),
                },
            ],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        tracing::info!(model = %config.model, chars = config.content.len(), "requesting summary");
        let raw = self.backend.complete(&config.api_key, &request).await?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }

        let sources = extract_source_info(&config.content);
        let processing_time = started.elapsed().as_millis() as u64;
        tracing::debug!(processing_time, sources = sources.len(), "summary received");

        Ok(SummaryResult {
            content: format_summary(raw, config.output_format),
            source_count: sources.len(),
            word_count: word_count(raw),
            processing_time,
            sources,
            model: config.model.clone(),
        })
    }
}

fn length_instruction(length: SummaryLength) -> &'static str {
    match length {
        SummaryLength::Short => "in 2-3 concise sentences",
        SummaryLength::Medium => "in 1-2 well-developed paragraphs",
        SummaryLength::Long => "in 3-4 detailed paragraphs with comprehensive analysis",
    }
}

fn format_instruction(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Paragraph => "Write the summary as flowing, well-structured paragraphs.",
        OutputFormat::Bullets => {
            "Present the summary as clear bullet points, with each point capturing a key insight."
        }
        OutputFormat::Numbered => "Present the summary as numbered points in order of importance.",
    }
}

/// Build the user prompt for a summary request
pub fn build_prompt(config: &SummaryConfig) -> String {
    let format = format_instruction(config.output_format);

    if let Some(custom) = config.custom_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return format!(
            "{custom}\n\n{format}\n\nContent to summarize:\n{}",
            config.content
        );
    }

    format!(
        r#"Please create a comprehensive summary of the following content {}. {format}

Focus on:
- Main themes and key points
- Important arguments and conclusions
- Significant data or findings
- Actionable insights (if applicable)

If multiple sources are provided, synthesize the information cohesively and note any contrasting viewpoints.

Content to summarize:
{}"#,
        length_instruction(config.summary_length),
        config.content
    )
}

/// Render raw model output as HTML for the requested format
pub fn format_summary(content: &str, format: OutputFormat) -> String {
    let tag = match format {
        OutputFormat::Paragraph => return content.replace('\n', "<br><br>"),
        OutputFormat::Bullets => "ul",
        OutputFormat::Numbered => "ol",
    };

    let items: String = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = BULLET_MARKER.replace(line, "");
            NUMBER_MARKER.replace(&line, "").trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .map(|line| format!("<li>{line}</li>"))
        .collect();

    format!("<{tag}>{items}</{tag}>")
}

/// Recover the sources named by `Source: title (url)` headers.
///
/// A source's word count covers everything from its header to the next one,
/// header and separators included, so it is an approximation.
pub fn extract_source_info(content: &str) -> Vec<SourceInfo> {
    let headers: Vec<_> = SOURCE_HEADER.captures_iter(content).collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let start = caps.get(0).map_or(0, |m| m.start());
            let end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(content.len(), |m| m.start());

            SourceInfo {
                title: caps[1].trim().to_string(),
                url: caps[2].trim().to_string(),
                word_count: word_count(&content[start..end]),
            }
        })
        .collect()
}
