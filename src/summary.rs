//! Summary types - the configuration going into the generator and the result coming out.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How long the generated summary should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// Markup shape of the returned summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Paragraph,
    Bullets,
    Numbered,
}

/// Caller-facing summary options, everything except the content and the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Chat model identifier (e.g., "gpt-3.5-turbo")
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub summary_length: SummaryLength,
    pub output_format: OutputFormat,
    /// Replaces the default instruction when set
    pub custom_prompt: Option<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            summary_length: SummaryLength::default(),
            output_format: OutputFormat::default(),
            custom_prompt: None,
        }
    }
}

/// Everything the generator needs for one call.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Text to summarise, usually an aggregated multi-source document
    pub content: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub summary_length: SummaryLength,
    pub custom_prompt: Option<String>,
    pub output_format: OutputFormat,
}

impl SummaryConfig {
    pub fn new(content: impl Into<String>, api_key: impl Into<String>, options: &SummaryOptions) -> Self {
        Self {
            content: content.into(),
            api_key: api_key.into(),
            model: options.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            summary_length: options.summary_length,
            custom_prompt: options.custom_prompt.clone(),
            output_format: options.output_format,
        }
    }
}

/// A source recovered from the `Source: title (url)` headers of the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub title: String,
    pub url: String,
    /// Approximate, see [`crate::generator::extract_source_info`]
    pub word_count: usize,
}

/// The finished summary handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    /// Summary markup, shaped by the requested [`OutputFormat`]
    pub content: String,
    pub source_count: usize,
    /// Words in the raw model output
    pub word_count: usize,
    /// Wall-clock milliseconds spent generating
    pub processing_time: u64,
    pub sources: Vec<SourceInfo>,
    pub model: String,
}
