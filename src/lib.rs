//! # Summa Button
//!
//! Gathers text from web pages or from the caller's own container and
//! summarises it with a chat-completion LLM.
//!
//! ## Features
//!
//! - **Failure isolation**: one unreachable page never sinks a multi-source batch
//! - **Source attribution**: sources are recovered from the aggregated document
//! - **Output formats**: paragraphs, bullet lists or numbered lists as HTML markup

pub mod config;
pub mod controller;
pub mod dom;
pub mod extractor;
pub mod generator;
pub mod summary;
pub mod ui;
pub mod validator;

pub use config::Config;
pub use controller::{ContentSource, Controller, Phase, SummarizeError, SummarizeRequest, SummaryObserver};
pub use extractor::{ContentExtractor, ExtractionResult, ProxyClient};
pub use generator::{OpenAiClient, SummaryGenerator};
pub use summary::{OutputFormat, SourceInfo, SummaryConfig, SummaryLength, SummaryOptions, SummaryResult};
pub use validator::UrlInput;
