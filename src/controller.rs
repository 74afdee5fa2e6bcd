//! Orchestration of one summarisation run.
//!
//! A run goes `Validating -> ReadingDom | Extracting -> Summarizing -> Done`, or
//! drops to `Error` from any phase. Progress is reported on a single 0-100 scale:
//!
//! | step                         | progress   |
//! |------------------------------|------------|
//! | start                        | 0          |
//! | DOM text read                | 50         |
//! | URLs validated               | 10         |
//! | extracting URL `i` of `n`    | 10 - 70    |
//! | extraction finished          | 70         |
//! | summary ready                | 100        |
//!
//! Progress drops back to 0 a short while after the run settles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::TextProvider;
use crate::extractor::{ContentExtractor, ExtractError};
use crate::generator::{GenerateError, SummaryGenerator};
use crate::summary::{SummaryConfig, SummaryOptions, SummaryResult};
use crate::validator::{validate_api_key, validate_urls, UrlInput};

/// Delay before progress is reset once a run has settled
pub const PROGRESS_RESET_DELAY: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Invalid OpenAI API key. It should start with \"sk-\"")]
    InvalidApiKey,
    #[error("Invalid URLs provided. URLs must start with http:// or https://")]
    InvalidUrls,
    #[error("No parent container found for summarization.")]
    ContainerNotFound,
    #[error("No content found in the DOM container to summarize.")]
    EmptyContainer,
    #[error("A summarization is already in progress")]
    InFlight,
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Generation(#[from] GenerateError),
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    ReadingDom,
    Extracting,
    Summarizing,
    Done,
    Error,
}

/// What to summarise.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// Text of the caller's own container, found by class name
    Dom { summary_class: String },
    /// Pages fetched through the proxy
    Urls(Option<UrlInput>),
}

#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub source: ContentSource,
    pub api_key: Option<String>,
    pub options: SummaryOptions,
}

/// Receives notifications as a run progresses. All methods default to no-ops.
pub trait SummaryObserver: Send + Sync {
    fn on_progress(&self, _progress: f64) {}

    fn on_phase(&self, _phase: Phase) {}

    fn on_summary_complete(&self, _result: &SummaryResult) {}

    fn on_error(&self, _message: &str) {}
}

struct NoopObserver;

impl SummaryObserver for NoopObserver {}

/// Observable state of the controller.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    pub phase: Phase,
    pub progress: f64,
    pub result: Option<SummaryResult>,
    pub error: Option<String>,
}

/// Clears the in-flight flag however the run ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sequences validation, content gathering and summarisation.
///
/// Only one run may be in flight at a time; a concurrent call fails with
/// [`SummarizeError::InFlight`] without touching the current run's state.
pub struct Controller {
    extractor: ContentExtractor,
    generator: SummaryGenerator,
    text_provider: Option<Arc<dyn TextProvider>>,
    observer: Arc<dyn SummaryObserver>,
    state: Arc<Mutex<ControllerState>>,
    in_flight: AtomicBool,
    run_id: Arc<AtomicU64>,
    reset_delay: Duration,
}

impl Controller {
    pub fn new(extractor: ContentExtractor, generator: SummaryGenerator) -> Self {
        Self {
            extractor,
            generator,
            text_provider: None,
            observer: Arc::new(NoopObserver),
            state: Arc::new(Mutex::new(ControllerState::default())),
            in_flight: AtomicBool::new(false),
            run_id: Arc::new(AtomicU64::new(0)),
            reset_delay: PROGRESS_RESET_DELAY,
        }
    }

    pub fn with_text_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.text_provider = Some(provider);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SummaryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ControllerState {
        self.lock_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one summarisation end to end.
    ///
    /// Must be called from within a tokio runtime, the progress reset is a spawned task.
    pub async fn summarize(&self, request: &SummarizeRequest) -> Result<SummaryResult, SummarizeError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::warn!("rejected summarize call while another is running");
            return Err(SummarizeError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.begin();
        let outcome = self.run(request).await;

        match &outcome {
            Ok(result) => {
                {
                    let mut state = self.lock_state();
                    state.result = Some(result.clone());
                }
                self.set_phase(Phase::Done);
                tracing::info!(sources = result.source_count, words = result.word_count, "summary complete");
                self.observer.on_summary_complete(result);
            }
            Err(e) => {
                let message = e.to_string();
                {
                    let mut state = self.lock_state();
                    state.error = Some(message.clone());
                }
                self.set_phase(Phase::Error);
                tracing::error!(error = %message, "summarization failed");
                self.observer.on_error(&message);
            }
        }

        self.schedule_progress_reset();
        outcome
    }

    async fn run(&self, request: &SummarizeRequest) -> Result<SummaryResult, SummarizeError> {
        let api_key = request
            .api_key
            .as_deref()
            .filter(|key| validate_api_key(Some(*key)))
            .map(str::trim)
            .ok_or(SummarizeError::InvalidApiKey)?;

        let content = match &request.source {
            ContentSource::Dom { summary_class } => {
                self.set_phase(Phase::ReadingDom);
                let text = self
                    .text_provider
                    .as_ref()
                    .and_then(|provider| provider.container_text(summary_class))
                    .ok_or(SummarizeError::ContainerNotFound)?;

                let text = text.trim();
                if text.is_empty() {
                    return Err(SummarizeError::EmptyContainer);
                }

                self.set_progress(50.0);
                text.to_string()
            }
            ContentSource::Urls(urls) => {
                let urls = urls
                    .as_ref()
                    .filter(|urls| validate_urls(Some(*urls)))
                    .ok_or(SummarizeError::InvalidUrls)?;

                self.set_progress(10.0);
                self.set_phase(Phase::Extracting);
                let document = self
                    .extractor
                    .extract_from_urls(urls, |p| self.set_progress(10.0 + f64::from(p) * 0.6))
                    .await?;

                self.set_progress(70.0);
                document
            }
        };

        self.set_phase(Phase::Summarizing);
        let config = SummaryConfig::new(content, api_key, &request.options);
        let result = self.generator.generate(&config).await?;

        self.set_progress(100.0);
        Ok(result)
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        self.run_id.fetch_add(1, Ordering::AcqRel);
        *self.lock_state() = ControllerState::default();
        self.set_phase(Phase::Validating);
        self.set_progress(0.0);
    }

    fn set_phase(&self, phase: Phase) {
        self.lock_state().phase = phase;
        tracing::debug!(?phase, "phase");
        self.observer.on_phase(phase);
    }

    fn set_progress(&self, progress: f64) {
        self.lock_state().progress = progress;
        self.observer.on_progress(progress);
    }

    /// Zero the progress after the delay unless a newer run has started
    fn schedule_progress_reset(&self) {
        let state = Arc::clone(&self.state);
        let observer = Arc::clone(&self.observer);
        let run_id = Arc::clone(&self.run_id);
        let expected = run_id.load(Ordering::Acquire);
        let delay = self.reset_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if run_id.load(Ordering::Acquire) != expected {
                return;
            }
            state.lock().unwrap_or_else(PoisonError::into_inner).progress = 0.0;
            observer.on_progress(0.0);
        });
    }
}
