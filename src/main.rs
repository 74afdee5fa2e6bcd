//! Summa Button CLI - multi-source summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use summa_button::dom::HtmlDocumentProvider;
use summa_button::{
    extractor, ui, validator, Config, ContentExtractor, ContentSource, Controller, OpenAiClient, OutputFormat,
    ProxyClient, SummarizeRequest, SummaryGenerator, SummaryLength, SummaryOptions, UrlInput,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "summa-button")]
#[command(author, version, about = "Summarise web pages and page containers with an LLM", long_about = None)]
struct Cli {
    /// Path to a summa-button.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise one or more web pages
    Summarise {
        /// URLs to summarise
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Summarise the text of a container in a local HTML file
    Dom {
        /// HTML file standing in for the rendered page
        #[arg(long)]
        file: PathBuf,
        /// Class name of the container to summarise
        #[arg(long = "class")]
        summary_class: String,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Extract and print page content without summarising
    Extract {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Validate URLs and show which ones would be kept
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Args)]
struct SummaryArgs {
    /// Summary length
    #[arg(long, value_enum)]
    length: Option<SummaryLength>,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Chat model
    #[arg(long)]
    model: Option<String>,
    /// Custom instruction replacing the default prompt
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    temperature: Option<f32>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl SummaryArgs {
    /// Layer command-line flags over the configured options
    fn apply(&self, mut options: SummaryOptions) -> SummaryOptions {
        if let Some(length) = self.length {
            options.summary_length = length;
        }
        if let Some(format) = self.format {
            options.output_format = format;
        }
        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        if let Some(prompt) = &self.prompt {
            options.custom_prompt = Some(prompt.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            options.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            options.temperature = temperature;
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Summarise { urls, summary } => {
            let request = SummarizeRequest {
                source: ContentSource::Urls(Some(UrlInput::from(urls))),
                api_key: config.api_key().map(String::from),
                options: summary.apply(config.summary.clone()),
            };
            run(build_controller(&config, summary.json)?, &request, summary.json).await?;
        }
        Commands::Dom {
            file,
            summary_class,
            summary,
        } => {
            let provider = HtmlDocumentProvider::from_file(&file)?;
            let request = SummarizeRequest {
                source: ContentSource::Dom { summary_class },
                api_key: config.api_key().map(String::from),
                options: summary.apply(config.summary.clone()),
            };
            let controller = build_controller(&config, summary.json)?.with_text_provider(Arc::new(provider));
            run(controller, &request, summary.json).await?;
        }
        Commands::Extract { urls } => {
            let urls = UrlInput::from(validator::sanitize_urls(&UrlInput::from(urls)));
            let extractor = ContentExtractor::new(Arc::new(ProxyClient::from_config(&config.extractor)?))
                .with_concurrency(config.extractor.concurrency);

            println!("Fetching {} URL(s)...", urls.len());
            let results = extractor.extract_all(&urls, |_| {}).await;
            let document = extractor::aggregate(&results);

            if !document.is_empty() {
                println!("\n{}\n", document);
            }
            println!("{}", ui::render_extraction_report(&results));
            println!(
                "\n--- Extracted {} characters from {} source(s) ---",
                document.len(),
                results.iter().filter(|r| r.is_success()).count()
            );
        }
        Commands::Check { urls } => {
            let input = UrlInput::from(urls);
            let verdict = if validator::validate_urls(Some(&input)) {
                "all valid".green()
            } else {
                "batch rejected".red()
            };
            println!("Batch: {}", verdict);

            for url in input.as_slice() {
                let mark = if validator::is_valid_url(url.trim()) { "✅" } else { "❌" };
                println!("  {} {}", mark, url);
            }

            println!("\nKept after sanitising:");
            for url in validator::sanitize_urls(&input) {
                println!("  {}", url);
            }
        }
    }

    Ok(())
}

fn build_controller(config: &Config, json: bool) -> anyhow::Result<Controller> {
    let extractor = ContentExtractor::new(Arc::new(ProxyClient::from_config(&config.extractor)?))
        .with_concurrency(config.extractor.concurrency);
    let generator = SummaryGenerator::new(Arc::new(OpenAiClient::from_config(&config.openai)?));

    Ok(Controller::new(extractor, generator).with_observer(Arc::new(ui::ConsoleObserver::new(!json))))
}

/// Run the controller and print the result as JSON when asked to
async fn run(controller: Controller, request: &SummarizeRequest, json: bool) -> anyhow::Result<()> {
    let result = controller.summarize(request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
