//! Terminal presentation of runs and results.

use std::io::Write;

use colored::Colorize;
use scraper::{Html, Selector};

use crate::controller::{Phase, SummaryObserver};
use crate::extractor::ExtractionResult;
use crate::summary::SummaryResult;

const BAR_WIDTH: usize = 30;

/// Draws a progress bar on stderr and prints the finished summary on stdout.
pub struct ConsoleObserver {
    /// Print the rendered summary when a run completes
    show_result: bool,
}

impl ConsoleObserver {
    pub fn new(show_result: bool) -> Self {
        Self { show_result }
    }
}

impl SummaryObserver for ConsoleObserver {
    fn on_progress(&self, progress: f64) {
        // The delayed reset to 0 happens after the run, nothing left to draw
        if progress <= 0.0 {
            return;
        }
        eprint!("\r{}", progress_bar(progress));
        if progress >= 100.0 {
            eprintln!();
        }
        let _ = std::io::stderr().flush();
    }

    fn on_phase(&self, phase: Phase) {
        let label = match phase {
            Phase::ReadingDom => "Reading container text",
            Phase::Extracting => "Extracting content",
            Phase::Summarizing => "Summarising",
            _ => return,
        };
        eprintln!("\r{}", label.dimmed());
    }

    fn on_summary_complete(&self, result: &SummaryResult) {
        if self.show_result {
            println!("{}", render_summary(result));
        }
    }

    fn on_error(&self, message: &str) {
        // The message itself is reported once the error reaches main
        tracing::debug!(message, "summarization failed");
        eprintln!();
    }
}

fn progress_bar(progress: f64) -> String {
    let progress = progress.clamp(0.0, 100.0);
    let filled = ((progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        progress.round()
    )
}

/// Convert summary markup into plain terminal text
pub fn markup_to_text(content: &str) -> String {
    let fragment = Html::parse_fragment(content);
    let Ok(items) = Selector::parse("li") else {
        return content.to_string();
    };

    let items: Vec<String> = fragment
        .select(&items)
        .map(|item| item.text().collect::<String>())
        .collect();

    if items.is_empty() {
        return content.replace("<br><br>", "\n");
    }

    let ordered = content.starts_with("<ol>");
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if ordered {
                format!("  {}. {}", i + 1, item)
            } else {
                format!("  • {}", item)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_summary(result: &SummaryResult) -> String {
    let mut out = format!("{}\n\n{}\n", "=== Summary ===".bold(), markup_to_text(&result.content));

    out.push_str(&format!(
        "\n{}\n",
        format!(
            "Sources: {} | Words: {} | Time: {}ms | Model: {}",
            result.source_count, result.word_count, result.processing_time, result.model
        )
        .dimmed()
    ));

    for source in &result.sources {
        out.push_str(&format!(
            "  📄 {} ({}) ~{} words\n",
            source.title, source.url, source.word_count
        ));
    }

    out
}

/// One line per source: what was extracted, or why not
pub fn render_extraction_report(results: &[ExtractionResult]) -> String {
    results
        .iter()
        .map(|result| match &result.error {
            None => format!("{} {} ({} words)", "✅".green(), result.url, result.word_count),
            Some(error) => format!("{} {}", "❌".red(), error),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_to_text() {
        assert_eq!(markup_to_text("One.<br><br>Two."), "One.\nTwo.");
        assert_eq!(
            markup_to_text("<ul><li>a</li><li>b</li></ul>"),
            "  • a\n  • b"
        );
        assert_eq!(
            markup_to_text("<ol><li>a</li><li>b</li></ol>"),
            "  1. a\n  2. b"
        );
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), format!("[{}]   0%", ".".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(100.0), format!("[{}] 100%", "#".repeat(BAR_WIDTH)));
        assert!(progress_bar(29.8).ends_with(" 30%"));
    }
}
