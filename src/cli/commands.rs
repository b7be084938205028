use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cli::config::{AppConfig, build_detector, resolve_oracle};
use crate::classifier::OracleClient;
use crate::dom::{NodeSnapshot, Page};
use crate::field::CandidateField;
use crate::fill::{FillReport, FormFiller};
use crate::trace::TraceLogger;

// ============================================================================
// detect subcommand
// ============================================================================

pub async fn cmd_detect(
    page_path: &str,
    async_mode: bool,
    format: &str,
    trace_path: Option<&str>,
    config: &AppConfig,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = load_page(page_path)?;
    let oracle = resolve_oracle(config, ollama_endpoint, ollama_model)
        .map(|o| o as Arc<dyn OracleClient>);
    let detector = build_detector(config, oracle);

    let fields = if async_mode {
        detector.detect_all(&page).await
    } else {
        detector.prepare().await;
        detector.detect_all_sync(&page)
    };
    info!(url = page.url(), fields = fields.len(), async_mode, "detection finished");

    if let Some(path) = trace_path {
        let mode = if async_mode { "async" } else { "sync" };
        TraceLogger::new(path).log_fields(page.url(), &fields, mode);
    }

    let output = match format {
        "json" => serde_json::to_string_pretty(&fields)?,
        _ => format_field_table(&fields),
    };
    println!("{}", output);
    Ok(())
}

// ============================================================================
// fill subcommand
// ============================================================================

#[derive(Serialize)]
struct FilledPage<'a> {
    url: &'a str,
    root: NodeSnapshot,
}

pub async fn cmd_fill(
    page_path: &str,
    output: Option<&str>,
    config: &AppConfig,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = load_page(page_path)?;
    let oracle = resolve_oracle(config, ollama_endpoint, ollama_model)
        .map(|o| o as Arc<dyn OracleClient>);
    let detector = Arc::new(build_detector(config, oracle.clone()));

    let mut filler = FormFiller::new(detector);
    if let Some(client) = oracle {
        filler = filler.with_oracle(client, config.oracle.force_first);
    }

    let report = filler.fill_page(&page).await;
    println!(
        "Filled {} of {} fields ({} skipped)",
        report.filled_count(),
        report.outcomes.len(),
        report.skipped_count()
    );

    match output {
        Some(path) => {
            let filled = FilledPage {
                url: page.url(),
                root: page.snapshot(),
            };
            std::fs::write(path, serde_json::to_string_pretty(&filled)?)?;
            println!("Wrote filled page to {}", path);
        }
        None => print!("{}", format_fill_report(&report)),
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Read a page snapshot JSON file.
pub fn load_page(path: &str) -> Result<Page, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(Page::from_json(&content)?)
}

pub fn format_field_table(fields: &[CandidateField]) -> String {
    let mut out = format!(
        "{:<40} {:<16} {:<14} {:>6}  {}\n",
        "SELECTOR", "TYPE", "METHOD", "CONF", "LABEL"
    );
    for field in fields {
        let method = field.detection_method.map(|m| m.as_str()).unwrap_or("-");
        out.push_str(&format!(
            "{:<40} {:<16} {:<14} {:>6.2}  {}\n",
            truncate(&field.selector, 40),
            field.field_type.as_str(),
            method,
            field.detection_confidence,
            field.label.as_deref().unwrap_or("")
        ));
    }
    out.push_str(&format!("{} fields\n", fields.len()));
    out
}

pub fn format_fill_report(report: &FillReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let mark = if outcome.filled { "ok  " } else { "skip" };
        out.push_str(&format!(
            "[{}] {:<40} {:<16} {:?}\n",
            mark,
            truncate(&outcome.selector, 40),
            outcome.field_type.as_str(),
            outcome.value
        ));
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
