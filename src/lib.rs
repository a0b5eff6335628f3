use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod backup;
pub mod capabilities;
pub mod consistency;
pub mod diff;
pub mod document;
pub mod logging;
pub mod ocr;
pub mod pairs;
mod paths;
pub mod pattern;
pub mod report;
pub mod scan;
pub mod session;
pub mod settings;
pub mod store;
pub mod termbase;
mod test_util;
pub mod text;
pub mod unknown;
pub mod variants;

pub use capabilities::Capabilities;
pub use report::ReportFormat;
pub use scan::{ScanOptions, ScanReport};
pub use session::Session;
pub use settings::{Settings, StoreBackend};
pub use termbase::{TermRecord, TermStatus, TermTable};

use document::TextUnit;
use termbase::normalize_table;
use text::split_variants;

/// Global options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<PathBuf>,
    pub store: Option<StoreBackend>,
    pub termbase: Option<PathBuf>,
}

/// Loads layered settings and applies command-line overrides.
pub fn resolve_settings(config: &Config) -> Result<Settings> {
    let mut settings = settings::load_settings(config.settings_path.as_deref())?;
    if let Some(store) = config.store {
        settings.store.backend = store;
    }
    if let Some(path) = &config.termbase {
        settings.store.path = path.clone();
    }
    Ok(settings)
}

#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub window: Option<usize>,
    pub force_ocr: bool,
    pub no_fuzzy: bool,
}

/// Loads `input` as text units, OCR'ing near-empty PDF pages when OCR is
/// enabled and installed.
pub fn load_input(
    input: &Path,
    settings: &Settings,
    capabilities: &Capabilities,
    request: &ScanRequest,
) -> Result<Vec<TextUnit>> {
    let wants_ocr = settings.ocr.enabled || request.force_ocr;
    if wants_ocr && !capabilities.ocr {
        warn!("ocr requested but tesseract or a pdf rasteriser is missing; skipping ocr");
    }
    let ocr_options = settings.ocr_options();
    let ocr = (wants_ocr && capabilities.ocr).then_some(&ocr_options);
    document::load_units(input, ocr)
}

pub fn scan_units(
    units: &[TextUnit],
    table: &TermTable,
    settings: &Settings,
    capabilities: &Capabilities,
    request: &ScanRequest,
) -> Result<ScanReport> {
    let mut effective = settings.clone();
    if let Some(window) = request.window {
        effective.check.window = window;
        effective.clamp();
    }
    let options = ScanOptions::from_settings(&effective);
    let scorer = if capabilities.fuzzy && effective.unknown.fuzzy && !request.no_fuzzy {
        unknown::default_scorer()
    } else {
        None
    };
    scan::run_scan(units, table, &options, scorer.as_deref())
}

/// Normalizes a CSV termbase to the canonical schema. Returns the warnings.
pub fn normalize_file(input: &Path, out: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(input)
        .with_context(|| format!("failed to read termbase: {}", input.display()))?;
    let raw = store::read_csv_table(&bytes)?;
    let normalized = normalize_table(&raw);
    let csv = store::write_csv_table(&normalized.table.to_raw())?;
    fs::write(out, csv).with_context(|| format!("failed to write termbase: {}", out.display()))?;
    Ok(normalized.warnings)
}

#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub en: String,
    pub zh: String,
    pub abbr: Option<String>,
    pub style: Option<String>,
    pub variants: Option<String>,
}

pub fn build_record(request: &AddRequest, added_date: &str) -> Result<TermRecord> {
    if request.en.trim().is_empty() || request.zh.trim().is_empty() {
        return Err(anyhow!("both --en and --zh are required"));
    }
    let mut record = TermRecord::new(&request.en, &request.zh);
    if let Some(abbr) = &request.abbr {
        record.abbr = abbr.trim().to_string();
    }
    if let Some(style) = &request.style {
        record.first_mention_style = style.trim().to_string();
    }
    if let Some(variants) = &request.variants {
        record.variants = split_variants(variants);
    }
    record.added_date = added_date.to_string();
    Ok(record)
}

/// Tab-separated listing, optionally filtered by status.
pub fn format_table(table: &TermTable, status: Option<&TermStatus>) -> String {
    let mut lines = vec![
        termbase::Field::ALL
            .iter()
            .map(|field| field.header())
            .collect::<Vec<_>>()
            .join("\t"),
    ];
    for record in table.iter() {
        if status.is_some_and(|status| &record.status != status) {
            continue;
        }
        let variants = text::join_variants(&record.variants);
        lines.push(
            [
                record.en.as_str(),
                record.zh.as_str(),
                record.abbr.as_str(),
                record.first_mention_style.as_str(),
                variants.as_str(),
                record.status.as_str(),
                record.added_date.as_str(),
                record.provenance.as_str(),
            ]
            .join("\t"),
        );
    }
    lines.join("\n")
}
