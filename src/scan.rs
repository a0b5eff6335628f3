use anyhow::Result;
use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::info;

use crate::consistency::{
    DEFAULT_TRANSLATION_CONTEXT, DEFAULT_WINDOW, Inconsistency, InconsistencyKind,
    check_consistency, check_unit_translations,
};
use crate::diff::{TermDiff, diff_pairs};
use crate::document::TextUnit;
use crate::pairs::{ExtractedPair, extract_pairs};
use crate::settings::Settings;
use crate::termbase::{EXTRACTED_PROVENANCE, TermRecord, TermStatus, TermTable};
use crate::unknown::{Similarity, UnknownCandidate, UnknownOptions, generate_candidates};
use crate::variants::{DEFAULT_CONTEXT, VariantHit, scan_variants};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub window: usize,
    pub variant_context: usize,
    pub translation_context: usize,
    pub unknown: UnknownOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            variant_context: DEFAULT_CONTEXT,
            translation_context: DEFAULT_TRANSLATION_CONTEXT,
            unknown: UnknownOptions::default(),
        }
    }
}

impl ScanOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window: settings.check.window,
            variant_context: settings.check.context,
            translation_context: settings.check.translation_context,
            unknown: settings.unknown_options(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub pages: usize,
    pub variant_hits: Vec<VariantHit>,
    pub pairs: Vec<ExtractedPair>,
    pub diff: TermDiff,
    pub inconsistencies: Vec<Inconsistency>,
    pub unknowns: Vec<UnknownCandidate>,
}

pub fn run_scan(
    units: &[TextUnit],
    table: &TermTable,
    options: &ScanOptions,
    scorer: Option<&dyn Similarity>,
) -> Result<ScanReport> {
    let variant_hits = scan_variants(units, table, options.variant_context)?;
    let pairs = extract_pairs(units);
    let diff = diff_pairs(&pairs, table);
    let mut inconsistencies = check_consistency(units, table, options.window)?;
    inconsistencies.extend(check_unit_translations(
        units,
        table,
        options.translation_context,
    )?);
    let unknowns = generate_candidates(units, table, &options.unknown, scorer);

    let report = ScanReport {
        pages: units.len(),
        variant_hits,
        pairs,
        diff,
        inconsistencies,
        unknowns,
    };
    info!("{}", report.summary());
    Ok(report)
}

impl ScanReport {
    fn count(&self, kind: InconsistencyKind) -> usize {
        self.inconsistencies
            .iter()
            .filter(|issue| issue.kind == kind)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "pages {} | variants {} | missing zh {} | first mention {} | unit translation {} | unknown {} | new pairs {} | conflicts {}",
            self.pages,
            self.variant_hits.len(),
            self.count(InconsistencyKind::MissingOrWrongZh),
            self.count(InconsistencyKind::FirstMentionMissingZh),
            self.count(InconsistencyKind::UnitMissingTranslation),
            self.unknowns.len(),
            self.diff.new_items.len(),
            self.diff.conflicts.len(),
        )
    }

    pub fn has_findings(&self) -> bool {
        !self.variant_hits.is_empty()
            || !self.inconsistencies.is_empty()
            || !self.unknowns.is_empty()
            || !self.diff.is_empty()
    }

    /// New pairs as pending records tagged with their extraction provenance.
    pub fn promotable(&self, added_date: &str) -> Vec<TermRecord> {
        self.diff
            .new_items
            .iter()
            .map(|pair| promote_pair(pair, added_date))
            .collect()
    }
}

pub fn promote_pair(pair: &ExtractedPair, added_date: &str) -> TermRecord {
    let mut record = pending_record(&pair.en, &pair.zh, added_date);
    record.abbr = pair.abbr.clone();
    record.first_mention_style = pair.style.clone();
    record
}

/// A pending-new record for a term found by a scan.
pub fn pending_record(en: &str, zh: &str, added_date: &str) -> TermRecord {
    let mut record = TermRecord::new(en, zh);
    record.status = TermStatus::PendingNew;
    record.provenance = EXTRACTED_PROVENANCE.to_string();
    record.added_date = added_date.to_string();
    record
}

/// `YYYY-MM-DD` in UTC.
pub fn today() -> String {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::now_utc()
        .date()
        .format(&format)
        .unwrap_or_default()
}
