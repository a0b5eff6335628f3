use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::consistency::Inconsistency;
use crate::diff::{Conflict, ConflictKind};
use crate::pairs::ExtractedPair;
use crate::scan::ScanReport;
use crate::text::contains_cjk;
use crate::unknown::UnknownCandidate;
use crate::variants::VariantHit;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
pub const KNOWN_VARIANT: &str = "KNOWN_VARIANT";
pub const NEW_PAIR: &str = "NEW_PAIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(ReportFormat::Csv),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// One line of the flat issue report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "type")]
    pub kind: String,
    pub page: Option<usize>,
    pub position: Option<usize>,
    pub matched: String,
    pub expected: String,
    pub en_canonical: String,
    pub zh_canonical: String,
    pub status: String,
    pub severity: String,
    pub context: String,
}

impl From<&VariantHit> for ReportRow {
    fn from(hit: &VariantHit) -> Self {
        let expected = if contains_cjk(&hit.variant) {
            &hit.zh_canonical
        } else {
            &hit.en_canonical
        };
        Self {
            kind: KNOWN_VARIANT.to_string(),
            page: Some(hit.page),
            position: Some(hit.position),
            matched: hit.variant.clone(),
            expected: expected.clone(),
            en_canonical: hit.en_canonical.clone(),
            zh_canonical: hit.zh_canonical.clone(),
            context: hit.context.clone(),
            ..Self::default()
        }
    }
}

impl From<&Inconsistency> for ReportRow {
    fn from(issue: &Inconsistency) -> Self {
        Self {
            kind: issue.kind.as_str().to_string(),
            page: Some(issue.page),
            position: Some(issue.position),
            matched: issue.term.clone(),
            expected: issue.expected.clone(),
            en_canonical: issue.en_canonical.clone(),
            zh_canonical: issue.zh_canonical.clone(),
            context: issue.context.clone(),
            ..Self::default()
        }
    }
}

impl From<&Conflict> for ReportRow {
    fn from(conflict: &Conflict) -> Self {
        let (matched, expected) = match conflict.kind {
            ConflictKind::EnSameZhDifferent => (&conflict.extracted_zh, &conflict.stored_zh),
            ConflictKind::ZhSameEnDifferent => (&conflict.extracted_en, &conflict.stored_en),
        };
        Self {
            kind: conflict.kind.as_str().to_string(),
            page: Some(conflict.page),
            position: Some(conflict.position),
            matched: matched.clone(),
            expected: expected.clone(),
            en_canonical: conflict.stored_en.clone(),
            zh_canonical: conflict.stored_zh.clone(),
            status: conflict.stored_status.as_str().to_string(),
            severity: conflict.severity.as_str().to_string(),
            context: conflict.context.clone(),
        }
    }
}

impl From<&ExtractedPair> for ReportRow {
    fn from(pair: &ExtractedPair) -> Self {
        Self {
            kind: NEW_PAIR.to_string(),
            page: Some(pair.page),
            position: Some(pair.position),
            matched: pair.style.clone(),
            en_canonical: pair.en.clone(),
            zh_canonical: pair.zh.clone(),
            context: pair.context.clone(),
            ..Self::default()
        }
    }
}

impl From<&UnknownCandidate> for ReportRow {
    fn from(candidate: &UnknownCandidate) -> Self {
        Self {
            kind: candidate.kind.as_str().to_string(),
            matched: candidate.candidate.clone(),
            expected: candidate.suggestion.clone().unwrap_or_default(),
            context: if candidate.suggestion.is_some() {
                format!("score {:.1}", candidate.score)
            } else {
                String::new()
            },
            ..Self::default()
        }
    }
}

pub fn report_rows(report: &ScanReport) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = report.variant_hits.iter().map(ReportRow::from).collect();
    rows.extend(report.inconsistencies.iter().map(ReportRow::from));
    rows.extend(report.diff.conflicts.iter().map(ReportRow::from));
    rows.extend(report.diff.new_items.iter().map(ReportRow::from));
    rows.extend(report.unknowns.iter().map(ReportRow::from));
    rows
}

/// Compact one-line-per-finding rendering for the terminal.
pub fn text_lines(report: &ScanReport) -> Vec<String> {
    report_rows(report)
        .into_iter()
        .map(|row| {
            let location = match (row.page, row.position) {
                (Some(page), Some(position)) => format!(" p{}:{}", page, position),
                _ => String::new(),
            };
            let mut line = format!("{}{} {}", row.kind, location, row.matched);
            if !row.expected.is_empty() {
                line.push_str(&format!(" -> {}", row.expected));
            }
            if !row.severity.is_empty() {
                line.push_str(&format!(" [{}]", row.severity));
            }
            if !row.context.is_empty() {
                line.push_str(&format!(" | {}", row.context));
            }
            line
        })
        .collect()
}

pub fn render_report(report: &ScanReport, format: ReportFormat) -> Result<Vec<u8>> {
    match format {
        ReportFormat::Csv => {
            let mut out = UTF8_BOM.to_vec();
            {
                let mut writer = csv::Writer::from_writer(&mut out);
                let rows = report_rows(report);
                if rows.is_empty() {
                    writer.write_record([
                        "type",
                        "page",
                        "position",
                        "matched",
                        "expected",
                        "en_canonical",
                        "zh_canonical",
                        "status",
                        "severity",
                        "context",
                    ])?;
                }
                for row in rows {
                    writer.serialize(row)?;
                }
                writer.flush()?;
            }
            Ok(out)
        }
        ReportFormat::Json => {
            let mut out = serde_json::to_vec_pretty(report)?;
            out.push(b'\n');
            Ok(out)
        }
    }
}

pub fn write_report(report: &ScanReport, format: ReportFormat, path: &Path) -> Result<()> {
    let bytes = render_report(report, format)?;
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unknown::CandidateKind;

    fn render_csv(report: &ScanReport) -> String {
        let bytes = render_report(report, ReportFormat::Csv).expect("render");
        assert!(bytes.starts_with(UTF8_BOM));
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("utf8")
    }

    #[test]
    fn empty_report_still_has_a_header() {
        let csv = render_csv(&ScanReport::default());
        assert_eq!(
            csv,
            "type,page,position,matched,expected,en_canonical,zh_canonical,status,severity,context\n"
        );
    }

    #[test]
    fn unknown_rows_leave_location_blank() {
        let report = ScanReport {
            unknowns: vec![UnknownCandidate {
                kind: CandidateKind::UnknownEn,
                candidate: "Storke".to_string(),
                suggestion: Some("Stroke".to_string()),
                score: 66.7,
            }],
            ..ScanReport::default()
        };
        let csv = render_csv(&report);
        assert_eq!(csv.lines().nth(1), Some("UNKNOWN_EN,,,Storke,Stroke,,,,,score 66.7"));
    }

    #[test]
    fn text_lines_show_location_and_expectation() {
        let report = ScanReport {
            variant_hits: vec![VariantHit {
                page: 2,
                position: 3,
                variant: "腦中瘋".to_string(),
                en_canonical: "Stroke".to_string(),
                zh_canonical: "腦中風".to_string(),
                abbr: String::new(),
                first_mention_style: "ZH(EN;ABBR)".to_string(),
                context: "急性腦中瘋".to_string(),
            }],
            ..ScanReport::default()
        };
        assert_eq!(
            text_lines(&report),
            vec!["KNOWN_VARIANT p2:3 腦中瘋 -> 腦中風 | 急性腦中瘋"]
        );
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ReportFormat::from_path(Path::new("out/REPORT.JSON")),
            Some(ReportFormat::Json)
        );
        assert_eq!(ReportFormat::from_path(Path::new("report.txt")), None);
    }
}
