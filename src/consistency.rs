use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;

use crate::document::{TextUnit, UnitSource};
use crate::pattern::FuzzyMatcher;
use crate::termbase::{TermRecord, TermTable};
use crate::text::CharMap;

pub const DEFAULT_WINDOW: usize = 80;
pub const DEFAULT_TRANSLATION_CONTEXT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    MissingOrWrongZh,
    FirstMentionMissingZh,
    UnitMissingTranslation,
}

impl InconsistencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InconsistencyKind::MissingOrWrongZh => "MISSING_OR_WRONG_ZH",
            InconsistencyKind::FirstMentionMissingZh => "FIRST_MENTION_MISSING_ZH",
            InconsistencyKind::UnitMissingTranslation => "UNIT_MISSING_TRANSLATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub page: usize,
    pub position: usize,
    /// Term found in the text.
    pub term: String,
    /// Counterpart that should have been nearby.
    pub expected: String,
    pub en_canonical: String,
    pub zh_canonical: String,
    pub abbr: String,
    pub context: String,
}

impl Inconsistency {
    fn new(
        kind: InconsistencyKind,
        unit: &TextUnit,
        position: usize,
        term: &str,
        expected: &str,
        record: &TermRecord,
        context: String,
    ) -> Self {
        Self {
            kind,
            page: unit.page,
            position,
            term: term.to_string(),
            expected: expected.to_string(),
            en_canonical: record.en.clone(),
            zh_canonical: record.zh.clone(),
            abbr: record.abbr.clone(),
            context,
        }
    }
}

struct TermMatchers<'a> {
    record: &'a TermRecord,
    en: Option<FuzzyMatcher>,
    zh: Option<FuzzyMatcher>,
}

fn compile(table: &TermTable) -> Result<Vec<TermMatchers<'_>>> {
    let mut compiled = Vec::with_capacity(table.len());
    for record in table.iter() {
        compiled.push(TermMatchers {
            record,
            en: FuzzyMatcher::new(&record.en)?,
            zh: FuzzyMatcher::new(&record.zh)?,
        });
    }
    Ok(compiled)
}

struct Hit<'a> {
    start: usize,
    end: usize,
    record: &'a TermRecord,
}

fn zh_hits<'a>(compiled: &[TermMatchers<'a>], map: &CharMap<'_>, text: &str) -> Vec<Hit<'a>> {
    let mut hits = Vec::new();
    for entry in compiled {
        if let Some(matcher) = &entry.zh {
            hits.extend(matcher.find_spans(map, text).into_iter().map(|span| Hit {
                start: span.start,
                end: span.end,
                record: entry.record,
            }));
        }
    }
    hits
}

fn zh_near(hits: &[Hit<'_>], es: usize, window: usize, expected: &str) -> bool {
    hits.iter()
        .any(|hit| hit.start.abs_diff(es) <= window && hit.record.zh == expected)
}

/// Checks that every canonical English occurrence has its canonical Chinese
/// within `window` characters, and that the first mention of each
/// `ZH(...)`-styled term carries the Chinese. First-mention tracking spans
/// all units in order.
pub fn check_consistency(
    units: &[TextUnit],
    table: &TermTable,
    window: usize,
) -> Result<Vec<Inconsistency>> {
    let compiled = compile(table)?;
    let mut issues = Vec::new();
    let mut first_mentions = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for unit in units {
        let map = CharMap::new(&unit.text);
        let zh = zh_hits(&compiled, &map, &unit.text);
        for entry in &compiled {
            let Some(en) = &entry.en else {
                continue;
            };
            let record = entry.record;
            if record.zh.is_empty() {
                continue;
            }
            for span in en.find_spans(&map, &unit.text) {
                let near = zh_near(&zh, span.start, window, &record.zh);
                let context = || map.context(span.start, span.end, window);
                if !near {
                    issues.push(Inconsistency::new(
                        InconsistencyKind::MissingOrWrongZh,
                        unit,
                        span.start,
                        &record.en,
                        &record.zh,
                        record,
                        context(),
                    ));
                }
                if !seen.insert(record.en.to_lowercase()) {
                    continue;
                }
                if record.requires_zh_first() && !near {
                    first_mentions.push(Inconsistency::new(
                        InconsistencyKind::FirstMentionMissingZh,
                        unit,
                        span.start,
                        &record.en,
                        &record.zh,
                        record,
                        context(),
                    ));
                }
            }
        }
    }

    issues.extend(first_mentions);
    Ok(issues)
}

/// Bidirectional check for OCR'd and plain-text units: each canonical term
/// needs its counterpart somewhere within `radius` characters. Each English
/// term is checked against its first record only, and likewise each Chinese
/// term.
pub fn check_unit_translations(
    units: &[TextUnit],
    table: &TermTable,
    radius: usize,
) -> Result<Vec<Inconsistency>> {
    let compiled = compile(table)?;
    let mut seen_en = HashSet::new();
    let mut seen_zh = HashSet::new();
    let mut check_en = Vec::with_capacity(compiled.len());
    let mut check_zh = Vec::with_capacity(compiled.len());
    for entry in &compiled {
        check_en.push(seen_en.insert(entry.record.en.to_lowercase()));
        check_zh.push(seen_zh.insert(entry.record.zh.clone()));
    }

    let mut issues = Vec::new();
    for unit in units
        .iter()
        .filter(|unit| matches!(unit.source, UnitSource::Ocr | UnitSource::Plain))
    {
        let map = CharMap::new(&unit.text);
        for (idx, entry) in compiled.iter().enumerate() {
            let record = entry.record;
            let (Some(en), Some(zh)) = (&entry.en, &entry.zh) else {
                continue;
            };
            if check_en[idx] {
                for span in en.find_spans(&map, &unit.text) {
                    let context = map.context(span.start, span.end, radius);
                    if !zh.is_match(&context) {
                        issues.push(Inconsistency::new(
                            InconsistencyKind::UnitMissingTranslation,
                            unit,
                            span.start,
                            &record.en,
                            &record.zh,
                            record,
                            context,
                        ));
                    }
                }
            }
            if check_zh[idx] {
                for span in zh.find_spans(&map, &unit.text) {
                    let context = map.context(span.start, span.end, radius);
                    if !en.is_match(&context) {
                        issues.push(Inconsistency::new(
                            InconsistencyKind::UnitMissingTranslation,
                            unit,
                            span.start,
                            &record.zh,
                            &record.en,
                            record,
                            context,
                        ));
                    }
                }
            }
        }
    }
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(page: usize, text: &str, source: UnitSource) -> TextUnit {
        TextUnit {
            page,
            text: text.to_string(),
            source,
        }
    }

    fn ct_table() -> TermTable {
        TermTable::from_records(vec![TermRecord::new("CT", "電腦斷層")])
    }

    fn count(issues: &[Inconsistency], kind: InconsistencyKind) -> usize {
        issues.iter().filter(|issue| issue.kind == kind).count()
    }

    #[test]
    fn english_without_chinese_is_flagged_once() {
        let units = vec![unit(1, "CT", UnitSource::PdfText)];
        let issues = check_consistency(&units, &ct_table(), DEFAULT_WINDOW).expect("check");
        assert_eq!(count(&issues, InconsistencyKind::MissingOrWrongZh), 1);
        assert_eq!(issues[0].expected, "電腦斷層");
        assert_eq!(issues[0].context, "CT");
    }

    #[test]
    fn nearby_chinese_satisfies_the_check() {
        let units = vec![unit(1, "電腦斷層(CT)", UnitSource::PdfText)];
        let issues = check_consistency(&units, &ct_table(), DEFAULT_WINDOW).expect("check");
        assert!(issues.is_empty());
    }

    #[test]
    fn window_is_inclusive() {
        let units = vec![unit(1, "CT---------電腦斷層", UnitSource::PdfText)];
        let table = ct_table();
        let issues = check_consistency(&units, &table, 10).expect("check");
        assert_eq!(count(&issues, InconsistencyKind::MissingOrWrongZh), 1);
        assert!(check_consistency(&units, &table, 11).expect("check").is_empty());
    }

    #[test]
    fn wrong_chinese_nearby_does_not_count() {
        let table = TermTable::from_records(vec![
            TermRecord::new("CT", "電腦斷層"),
            TermRecord::new("MRI", "磁振造影"),
        ]);
        let units = vec![unit(1, "磁振造影 CT", UnitSource::PdfText)];
        let issues = check_consistency(&units, &table, DEFAULT_WINDOW).expect("check");
        assert_eq!(count(&issues, InconsistencyKind::MissingOrWrongZh), 1);
        assert_eq!(issues[0].term, "CT");
    }

    #[test]
    fn first_mention_is_only_checked_once_across_units() {
        let units = vec![
            unit(1, "CT scan", UnitSource::PdfText),
            unit(2, "CT again", UnitSource::PdfText),
        ];
        let issues = check_consistency(&units, &ct_table(), DEFAULT_WINDOW).expect("check");
        assert_eq!(count(&issues, InconsistencyKind::MissingOrWrongZh), 2);
        let first: Vec<_> = issues
            .iter()
            .filter(|issue| issue.kind == InconsistencyKind::FirstMentionMissingZh)
            .collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].page, 1);
    }

    #[test]
    fn english_styled_terms_skip_the_first_mention_rule() {
        let mut record = TermRecord::new("CT", "電腦斷層");
        record.first_mention_style = "EN".to_string();
        let table = TermTable::from_records(vec![record]);
        let units = vec![unit(1, "CT", UnitSource::PdfText)];
        let issues = check_consistency(&units, &table, DEFAULT_WINDOW).expect("check");
        assert_eq!(count(&issues, InconsistencyKind::FirstMentionMissingZh), 0);
    }

    #[test]
    fn unit_translation_check_is_bidirectional() {
        let units = vec![
            unit(1, "電腦斷層 only", UnitSource::Ocr),
            unit(2, "ct only", UnitSource::Plain),
            unit(3, "CT without chinese", UnitSource::PdfText),
            unit(4, "電腦斷層 (ct)", UnitSource::Ocr),
        ];
        let issues =
            check_unit_translations(&units, &ct_table(), DEFAULT_TRANSLATION_CONTEXT)
                .expect("check");
        assert_eq!(issues.len(), 2);
        assert_eq!((issues[0].page, issues[0].term.as_str()), (1, "電腦斷層"));
        assert_eq!(issues[0].expected, "CT");
        assert_eq!((issues[1].page, issues[1].term.as_str()), (2, "CT"));
        assert!(issues
            .iter()
            .all(|issue| issue.kind == InconsistencyKind::UnitMissingTranslation));
    }

    #[test]
    fn shared_english_still_checks_each_new_chinese_term() {
        let table = TermTable::from_records(vec![
            TermRecord::new("CT", "電腦斷層"),
            TermRecord::new("CT", "電腦斷層攝影術"),
        ]);
        let units = vec![unit(1, "只有 電腦斷層攝影術", UnitSource::Ocr)];
        let issues = check_unit_translations(&units, &table, DEFAULT_TRANSLATION_CONTEXT)
            .expect("check");
        let found: Vec<(&str, &str, usize)> = issues
            .iter()
            .map(|issue| (issue.term.as_str(), issue.expected.as_str(), issue.position))
            .collect();
        assert_eq!(found, vec![("電腦斷層", "CT", 3), ("電腦斷層攝影術", "CT", 3)]);
    }

    #[test]
    fn shared_english_is_checked_once() {
        let table = TermTable::from_records(vec![
            TermRecord::new("CT", "電腦斷層"),
            TermRecord::new("CT", "電腦斷層攝影術"),
        ]);
        let units = vec![unit(1, "CT only", UnitSource::Plain)];
        let issues = check_unit_translations(&units, &table, DEFAULT_TRANSLATION_CONTEXT)
            .expect("check");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].expected, "電腦斷層");
    }
}
