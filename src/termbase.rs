use serde::{Serialize, Serializer};
use std::collections::HashSet;
use tracing::warn;

use crate::text::{join_variants, split_variants};

pub const DEFAULT_STYLE: &str = "ZH(EN;ABBR)";
pub const DEFAULT_PROVENANCE: &str = "manual";
pub const EXTRACTED_PROVENANCE: &str = "pdf-extract";

/// Canonical termbase columns, in stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    En,
    Zh,
    Abbr,
    Style,
    Variants,
    Status,
    AddedDate,
    Provenance,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::En,
        Field::Zh,
        Field::Abbr,
        Field::Style,
        Field::Variants,
        Field::Status,
        Field::AddedDate,
        Field::Provenance,
    ];

    pub fn header(&self) -> &'static str {
        self.aliases()[0]
    }

    /// Accepted input headers, most specific first. The first entry is the
    /// stored header name.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::En => &[
                "en_canonical",
                "english",
                "en",
                "term_en",
                "canonical_en",
                "標準英文",
                "英文",
            ],
            Field::Zh => &[
                "zh_canonical",
                "chinese",
                "zh",
                "term_zh",
                "canonical_zh",
                "標準中文",
                "中文",
                "繁體中文",
            ],
            Field::Abbr => &["abbr", "abbreviation", "縮寫"],
            Field::Style => &[
                "first_mention_style",
                "style",
                "首次顯示規則",
                "first-mention",
            ],
            Field::Variants => &[
                "variant (錯誤用法)",
                "variant",
                "variants",
                "錯誤用法",
                "錯字",
                "typo",
                "misspelling",
            ],
            Field::Status => &["status", "狀態"],
            Field::AddedDate => &["added_date", "added_at", "added", "新增日期"],
            Field::Provenance => &["provenance", "source", "翻譯來源", "來源"],
        }
    }

    fn is_required(&self) -> bool {
        matches!(self, Field::En | Field::Zh | Field::Variants)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TermStatus {
    #[default]
    Confirmed,
    PendingNew,
    Other(String),
}

impl TermStatus {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "confirmed" | "已確認" => TermStatus::Confirmed,
            "pending-new" | "pending" | "新增待確認" => TermStatus::PendingNew,
            _ => TermStatus::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TermStatus::Confirmed => "confirmed",
            TermStatus::PendingNew => "pending-new",
            TermStatus::Other(value) => value.as_str(),
        }
    }
}

impl Serialize for TermStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermRecord {
    pub en: String,
    pub zh: String,
    pub abbr: String,
    pub first_mention_style: String,
    pub variants: Vec<String>,
    pub status: TermStatus,
    pub provenance: String,
    pub added_date: String,
}

impl TermRecord {
    pub fn new(en: &str, zh: &str) -> Self {
        Self {
            en: en.trim().to_string(),
            zh: zh.trim().to_string(),
            abbr: String::new(),
            first_mention_style: DEFAULT_STYLE.to_string(),
            variants: Vec::new(),
            status: TermStatus::Confirmed,
            provenance: DEFAULT_PROVENANCE.to_string(),
            added_date: String::new(),
        }
    }

    pub fn key(&self) -> (&str, &str, &str) {
        (&self.en, &self.zh, &self.abbr)
    }

    /// Whether the first mention must carry the Chinese term.
    pub fn requires_zh_first(&self) -> bool {
        self.first_mention_style.to_uppercase().starts_with("ZH(")
    }

    fn fill_defaults(&mut self) {
        self.en = self.en.trim().to_string();
        self.zh = self.zh.trim().to_string();
        self.abbr = self.abbr.trim().to_string();
        self.first_mention_style = self.first_mention_style.trim().to_string();
        if self.first_mention_style.is_empty() {
            self.first_mention_style = DEFAULT_STYLE.to_string();
        }
        self.provenance = self.provenance.trim().to_string();
        if self.provenance.is_empty() {
            self.provenance = DEFAULT_PROVENANCE.to_string();
        }
        self.added_date = self.added_date.trim().to_string();
        self.variants = self
            .variants
            .iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
    }
}

/// A table as read from a store: arbitrary headers, ragged rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermTable {
    records: Vec<TermRecord>,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: TermTable,
    /// Canonical field to the input header it was read from.
    pub mapping: Vec<(Field, String)>,
    pub warnings: Vec<String>,
}

fn missing_column_warning(field: Field) -> Option<String> {
    match field {
        Field::Abbr => Some("missing column abbr; filled with empty values".to_string()),
        Field::Style => Some(format!(
            "missing column first_mention_style; filled with {}",
            DEFAULT_STYLE
        )),
        field if field.is_required() => {
            Some(format!("missing required column: {}", field.header()))
        }
        _ => None,
    }
}

pub fn header_key(header: &str) -> String {
    let replaced = header.trim().replace('（', "(").replace('）', ")");
    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolves an arbitrary input table into the fixed termbase schema.
pub fn normalize_table(raw: &RawTable) -> Normalized {
    let keys: Vec<String> = raw.headers.iter().map(|h| header_key(h)).collect();
    let mut mapping = Vec::new();
    let mut columns: Vec<(Field, Option<usize>)> = Vec::new();
    let mut warnings = Vec::new();

    for field in Field::ALL {
        let column = field.aliases().iter().find_map(|alias| {
            let alias_key = header_key(alias);
            keys.iter().position(|key| *key == alias_key)
        });
        match column {
            Some(idx) => mapping.push((field, raw.headers[idx].clone())),
            None if !raw.is_empty() => {
                if let Some(warning) = missing_column_warning(field) {
                    warnings.push(warning);
                }
            }
            None => {}
        }
        columns.push((field, column));
    }
    for warning in &warnings {
        warn!("{}", warning);
    }

    let index_of = |field: Field| {
        columns
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, idx)| *idx)
    };
    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        let mut record = TermRecord::new(
            cell(row, index_of(Field::En)),
            cell(row, index_of(Field::Zh)),
        );
        record.abbr = cell(row, index_of(Field::Abbr)).to_string();
        record.first_mention_style = cell(row, index_of(Field::Style)).to_string();
        record.variants = split_variants(cell(row, index_of(Field::Variants)));
        record.status = TermStatus::parse(cell(row, index_of(Field::Status)));
        record.provenance = cell(row, index_of(Field::Provenance)).to_string();
        record.added_date = cell(row, index_of(Field::AddedDate)).to_string();
        records.push(record);
    }

    Normalized {
        table: TermTable::from_records(records),
        mapping,
        warnings,
    }
}

fn cell(row: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|idx| row.get(idx))
        .map(|value| value.as_str())
        .unwrap_or("")
}

impl TermTable {
    /// Fills defaults, drops rows with neither English nor Chinese, and keeps
    /// the first record of every `(en, zh, abbr)` key.
    pub fn from_records(records: Vec<TermRecord>) -> Self {
        let mut table = Self::default();
        table.extend(records);
        table
    }

    pub fn records(&self) -> &[TermRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_key(&self, en: &str, zh: &str, abbr: &str) -> bool {
        self.records.iter().any(|record| record.key() == (en, zh, abbr))
    }

    /// Appends records, returning how many were not already present.
    pub fn extend(&mut self, records: Vec<TermRecord>) -> usize {
        let mut seen: HashSet<(String, String, String)> = self
            .records
            .iter()
            .map(|record| (record.en.clone(), record.zh.clone(), record.abbr.clone()))
            .collect();
        let mut added = 0;
        for mut record in records {
            record.fill_defaults();
            if record.en.is_empty() && record.zh.is_empty() {
                continue;
            }
            let key = (record.en.clone(), record.zh.clone(), record.abbr.clone());
            if !seen.insert(key) {
                continue;
            }
            self.records.push(record);
            added += 1;
        }
        added
    }

    pub fn with_status(&self, status: &TermStatus) -> Vec<&TermRecord> {
        self.records
            .iter()
            .filter(|record| &record.status == status)
            .collect()
    }

    /// Lowercased English terms and abbreviations.
    pub fn known_english(&self) -> HashSet<String> {
        let mut known = HashSet::new();
        for record in &self.records {
            if !record.en.is_empty() {
                known.insert(record.en.to_lowercase());
            }
            if !record.abbr.is_empty() {
                known.insert(record.abbr.to_lowercase());
            }
        }
        known
    }

    pub fn known_chinese(&self) -> HashSet<String> {
        self.records
            .iter()
            .filter(|record| !record.zh.is_empty())
            .map(|record| record.zh.clone())
            .collect()
    }

    pub fn to_raw(&self) -> RawTable {
        let headers = Field::ALL
            .iter()
            .map(|field| field.header().to_string())
            .collect();
        let rows = self
            .records
            .iter()
            .map(|record| {
                vec![
                    record.en.clone(),
                    record.zh.clone(),
                    record.abbr.clone(),
                    record.first_mention_style.clone(),
                    join_variants(&record.variants),
                    record.status.as_str().to_string(),
                    record.added_date.clone(),
                    record.provenance.clone(),
                ]
            })
            .collect();
        RawTable { headers, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn resolves_aliases_and_fills_defaults() {
        let input = raw(
            &["English", " 中文 ", "Variant （錯誤用法）"],
            &[&["Stroke", "腦中風", "腦中瘋、脑中风"]],
        );
        let normalized = normalize_table(&input);
        let record = &normalized.table.records()[0];
        assert_eq!(record.en, "Stroke");
        assert_eq!(record.zh, "腦中風");
        assert_eq!(record.abbr, "");
        assert_eq!(record.first_mention_style, DEFAULT_STYLE);
        assert_eq!(record.variants, vec!["腦中瘋", "脑中风"]);
        assert_eq!(record.status, TermStatus::Confirmed);
        assert_eq!(record.provenance, DEFAULT_PROVENANCE);
        assert_eq!(normalized.warnings.len(), 2);
        assert!(normalized.mapping.contains(&(Field::Zh, " 中文 ".to_string())));
    }

    #[test]
    fn missing_required_columns_warn_and_default_to_empty() {
        let input = raw(&["abbr"], &[&["CT"]]);
        let normalized = normalize_table(&input);
        assert!(normalized
            .warnings
            .iter()
            .any(|w| w.contains("en_canonical")));
        assert!(normalized
            .warnings
            .iter()
            .any(|w| w.contains("variant (錯誤用法)")));
        // Neither English nor Chinese survives, so the row is dropped.
        assert!(normalized.table.is_empty());
    }

    #[test]
    fn first_alias_wins() {
        let input = raw(&["en", "en_canonical", "zh"], &[&["short", "long", "甲"]]);
        let normalized = normalize_table(&input);
        assert_eq!(normalized.table.records()[0].en, "long");
    }

    #[test]
    fn deduplicates_on_english_chinese_abbreviation() {
        let input = raw(
            &["en_canonical", "zh_canonical", "abbr", "status"],
            &[
                &["Stroke", "腦中風", "CVA", "已確認"],
                &["Stroke", "腦中風", "CVA", "新增待確認"],
                &["Stroke", "腦中風", "", ""],
            ],
        );
        let table = normalize_table(&input).table;
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].status, TermStatus::Confirmed);
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = raw(
            &["term_en", "term_zh", "typo", "style", "翻譯來源", "狀態"],
            &[
                &["Stroke", "腦中風", "腦中瘋;脑中风", "", "", "新增待確認"],
                &["Computed Tomography", "電腦斷層", "", "ZH(EN)", "PDF", "reviewing"],
                &["Stroke", "腦中風", "x", "", "", ""],
            ],
        );
        let once = normalize_table(&input).table;
        let twice = normalize_table(&once.to_raw());
        assert_eq!(twice.table, once);
        assert!(twice.warnings.is_empty());
        assert_eq!(once.to_raw().headers[4], "variant (錯誤用法)");
    }

    #[test]
    fn extend_reports_only_new_rows() {
        let mut table = TermTable::from_records(vec![TermRecord::new("CT", "電腦斷層")]);
        let added = table.extend(vec![
            TermRecord::new("CT", "電腦斷層"),
            TermRecord::new("MRI", "磁振造影"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn first_mention_rule_is_case_insensitive() {
        let mut record = TermRecord::new("CT", "電腦斷層");
        assert!(record.requires_zh_first());
        record.first_mention_style = "zh(en)".to_string();
        assert!(record.requires_zh_first());
        record.first_mention_style = "EN".to_string();
        assert!(!record.requires_zh_first());
    }
}
