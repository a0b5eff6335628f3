use serde::Serialize;

use crate::pairs::ExtractedPair;
use crate::termbase::{TermStatus, TermTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    EnSameZhDifferent,
    ZhSameEnDifferent,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::EnSameZhDifferent => "EN_SAME_ZH_DIFFERENT",
            ConflictKind::ZhSameEnDifferent => "ZH_SAME_EN_DIFFERENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn for_status(status: &TermStatus) -> Self {
        match status {
            TermStatus::Confirmed => Severity::High,
            TermStatus::PendingNew => Severity::Medium,
            TermStatus::Other(_) => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// An extracted pair that disagrees with a stored record on one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub extracted_en: String,
    pub extracted_zh: String,
    pub stored_en: String,
    pub stored_zh: String,
    pub stored_status: TermStatus,
    pub severity: Severity,
    pub page: usize,
    pub position: usize,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TermDiff {
    pub new_items: Vec<ExtractedPair>,
    pub conflicts: Vec<Conflict>,
}

impl TermDiff {
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty() && self.conflicts.is_empty()
    }
}

pub fn diff_pairs(pairs: &[ExtractedPair], table: &TermTable) -> TermDiff {
    let mut diff = TermDiff::default();
    for pair in pairs {
        let (en, zh, abbr) = pair.key();
        if !table.contains_key(en, zh, abbr) {
            diff.new_items.push(pair.clone());
        }
        for record in table.iter() {
            let kind = if record.en == pair.en && record.zh != pair.zh {
                ConflictKind::EnSameZhDifferent
            } else if record.zh == pair.zh && record.en != pair.en {
                ConflictKind::ZhSameEnDifferent
            } else {
                continue;
            };
            diff.conflicts.push(Conflict {
                kind,
                extracted_en: pair.en.clone(),
                extracted_zh: pair.zh.clone(),
                stored_en: record.en.clone(),
                stored_zh: record.zh.clone(),
                stored_status: record.status.clone(),
                severity: Severity::for_status(&record.status),
                page: pair.page,
                position: pair.position,
                context: pair.context.clone(),
            });
        }
    }
    diff
}
