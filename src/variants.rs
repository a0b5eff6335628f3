use anyhow::Result;
use serde::Serialize;

use crate::document::TextUnit;
use crate::pattern::FuzzyMatcher;
use crate::termbase::{TermRecord, TermTable};
use crate::text::CharMap;

pub const DEFAULT_CONTEXT: usize = 60;

/// A stored misspelling found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantHit {
    pub page: usize,
    pub position: usize,
    pub variant: String,
    pub en_canonical: String,
    pub zh_canonical: String,
    pub abbr: String,
    pub first_mention_style: String,
    pub context: String,
}

struct CompiledVariant<'a> {
    matcher: FuzzyMatcher,
    record: &'a TermRecord,
}

/// Finds every stored variant of every record, unit by unit. `radius` is the
/// context snippet size either side of a hit.
pub fn scan_variants(
    units: &[TextUnit],
    table: &TermTable,
    radius: usize,
) -> Result<Vec<VariantHit>> {
    let mut compiled = Vec::new();
    for record in table.iter() {
        for variant in &record.variants {
            if let Some(matcher) = FuzzyMatcher::new(variant)? {
                compiled.push(CompiledVariant { matcher, record });
            }
        }
    }

    let mut hits = Vec::new();
    for entry in &compiled {
        for unit in units {
            let map = CharMap::new(&unit.text);
            for span in entry.matcher.find_spans(&map, &unit.text) {
                hits.push(VariantHit {
                    page: unit.page,
                    position: span.start,
                    variant: entry.matcher.token().to_string(),
                    en_canonical: entry.record.en.clone(),
                    zh_canonical: entry.record.zh.clone(),
                    abbr: entry.record.abbr.clone(),
                    first_mention_style: entry.record.first_mention_style.clone(),
                    context: map.context(span.start, span.end, radius),
                });
            }
        }
    }
    Ok(hits)
}
