use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::document::TextUnit;
use crate::termbase::DEFAULT_STYLE;
use crate::text::{CharMap, collapse_whitespace};

pub const PAREN_STYLE: &str = "ZH(EN)";
const CONTEXT_RADIUS: usize = 50;

const ZH: &str = r"[一-龥]{2,30}";
const EN: &str = r"[A-Za-z][A-Za-z0-9\-\s]{1,80}";
const ABBR: &str = r"[A-Za-z][A-Za-z0-9\-]{1,10}";

struct PairPattern {
    regex: Regex,
    style: &'static str,
}

/// Surface forms that co-locate a Chinese and an English term, in
/// precedence order. All of them run over the same text.
static PAIR_PATTERNS: LazyLock<Vec<PairPattern>> = LazyLock::new(|| {
    let build = |source: String, style: &'static str| PairPattern {
        regex: Regex::new(&source).expect("valid pair regex"),
        style,
    };
    vec![
        build(
            format!(
                r"(?P<zh>{ZH})\s*[\(（]\s*(?P<en>{EN})(?:\s*;\s*|；\s*)(?P<abbr>{ABBR})\s*[\)）]"
            ),
            DEFAULT_STYLE,
        ),
        build(
            format!(r"(?P<zh>{ZH})\s*[\(（]\s*(?P<en>{EN})\s*[\)）]"),
            PAREN_STYLE,
        ),
        build(
            format!(r"(?P<en>{EN})\s*[\(（]\s*(?P<zh>{ZH})\s*[\)）]"),
            PAREN_STYLE,
        ),
        build(format!(r"(?P<en>{EN})\s*[-－]\s*(?P<zh>{ZH})"), PAREN_STYLE),
        build(format!(r"(?P<zh>{ZH})\s*[-－]\s*(?P<en>{EN})"), PAREN_STYLE),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedPair {
    pub en: String,
    pub zh: String,
    pub abbr: String,
    pub style: String,
    pub page: usize,
    /// Character offset of the match within the unit text.
    pub position: usize,
    pub context: String,
}

impl ExtractedPair {
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.en, &self.zh, &self.abbr)
    }
}

pub fn extract_pairs(units: &[TextUnit]) -> Vec<ExtractedPair> {
    let mut pairs = Vec::new();
    for unit in units {
        let map = CharMap::new(&unit.text);
        for pattern in PAIR_PATTERNS.iter() {
            for caps in pattern.regex.captures_iter(&unit.text) {
                if let Some(pair) = build_pair(&caps, pattern.style, unit.page, &map) {
                    pairs.push(pair);
                }
            }
        }
    }
    dedup_pairs(pairs)
}

fn build_pair(
    caps: &Captures<'_>,
    style: &str,
    page: usize,
    map: &CharMap<'_>,
) -> Option<ExtractedPair> {
    let whole = caps.get(0)?;
    let en = collapse_whitespace(caps.name("en")?.as_str());
    let zh = caps.name("zh")?.as_str().trim().to_string();
    let abbr = caps
        .name("abbr")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    if en.is_empty() || zh.is_empty() {
        return None;
    }
    let start = map.to_char(whole.start());
    let end = map.to_char(whole.end());
    Some(ExtractedPair {
        en,
        zh,
        abbr,
        style: style.to_string(),
        page,
        position: start,
        context: map.context(start, end, CONTEXT_RADIUS),
    })
}

fn dedup_pairs(pairs: Vec<ExtractedPair>) -> Vec<ExtractedPair> {
    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter(|pair| {
            seen.insert((pair.en.clone(), pair.zh.clone(), pair.abbr.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::split_plain_units;

    #[test]
    fn chinese_with_english_and_abbreviation() {
        let units = split_plain_units("腦中風(Stroke;CVA)");
        let pairs = extract_pairs(&units);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.en, "Stroke");
        assert_eq!(pair.zh, "腦中風");
        assert_eq!(pair.abbr, "CVA");
        assert_eq!(pair.style, "ZH(EN;ABBR)");
        assert_eq!(pair.page, 1);
        assert_eq!(pair.position, 0);
    }

    #[test]
    fn full_width_input_is_normalized_first() {
        let units = split_plain_units("腦中風（Stroke；CVA）");
        let pairs = extract_pairs(&units);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].abbr, "CVA");
    }

    #[test]
    fn english_before_chinese_and_hyphen_forms() {
        let units = split_plain_units(
            "Computed Tomography (電腦斷層)\u{c}Magnetic  Resonance - 磁振造影\u{c}心電圖-Electrocardiogram",
        );
        let pairs = extract_pairs(&units);
        let found: Vec<(&str, &str, usize)> = pairs
            .iter()
            .map(|p| (p.en.as_str(), p.zh.as_str(), p.page))
            .collect();
        assert!(found.contains(&("Computed Tomography", "電腦斷層", 1)));
        assert!(found.contains(&("Magnetic Resonance", "磁振造影", 2)));
        assert!(found.contains(&("Electrocardiogram", "心電圖", 3)));
        assert!(pairs.iter().all(|p| p.style == PAREN_STYLE));
    }

    #[test]
    fn overlapping_patterns_each_yield_a_pair() {
        // "Stroke - 腦中風(CVA)" is both an en-zh hyphen pair and a zh(en) pair.
        let units = split_plain_units("Stroke - 腦中風(CVA)");
        let pairs = extract_pairs(&units);
        let keys: Vec<(&str, &str)> = pairs
            .iter()
            .map(|p| (p.en.as_str(), p.zh.as_str()))
            .collect();
        assert!(keys.contains(&("CVA", "腦中風")));
        assert!(keys.contains(&("Stroke", "腦中風")));
    }

    #[test]
    fn duplicates_are_dropped() {
        let units = split_plain_units("腦中風(Stroke) 腦中風(Stroke)\u{c}腦中風(Stroke)");
        assert_eq!(extract_pairs(&units).len(), 1);
    }
}
