use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::text::{CharMap, is_cjk};

/// Builds a matcher source for `token` that tolerates OCR-inserted spaces
/// after CJK characters and loose spacing around hyphens. Every other
/// character matches literally.
pub fn fuzzy_pattern(token: &str) -> String {
    let mut out = String::new();
    for ch in token.trim().chars() {
        if ch.is_whitespace() {
            out.push_str(r"\s+");
        } else if is_cjk(ch) {
            out.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
            out.push_str(r"\s*");
        } else if ch == '-' {
            out.push_str(r"\s*-\s*");
        } else {
            out.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
        }
    }
    out
}

/// A located occurrence, in character offsets of the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    token: String,
    regex: Regex,
}

impl FuzzyMatcher {
    /// Returns `None` for blank tokens, whose pattern would match everywhere.
    pub fn new(token: &str) -> Result<Option<Self>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let regex = RegexBuilder::new(&fuzzy_pattern(token))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("failed to build matcher for '{}'", token))?;
        Ok(Some(Self {
            token: token.to_string(),
            regex,
        }))
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn find_spans(&self, map: &CharMap<'_>, text: &str) -> Vec<Span> {
        self.regex
            .find_iter(text)
            .map(|found| Span {
                start: map.to_char(found.start()),
                end: map.to_char(found.end()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_match(token: &str, text: &str) -> bool {
        RegexBuilder::new(&format!("^(?:{})$", fuzzy_pattern(token)))
            .case_insensitive(true)
            .build()
            .expect("pattern")
            .is_match(text)
    }

    #[test]
    fn ascii_token_matches_itself_only() {
        for token in ["CT", "Stroke", "C.T", "a+b", "IL-6"] {
            assert!(full_match(token, token), "{token}");
        }
        assert!(!full_match("CT", "CxT"));
        assert!(!full_match("Stroke", "Strooke"));
        assert!(!full_match("C.T", "CaT"));
        assert!(full_match("stroke", "STROKE"));
    }

    #[test]
    fn cjk_token_tolerates_inserted_whitespace() {
        assert!(full_match("電腦斷層", "電 腦  斷\t層"));
        assert!(full_match("電腦斷層", "電腦斷層 "));
        assert!(!full_match("電腦斷層", "電腦層"));
        assert!(!full_match("電腦斷層", "電斷層"));
    }

    #[test]
    fn hyphen_and_spaces_are_flexible() {
        assert!(full_match("IL-6", "IL - 6"));
        assert!(full_match("heart failure", "heart   failure"));
        assert!(!full_match("heart failure", "heartfailure"));
    }

    #[test]
    fn blank_token_has_no_matcher() {
        assert!(FuzzyMatcher::new("   ").expect("build").is_none());
    }

    #[test]
    fn spans_are_character_offsets() {
        let text = "病人接受電 腦斷層(CT)";
        let map = CharMap::new(text);
        let matcher = FuzzyMatcher::new("電腦斷層").expect("build").expect("matcher");
        let spans = matcher.find_spans(&map, text);
        assert_eq!(spans, vec![Span { start: 4, end: 9 }]);
    }
}
