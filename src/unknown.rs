use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::document::{TextUnit, joined_text};
use crate::termbase::TermTable;
use crate::text::is_cjk;

static EN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9\-]*(?:\s+[A-Za-z][A-Za-z0-9\-]*){0,3}")
        .expect("valid english token regex")
});

/// Minimum English candidate length when no scorer is available.
const UNSCORED_EN_MIN_LEN: usize = 4;

/// String similarity on a 0–100 scale.
pub trait Similarity {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Case-insensitive indel ratio (`2·LCS / (len_a + len_b)`) that also tries
/// the best partial alignment when one side is much longer than the other.
#[cfg(feature = "fuzzy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRatio;

#[cfg(feature = "fuzzy")]
impl WeightedRatio {
    const PARTIAL_LENGTH_RATIO: f64 = 1.5;
    const PARTIAL_SCALE: f64 = 0.9;
    const LONG_PARTIAL_LENGTH_RATIO: f64 = 8.0;
    const LONG_PARTIAL_SCALE: f64 = 0.6;
}

#[cfg(feature = "fuzzy")]
impl Similarity for WeightedRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.to_lowercase().chars().collect();
        let b: Vec<char> = b.to_lowercase().chars().collect();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let mut best = rapidfuzz::fuzz::ratio(a.iter().copied(), b.iter().copied());

        let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
        let length_ratio = long.len() as f64 / short.len() as f64;
        if length_ratio >= Self::PARTIAL_LENGTH_RATIO {
            let scale = if length_ratio >= Self::LONG_PARTIAL_LENGTH_RATIO {
                Self::LONG_PARTIAL_SCALE
            } else {
                Self::PARTIAL_SCALE
            };
            let partial = long
                .windows(short.len())
                .map(|window| {
                    rapidfuzz::fuzz::ratio(short.iter().copied(), window.iter().copied())
                })
                .fold(0.0_f64, f64::max);
            best = best.max(partial * scale);
        }
        best * 100.0
    }
}

/// The bundled scorer, if compiled in.
pub fn default_scorer() -> Option<Box<dyn Similarity>> {
    #[cfg(feature = "fuzzy")]
    {
        Some(Box::new(WeightedRatio))
    }
    #[cfg(not(feature = "fuzzy"))]
    {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateKind {
    UnknownEn,
    UnknownZh,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateKind::UnknownEn => "UNKNOWN_EN",
            CandidateKind::UnknownZh => "UNKNOWN_ZH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownCandidate {
    pub kind: CandidateKind,
    pub candidate: String,
    pub suggestion: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct UnknownOptions {
    pub zh_ngram_min: usize,
    pub zh_ngram_max: usize,
    pub en_threshold: f64,
    pub zh_threshold: f64,
}

impl Default for UnknownOptions {
    fn default() -> Self {
        Self {
            zh_ngram_min: 4,
            zh_ngram_max: 4,
            en_threshold: 88.0,
            zh_threshold: 86.0,
        }
    }
}

pub fn english_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EN_TOKEN
        .find_iter(text)
        .map(|found| found.as_str().trim().to_string())
        .filter(|token| !token.is_empty() && seen.insert(token.clone()))
        .collect()
}

/// Every substring of each contiguous CJK run with a length in
/// `[min_len, max_len]`, first occurrence order.
pub fn chinese_ngrams(text: &str, min_len: usize, max_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let min_len = min_len.max(1);
    let mut runs: Vec<Vec<char>> = vec![Vec::new()];
    for ch in text.chars() {
        if is_cjk(ch) {
            if let Some(run) = runs.last_mut() {
                run.push(ch);
            }
        } else if runs.last().is_some_and(|run| !run.is_empty()) {
            runs.push(Vec::new());
        }
    }
    for run in &runs {
        for len in min_len..=max_len.min(run.len()) {
            for gram in run.windows(len) {
                let gram: String = gram.iter().collect();
                if seen.insert(gram.clone()) {
                    out.push(gram);
                }
            }
        }
    }
    out
}

fn best_match(scorer: &dyn Similarity, candidate: &str, pool: &[&str]) -> Option<(String, f64)> {
    pool.iter()
        .map(|item| (*item, scorer.score(candidate, item)))
        .fold(None, |best: Option<(&str, f64)>, (item, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((item, score)),
        })
        .map(|(item, score)| (item.to_string(), score))
}

fn classify(
    kind: CandidateKind,
    candidate: String,
    pool: &[&str],
    threshold: f64,
    scorer: Option<&dyn Similarity>,
) -> Option<UnknownCandidate> {
    match scorer {
        Some(scorer) => {
            let (suggestion, score) = best_match(scorer, &candidate, pool)?;
            if score < threshold {
                return None;
            }
            Some(UnknownCandidate {
                kind,
                candidate,
                suggestion: Some(suggestion),
                score: (score * 10.0).round() / 10.0,
            })
        }
        None => {
            if kind == CandidateKind::UnknownEn
                && candidate.chars().count() < UNSCORED_EN_MIN_LEN
            {
                return None;
            }
            Some(UnknownCandidate {
                kind,
                candidate,
                suggestion: None,
                score: 0.0,
            })
        }
    }
}

/// Terms that look like terminology but are absent from the table. With a
/// scorer, only candidates close to a known term are kept, with that term as
/// the suggestion.
pub fn generate_candidates(
    units: &[TextUnit],
    table: &TermTable,
    options: &UnknownOptions,
    scorer: Option<&dyn Similarity>,
) -> Vec<UnknownCandidate> {
    let text = joined_text(units);
    let known_en = table.known_english();
    let known_zh = table.known_chinese();
    let en_pool: Vec<&str> = table
        .iter()
        .flat_map(|record| [record.en.as_str(), record.abbr.as_str()])
        .filter(|value| !value.is_empty())
        .collect();
    let zh_pool: Vec<&str> = table
        .iter()
        .map(|record| record.zh.as_str())
        .filter(|value| !value.is_empty())
        .collect();

    let mut candidates: Vec<UnknownCandidate> = english_tokens(&text)
        .into_iter()
        .filter(|token| !known_en.contains(&token.to_lowercase()))
        .filter_map(|token| {
            classify(
                CandidateKind::UnknownEn,
                token,
                &en_pool,
                options.en_threshold,
                scorer,
            )
        })
        .collect();
    candidates.extend(
        chinese_ngrams(&text, options.zh_ngram_min, options.zh_ngram_max)
            .into_iter()
            .filter(|gram| !known_zh.contains(gram))
            .filter_map(|gram| {
                classify(
                    CandidateKind::UnknownZh,
                    gram,
                    &zh_pool,
                    options.zh_threshold,
                    scorer,
                )
            }),
    );

    candidates.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.candidate.cmp(&b.candidate))
    });
    candidates
}
