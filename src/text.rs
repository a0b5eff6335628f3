use regex::Regex;
use std::sync::LazyLock;

static VARIANT_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[,\u{FF0C};/\u{FF0F}\u{3001}]+").expect("valid variant delimiter regex")
});

const ZERO_WIDTH: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}', '\u{00ad}'];

/// Canonicalizes extracted text so matching is insensitive to full-width
/// punctuation, invisible code points and whitespace runs.
pub fn normalize_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        if ZERO_WIDTH.contains(&ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(half_width(ch));
    }
    if pending_space {
        out.push(' ');
    }
    out
}

fn half_width(ch: char) -> char {
    match ch {
        '（' => '(',
        '）' => ')',
        '；' => ';',
        '，' => ',',
        '。' => '.',
        '、' | '／' => '/',
        other => other,
    }
}

pub fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

pub fn contains_cjk(value: &str) -> bool {
    value.chars().any(is_cjk)
}

/// Splits a stored variant cell into its entries.
pub fn split_variants(cell: &str) -> Vec<String> {
    VARIANT_DELIMITERS
        .split(cell.trim())
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

pub fn join_variants(variants: &[String]) -> String {
    variants.join(", ")
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte/char offset bookkeeping for one unit of text. Regex spans are byte
/// based while proximity windows and context snippets count characters.
pub struct CharMap<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> CharMap<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
        starts.push(text.len());
        Self { text, starts }
    }

    pub fn char_len(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn to_char(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Characters `[start, end)`, clamped to the text.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        &self.text[self.starts[start]..self.starts[end]]
    }

    /// `radius` characters either side of the char span `[start, end)`.
    pub fn context(&self, start: usize, end: usize, radius: usize) -> String {
        self.slice(start.saturating_sub(radius), end.saturating_add(radius))
            .to_string()
    }
}
