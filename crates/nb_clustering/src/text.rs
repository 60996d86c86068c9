use nb_core::normalize_text;
use std::collections::BTreeSet;

/// Phrases must be longer than this to earn a bonus.
const MIN_PHRASE_CHARS: usize = 10;
const PHRASE_BONUS: f64 = 0.1;
const MAX_PHRASE_BONUS: f64 = 0.3;

/// A whitespace-delimited word with its surrounding punctuation peeled off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'a> {
    pub word: &'a str,
    pub capitalized: bool,
    /// The raw token ended in punctuation that closes a phrase.
    pub closes: bool,
}

pub(crate) fn tokens(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .filter_map(|raw| {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                return None;
            }
            Some(Token {
                word,
                capitalized: word.chars().next().is_some_and(char::is_uppercase),
                closes: raw
                    .chars()
                    .last()
                    .is_some_and(|c| matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | ')' | '"' | '\u{201d}')),
            })
        })
        .collect()
}

/// Runs of two or more consecutive capitalized words, e.g. "City Council".
pub fn capitalized_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    for token in tokens(text) {
        if token.capitalized {
            run.push(token.word);
            if token.closes {
                flush_run(&mut run, &mut phrases);
            }
        } else {
            flush_run(&mut run, &mut phrases);
        }
    }
    flush_run(&mut run, &mut phrases);
    phrases
}

fn flush_run(run: &mut Vec<&str>, out: &mut Vec<String>) {
    if run.len() >= 2 {
        out.push(run.join(" "));
    }
    run.clear();
}

/// Text between matching straight or curly double quotes.
pub fn quoted_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut open: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        match (c, open) {
            ('"', None) | ('\u{201c}', None) => open = Some(idx + c.len_utf8()),
            ('"', Some(start)) | ('\u{201d}', Some(start)) => {
                let inner = text[start..idx].trim();
                if !inner.is_empty() {
                    phrases.push(inner.to_string());
                }
                open = None;
            }
            _ => {}
        }
    }
    phrases
}

/// Lowercased quoted and capitalized phrases long enough to count as shared context.
pub fn key_phrases(text: &str) -> BTreeSet<String> {
    quoted_phrases(text)
        .into_iter()
        .chain(capitalized_phrases(text))
        .filter(|p| p.chars().count() > MIN_PHRASE_CHARS)
        .map(|p| p.to_lowercase())
        .collect()
}

/// Normalized words longer than two characters. Text made only of short words
/// ("EU, UK on AI") keeps all of them instead of collapsing to nothing.
pub fn word_set(text: &str) -> BTreeSet<String> {
    let normalized = normalize_text(text);
    let long: BTreeSet<String> = normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();
    if !long.is_empty() {
        return long;
    }
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Two empty sets share nothing, so their similarity is 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Pre-digested text, so a pair comparison does no tokenizing.
#[derive(Debug, Clone, Default)]
pub struct TextFeatures {
    lowered: String,
    words: BTreeSet<String>,
    phrases: BTreeSet<String>,
}

impl TextFeatures {
    pub fn new(text: &str) -> Self {
        Self {
            lowered: text.to_lowercase(),
            words: word_set(text),
            phrases: key_phrases(text),
        }
    }

    pub fn words(&self) -> &BTreeSet<String> {
        &self.words
    }

    /// +0.1 per phrase found in both texts, at most 0.3.
    pub fn phrase_bonus(&self, other: &TextFeatures) -> f64 {
        let shared = self
            .phrases
            .union(&other.phrases)
            .filter(|p| self.lowered.contains(p.as_str()) && other.lowered.contains(p.as_str()))
            .count();
        (shared as f64 * PHRASE_BONUS).min(MAX_PHRASE_BONUS)
    }

    pub fn similarity(&self, other: &TextFeatures) -> f64 {
        (jaccard(&self.words, &other.words) + self.phrase_bonus(other)).min(1.0)
    }
}

/// Jaccard over word sets plus the shared-phrase bonus, clamped to 1.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    TextFeatures::new(a).similarity(&TextFeatures::new(b))
}
