use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashSet};

use crate::text::{capitalized_phrases, tokens};

lazy_static! {
    /// Titles and roles that introduce a proper noun, compared without their trailing period.
    static ref ROLE_WORDS: HashSet<&'static str> = [
        "president", "senator", "sen", "gov", "governor", "mayor", "minister", "secretary",
        "rep", "representative", "judge", "dr", "mr", "mrs", "ms", "ceo", "chancellor",
        "king", "queen", "pope", "general", "prime",
    ]
    .into_iter()
    .collect();
}

/// Named entities in `text`, lowercased: capitalized multi-word phrases and
/// role words followed by a capitalized name ("gov. Newsom", "mayor Adams").
pub fn extract_entities(text: &str) -> BTreeSet<String> {
    let mut entities: BTreeSet<String> = capitalized_phrases(text)
        .into_iter()
        .map(|p| p.to_lowercase())
        .collect();

    let toks = tokens(text);
    for (idx, token) in toks.iter().enumerate() {
        if !ROLE_WORDS.contains(token.word.to_lowercase().as_str()) {
            continue;
        }
        let name: Vec<&str> = toks[idx + 1..]
            .iter()
            .scan(false, |closed, t| {
                if *closed || !t.capitalized {
                    return None;
                }
                *closed = t.closes;
                Some(t.word)
            })
            .collect();
        if !name.is_empty() {
            entities.insert(format!("{} {}", token.word, name.join(" ")).to_lowercase());
        }
    }
    entities
}

/// Fraction of `a`'s entities also found among `b`'s.
///
/// The denominator is `a`'s entity count, so the score is not symmetric:
/// `entity_overlap(a, b)` and `entity_overlap(b, a)` differ whenever the two
/// sides extracted different numbers of entities.
pub fn entity_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.intersection(b).count() as f64 / a.len() as f64
}
