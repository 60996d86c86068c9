use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Article;

/// Lower-cases, drops punctuation and collapses whitespace runs.
///
/// Every duplicate-detection key goes through this; hashing raw text instead
/// lets trivially different titles slip past dedup.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex encoded sha256 of `text`.
pub fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// The three duplicate-detection keys of an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub url: String,
    pub title_hash: String,
    /// `None` when the article carries no body of its own: content and
    /// summary both normalize to nothing, or the summary only repeats the title.
    pub content_hash: Option<String>,
}

impl Identity {
    pub fn of(article: &Article) -> Self {
        let title = normalize_text(&article.title);
        let body = article
            .content
            .as_deref()
            .map(normalize_text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| normalize_text(&article.summary));

        Self {
            url: article.url.clone(),
            title_hash: hash_text(&title),
            // a title-only record gets the title as its summary; that is already
            // covered by title_hash and must not collide with real summaries
            content_hash: (!body.is_empty() && body != title).then(|| hash_text(&body)),
        }
    }
}
