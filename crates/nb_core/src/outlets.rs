use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoliticalLean {
    Left,
    Center,
    Right,
}

impl fmt::Display for PoliticalLean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoliticalLean::Left => "left",
            PoliticalLean::Center => "center",
            PoliticalLean::Right => "right",
        };
        f.write_str(name)
    }
}

/// Read-only outlet classification keyed by outlet name.
pub trait OutletClassifier: Send + Sync {
    /// Unknown outlets are treated as center.
    fn lean(&self, source_name: &str) -> PoliticalLean;

    /// Credibility in `[0, 1]`, `None` when the outlet is unknown.
    fn credibility(&self, source_name: &str) -> Option<f64>;
}

lazy_static! {
    static ref OUTLETS: HashMap<&'static str, (PoliticalLean, f64)> = {
        use PoliticalLean::*;
        let mut m = HashMap::new();
        m.insert("cnn", (Left, 0.72));
        m.insert("msnbc", (Left, 0.65));
        m.insert("the guardian", (Left, 0.80));
        m.insert("huffpost", (Left, 0.62));
        m.insert("the new york times", (Left, 0.84));
        m.insert("the washington post", (Left, 0.82));
        m.insert("npr", (Left, 0.85));
        m.insert("vox", (Left, 0.66));
        m.insert("reuters", (Center, 0.92));
        m.insert("associated press", (Center, 0.92));
        m.insert("bbc news", (Center, 0.88));
        m.insert("bloomberg", (Center, 0.86));
        m.insert("the hill", (Center, 0.74));
        m.insert("axios", (Center, 0.78));
        m.insert("usa today", (Center, 0.74));
        m.insert("fox news", (Right, 0.60));
        m.insert("breitbart news", (Right, 0.40));
        m.insert("the wall street journal", (Right, 0.85));
        m.insert("new york post", (Right, 0.58));
        m.insert("the daily wire", (Right, 0.50));
        m.insert("washington examiner", (Right, 0.60));
        m.insert("national review", (Right, 0.66));
        m
    };
}

/// Built-in table of well-known English-language outlets.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticOutletTable;

impl StaticOutletTable {
    fn lookup(source_name: &str) -> Option<(PoliticalLean, f64)> {
        let key = source_name.trim().to_lowercase();
        OUTLETS
            .get(key.as_str())
            .or_else(|| OUTLETS.get(format!("the {key}").as_str()))
            .or_else(|| key.strip_prefix("the ").and_then(|bare| OUTLETS.get(bare)))
            .copied()
    }
}

impl OutletClassifier for StaticOutletTable {
    fn lean(&self, source_name: &str) -> PoliticalLean {
        Self::lookup(source_name)
            .map(|(lean, _)| lean)
            .unwrap_or(PoliticalLean::Center)
    }

    fn credibility(&self, source_name: &str) -> Option<f64> {
        Self::lookup(source_name).map(|(_, credibility)| credibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_and_article_insensitive() {
        let table = StaticOutletTable;
        assert_eq!(table.lean("Fox News"), PoliticalLean::Right);
        assert_eq!(table.lean("Guardian"), PoliticalLean::Left);
        assert_eq!(table.lean("The Reuters"), PoliticalLean::Center);
        assert_eq!(table.credibility("REUTERS"), Some(0.92));
    }

    #[test]
    fn unknown_outlets_default_to_center() {
        let table = StaticOutletTable;
        assert_eq!(table.lean("Springfield Shopper"), PoliticalLean::Center);
        assert_eq!(table.credibility("Springfield Shopper"), None);
    }
}
