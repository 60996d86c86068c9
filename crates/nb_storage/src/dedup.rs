use std::collections::HashMap;

use nb_core::{DuplicateCheck, Identity, MatchKind};

/// In-process lookup from identity keys to the id of the record holding them.
///
/// Each key maps to at most one id; the first record to claim a key keeps it.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    by_url: HashMap<String, String>,
    by_title: HashMap<String, String>,
    by_content: HashMap<String, String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL first, then title hash, then content hash. An identity without a
    /// content hash never matches on content.
    pub fn check(&self, identity: &Identity) -> DuplicateCheck {
        if let Some(id) = self.by_url.get(&identity.url) {
            return DuplicateCheck::matched(MatchKind::Url, id.clone());
        }
        if let Some(id) = self.by_title.get(&identity.title_hash) {
            return DuplicateCheck::matched(MatchKind::Title, id.clone());
        }
        if let Some(id) = identity
            .content_hash
            .as_ref()
            .and_then(|hash| self.by_content.get(hash))
        {
            return DuplicateCheck::matched(MatchKind::Content, id.clone());
        }
        DuplicateCheck::unique()
    }

    pub fn insert(&mut self, id: &str, identity: &Identity) {
        self.by_url
            .entry(identity.url.clone())
            .or_insert_with(|| id.to_string());
        self.by_title
            .entry(identity.title_hash.clone())
            .or_insert_with(|| id.to_string());
        if let Some(hash) = &identity.content_hash {
            self.by_content
                .entry(hash.clone())
                .or_insert_with(|| id.to_string());
        }
    }

    /// Releases the keys `id` owns.
    pub fn remove(&mut self, id: &str, identity: &Identity) {
        release(&mut self.by_url, &identity.url, id);
        release(&mut self.by_title, &identity.title_hash, id);
        if let Some(hash) = &identity.content_hash {
            release(&mut self.by_content, hash, id);
        }
    }

    pub fn clear(&mut self) {
        self.by_url.clear();
        self.by_title.clear();
        self.by_content.clear();
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

fn release(map: &mut HashMap<String, String>, key: &str, id: &str) {
    if map.get(key).map(|owner| owner == id).unwrap_or(false) {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(url: &str, title: &str, content: Option<&str>) -> Identity {
        Identity {
            url: url.to_string(),
            title_hash: title.to_string(),
            content_hash: content.map(str::to_string),
        }
    }

    #[test]
    fn url_wins_over_title_and_content() {
        let mut index = DedupIndex::new();
        index.insert("first", &identity("u1", "t1", Some("c1")));
        index.insert("second", &identity("u2", "t2", Some("c2")));

        let check = index.check(&identity("u1", "t2", Some("c2")));
        assert_eq!(check, DuplicateCheck::matched(MatchKind::Url, "first"));

        let check = index.check(&identity("u9", "t2", Some("c1")));
        assert_eq!(check, DuplicateCheck::matched(MatchKind::Title, "second"));

        let check = index.check(&identity("u9", "t9", Some("c1")));
        assert_eq!(check, DuplicateCheck::matched(MatchKind::Content, "first"));
    }

    #[test]
    fn missing_content_hash_never_matches() {
        let mut index = DedupIndex::new();
        index.insert("first", &identity("u1", "t1", None));
        assert!(!index.check(&identity("u2", "t2", None)).is_duplicate);
    }

    #[test]
    fn remove_only_releases_owned_keys() {
        let mut index = DedupIndex::new();
        index.insert("first", &identity("u1", "shared", None));
        index.insert("second", &identity("u2", "shared", None));
        index.remove("second", &identity("u2", "shared", None));

        assert!(!index.check(&identity("u2", "other", None)).is_duplicate);
        assert_eq!(
            index.check(&identity("u3", "shared", None)),
            DuplicateCheck::matched(MatchKind::Title, "first")
        );
        assert_eq!(index.len(), 1);
    }
}
