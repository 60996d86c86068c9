use nb_core::SourceAdapter;
use std::sync::Arc;

/// Explicit set of source adapters, built once at startup and handed to the
/// orchestrator. Registration order is preserved.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `adapter`, replacing any adapter already registered under its tag.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        match self.adapters.iter().position(|a| a.tag() == adapter.tag()) {
            Some(idx) => self.adapters[idx] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.tag() == tag).cloned()
    }

    pub fn tags(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.tag().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("adapters", &self.tags())
            .finish()
    }
}
