pub mod canonical;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod outlets;
pub mod source;
pub mod storage;
pub mod types;

pub use canonical::canonicalize;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HumanDuration, PipelineConfig, SourcePolicy};
pub use error::{Error, Result};
pub use identity::{hash_text, normalize_text, Identity};
pub use outlets::{OutletClassifier, PoliticalLean, StaticOutletTable};
pub use source::{FetchParams, SourceAdapter};
pub use storage::{
    ArticleCache, ArticleFilter, BatchSummary, CacheStats, DuplicateCheck, MatchKind, SaveOutcome,
};
pub use types::{Article, BiasDistribution, RawArticle, SourceFetchState, StoryCluster};

pub mod prelude {
    pub use super::{Article, ArticleCache, ArticleFilter, Error, RawArticle, Result, SourceAdapter};
}
