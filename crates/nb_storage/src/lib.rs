use nb_core::{ArticleCache, Error, Result};
use std::path::Path;
use std::sync::Arc;

pub mod backends;
pub mod dedup;

pub use backends::*;
pub use dedup::DedupIndex;

/// Storage engines selectable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sqlite,
}

impl std::str::FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("unknown storage backend: {other}"))),
        }
    }
}

/// Builds the cache for `kind`. `db_path` is only read by the sqlite backend.
pub async fn create_cache(kind: StorageKind, db_path: Option<&Path>) -> Result<Arc<dyn ArticleCache>> {
    match kind {
        StorageKind::Memory => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            let path = db_path.unwrap_or_else(|| Path::new(sqlite::DEFAULT_DB_PATH));
            Ok(Arc::new(SqliteCache::open(path).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => {
            let _ = db_path;
            Err(Error::Config(
                "sqlite storage requires building nb_storage with the `sqlite` feature".to_string(),
            ))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_cache, StorageKind};
}
