pub mod adapters;
pub mod cli;
pub mod logging;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;

pub use adapters::{GuardianAdapter, NewsApiAdapter, RssAdapter, RssFeed};
pub use cli::{handle_command, SourceArgs, SourceCommands};
pub use logging::init_logging;
pub use orchestrator::{FetchOrchestrator, FetchReport, SourceStatus, CACHE_ERROR_KEY};
pub use rate_limit::RateGate;
pub use registry::SourceRegistry;

pub mod prelude {
    pub use super::{FetchOrchestrator, FetchReport, SourceRegistry};
    pub use nb_core::{Article, Error, FetchParams, Result, SourceAdapter};
}
