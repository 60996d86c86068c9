use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Source error ({source_tag}): {message}")]
    Source { source_tag: String, message: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All requested sources failed: {}", describe_failures(.0))]
    AllSourcesFailed(BTreeMap<String, String>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn source_error(source_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_tag: source_tag.into(),
            message: message.into(),
        }
    }
}

fn describe_failures(failures: &BTreeMap<String, String>) -> String {
    failures
        .iter()
        .map(|(tag, message)| format!("{tag}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
