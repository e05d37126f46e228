pub mod alignment;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod inference;
pub mod language;
pub mod morality;
pub mod record;
pub mod report;
pub mod sentiment;
pub mod stats;
pub mod tokenize;

use std::path::PathBuf;

#[derive(Debug)]
pub enum MoralignError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(String),
    Ingest { path: PathBuf, reason: String },
    Integrity(String),
    Classifier(String),
}

impl std::fmt::Display for MoralignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoralignError::Io(e) => write!(f, "io: {e}"),
            MoralignError::Json(e) => write!(f, "json: {e}"),
            MoralignError::Config(msg) => write!(f, "config: {msg}"),
            MoralignError::Ingest { path, reason } => {
                write!(f, "ingest: {}: {reason}", path.display())
            }
            MoralignError::Integrity(msg) => write!(f, "integrity: {msg}"),
            MoralignError::Classifier(msg) => write!(f, "classifier: {msg}"),
        }
    }
}

impl std::error::Error for MoralignError {}

impl From<std::io::Error> for MoralignError {
    fn from(e: std::io::Error) -> Self {
        MoralignError::Io(e)
    }
}

impl From<serde_json::Error> for MoralignError {
    fn from(e: serde_json::Error) -> Self {
        MoralignError::Json(e)
    }
}
