use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// `NoClassFile` is the only variant the dependency walker recovers from;
/// everything else aborts the current `analyse_classes` run.
#[derive(Debug, Error)]
pub enum AnalyserError {
    #[error("no class file for {class}")]
    NoClassFile { class: String },

    #[error("cannot read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {class}: {message}")]
    Parse { class: String, message: String },

    #[error("meta for {class} staged twice in one run")]
    MetaWriteDuplicate { class: String },

    #[error("unreadable class database {path}: {message}")]
    DbParse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyserError {
    /// True for the dependency-resolution miss the closure walk downgrades.
    pub fn is_no_class_file(&self) -> bool {
        matches!(self, AnalyserError::NoClassFile { .. })
    }
}
