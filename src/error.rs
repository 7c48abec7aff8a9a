use thiserror::Error;

use crate::git::GitError;

#[derive(Error, Debug)]
pub enum CovtrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed snapshot at {commit}: {source}")]
    Snapshot {
        commit: String,
        source: serde_json::Error,
    },

    #[error("Unknown coverage format")]
    UnknownFormat,
}

pub type Result<T> = std::result::Result<T, CovtrackError>;
