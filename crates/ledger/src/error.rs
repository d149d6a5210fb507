use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("entry {artist:?} - {title:?} has a non-finite value in {field}")]
    NonFinite {
        artist: String,
        title: String,
        field: &'static str,
    },
}

impl LedgerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
