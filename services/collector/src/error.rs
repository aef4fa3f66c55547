use std::path::PathBuf;

use thiserror::Error;

/// Why a raw extract could not be obtained. Never retried automatically.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned '{content_type}', not a tabular file")]
    NotTabular { content_type: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
