//! Error types for airlock-fetch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("giving up on {url} after {attempts} attempt(s): {last}")]
    MaxRetriesExceeded {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("local source '{path}' is not readable: {source}")]
    LocalSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fs(#[from] airlock_fs::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;
