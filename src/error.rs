// Error type shared by the API client and the directory watcher.
// The binary wraps these in `anyhow` at the edges; library callers can
// match on the variant to tell a bad file from a rejected request.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required value: {0}")]
    MissingField(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to open {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
