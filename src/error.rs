//! Error taxonomy for the migration pipeline.
//!
//! Everything here is fatal to the run except where the caller explicitly
//! downgrades (tag resolution logs a warning and keeps going). There is no
//! retry policy: a single bad response terminates the run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Required setting missing or unreadable; raised before any network call
    #[error("config: {0}")]
    Config(String),

    /// Non-2xx response from either service
    #[error("API request failed with status {status}: {body}")]
    Transport { status: u16, body: String },

    /// Connection-level failure or 30s timeout
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Durable state could not be read or written; resume correctness
    /// depends on it, so this aborts the run
    #[error("state file: {0}")]
    StateIo(String),

    /// One part of a split memo failed to dispatch
    #[error("failed to create memo part {part}/{total}: {source}")]
    SplitDispatch {
        part: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// Rate-limiter wait interrupted by ctrl-c
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
