/// Shared error type used across all concierge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("retrieval: {0}")]
    Retrieval(String),

    #[error("scheduling: {0}")]
    Scheduling(String),

    #[error("notify: {0}")]
    Notify(String),

    #[error("checkpoint: {0}")]
    Checkpoint(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error came from a deadline rather than the remote side.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
