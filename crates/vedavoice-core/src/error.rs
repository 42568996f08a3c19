use thiserror::Error;

/// Durable storage failure (read or overwrite of one key).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error for key={key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Another process (or another FileStore) is writing to the same directory.
    #[error("storage directory {dir} is in use by another writer")]
    Locked { dir: String },

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure to get any HTTP response at all.
///
/// A non-2xx response is NOT a transport error; it comes back as a status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    /// The host could not be reached at all (connect/DNS failure).
    /// Treated as the network being down, not as a failed attempt.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
