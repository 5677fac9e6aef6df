//! Unified error type.

use thiserror::Error;

/// The error type returned by hostmux's fallible operations.
///
/// Routing itself never fails: unknown hosts fall back to the wildcard tree and
/// unmatched paths are answered by the tree's not-found handler. This type
/// surfaces infrastructure failures: binding a port, reading configuration,
/// installing the log subscriber.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}
