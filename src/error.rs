//! Unified error type.

use std::time::Duration;

/// The error type returned by seed's fallible operations.
///
/// Application-level errors (404, business failures, etc.) are expressed as
/// HTTP [`Response`](crate::Response) values or [`render::Error`](crate::render::Error),
/// not as `Error`s. This type surfaces infrastructure failures: binding to a
/// port, loading TLS material, or a shutdown that outlived its deadline.
///
/// Configuration mistakes made while registering routes are not reported
/// here: they panic at startup, before the server ever accepts a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("invalid value `{value}` for {var}")]
    InvalidConfig { var: &'static str, value: String },

    #[cfg(feature = "tls")]
    #[error("tls: {0}")]
    Tls(String),

    /// In-flight connections were still running when the drain deadline
    /// passed. They have been aborted.
    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}
