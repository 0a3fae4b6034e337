//! Client error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while building or using the LND client.
///
/// These cover everything up to and including channel construction. Failures
/// returned by the daemon itself are
/// [`ClassifiedError`](crate::classify::ClassifiedError)s.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The `host:port` endpoint could not be formed.
    #[error("Invalid endpoint URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// gRPC transport error (connection failed, TLS error, etc.).
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The TLS certificate cannot be parsed.
    #[error("Invalid TLS certificate: {0}")]
    InvalidCertificate(String),

    /// The macaroon cannot be carried as request metadata.
    #[error("Invalid macaroon: {0}")]
    InvalidMacaroon(String),

    /// A credential file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ClientError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
