//
use std::io;
use std::time::Duration;

use crate::api::ApiProblem;

/// acme-issuer result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// acme-issuer errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The CA answered with a problem document. Never retried, except
    /// `badNonce` which is handled inside the transport.
    #[error("acme: {0}")]
    Api(ApiProblem),
    /// A retry or poll budget ran out.
    #[error("timeout: {what} after {elapsed:?}")]
    Timeout { what: String, elapsed: Duration },
    /// The DNS-01 record was not seen on the authoritative servers in time.
    #[error("propagation: time limit exceeded for {fqdn} after {elapsed:?}: {last}")]
    Propagation {
        fqdn: String,
        elapsed: Duration,
        last: String,
    },
    /// An authorization ended in a non-valid status.
    #[error("acme: error for {domain}: {problem}")]
    Challenge { domain: String, problem: ApiProblem },
    /// A challenge provider failed to present its proof.
    #[error("{domain}: challenge provider failed: {message}")]
    Provider { domain: String, message: String },
    /// Precondition checked before any network I/O.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The surrounding order was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// Connection level HTTP failure.
    #[error("transport: {0}")]
    Transport(String),
    /// DNS query failure.
    #[error("dns: {0}")]
    Dns(String),
    /// The account key can't be used for JWS signing.
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
    /// openssl failure.
    #[error("crypto: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
    /// Base64 decoding failed.
    #[error(transparent)]
    Base64Decode(#[from] base64::DecodeError),
    /// JSON serialization/deserialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// std::io error.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Some other error. Notice that `Error` is
    /// `From<String>` and `From<&str>` and it becomes `Other`.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The CA problem behind this error, if any.
    pub fn problem(&self) -> Option<&ApiProblem> {
        match self {
            Error::Api(p) => Some(p),
            Error::Challenge { problem, .. } => Some(problem),
            _ => None,
        }
    }
}

impl From<ApiProblem> for Error {
    fn from(p: ApiProblem) -> Self {
        Error::Api(p)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
