//! Error types for the Wallabag API client.
//!
//! # Design
//! Construction-time problems (`InvalidFormat`, `InvalidHost`) are raised
//! before any network call. Per-call problems (`Transport`, `Status`) are
//! always returned to the caller. A body that fails to parse as JSON is not
//! an error on the generic path: the parser degrades to an empty result, and
//! `Deserialization` is reserved for places where a value is required, such
//! as the token exchange or typed decoding.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the Wallabag client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout...).
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A JSON value was required but the body did not provide one.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The dispatcher was handed a verb it does not know.
    #[error("method expected: get, post, patch, put, delete; got {0:?}")]
    InvalidMethod(String),

    /// The response format extension is not one Wallabag serves.
    #[error("format invalid {0:?}, should be one of xml, json, txt, csv, pdf, epub, mobi, html")]
    InvalidFormat(String),

    /// The host is not an absolute base URL.
    #[error("invalid host {0:?}")]
    InvalidHost(String),

    /// Reading, parsing or writing a configuration file failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status code, when the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}
