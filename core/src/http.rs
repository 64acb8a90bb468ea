//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `WallabagClient` builds
//! `HttpRequest` values and turns `HttpResponse` values into `ApiResponse`
//! without touching the network; `transport::Wallabag` (or any other host)
//! performs the actual round-trip in between.
//!
//! Response bodies are raw bytes because export endpoints return PDF/EPUB
//! documents that are not valid UTF-8.

use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{ApiError, ApiResult};

/// HTTP verbs the Wallabag API uses.
///
/// Parses case-insensitively, so the dispatcher accepts `"get"` as well as
/// `"GET"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    /// POST, PATCH and PUT carry their parameters (and the token) in a form
    /// body; GET and DELETE carry them in the query string.
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Patch | Self::Put)
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the absolute URL including the query string. `body`, when
/// present, is `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Outcome of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// A parsed JSON document.
    Json(Value),
    /// Raw bytes of a binary export (PDF, EPUB, MOBI).
    Binary(Vec<u8>),
    /// Nothing usable came back: an empty or unparseable body, or `304`.
    Empty,
}

impl ApiResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ApiResponse::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ApiResponse::Empty)
    }

    /// Decode a JSON response into a typed value.
    ///
    /// Binary and empty responses, and JSON that does not match `T`, yield
    /// `ApiError::Deserialization`.
    pub fn deserialize<T: DeserializeOwned>(self) -> ApiResult<T> {
        match self {
            ApiResponse::Json(value) => serde_json::from_value(value)
                .map_err(|e| ApiError::Deserialization(e.to_string())),
            ApiResponse::Binary(bytes) => Err(ApiError::Deserialization(format!(
                "expected JSON, got {} bytes of binary content",
                bytes.len()
            ))),
            ApiResponse::Empty => Err(ApiError::Deserialization(
                "expected JSON, got an empty response".to_string(),
            )),
        }
    }
}
