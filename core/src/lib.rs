//! Client for the Wallabag read-it-later REST API.
//!
//! # Overview
//! `WallabagClient` builds `HttpRequest` values for every entries, tags,
//! annotations, version and OAuth endpoint and parses `HttpResponse` values
//! into `ApiResponse` without touching the network (host-does-IO pattern).
//! `Wallabag` wraps it with a blocking `ureq` agent for callers who just want
//! to make calls.
//!
//! # Design
//! - Per-operation options structs (`EntriesQuery`, `NewEntry`, ...) hold
//!   defaults and drop out-of-range values back to them.
//! - The only mutable state is the access token.
//! - Responses are JSON values, raw bytes for binary exports, or `Empty`
//!   when the body cannot be used; typed DTOs are opt-in via
//!   `ApiResponse::deserialize`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod options;
pub mod transport;
pub mod types;

pub use client::{WallabagClient, WallabagClientBuilder, DEFAULT_USER_AGENT};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use http::{ApiResponse, HttpMethod, HttpRequest, HttpResponse};
pub use options::{
    AnnotationRange, AnnotationUpdate, Credentials, EntriesQuery, EntryExists, EntryPatch,
    NewAnnotation, NewEntry, Params,
};
pub use transport::Wallabag;
pub use types::{Annotation, AnnotationList, EntriesPage, Entry, Format, Tag};
