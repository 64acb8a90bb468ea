//! Response formats and domain DTOs for the Wallabag API.
//!
//! # Design
//! The DTOs are typed views over the JSON the server returns. The client
//! hands back `ApiResponse::Json`, and callers decode into these with
//! `ApiResponse::deserialize`. Fields the server may omit are optional or
//! defaulted, and unknown fields are ignored, so older and newer servers
//! both decode.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::ApiError;
use crate::options::AnnotationRange;

/// Extension appended to every API path, selecting the response format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    Xml,
    #[default]
    Json,
    Txt,
    Csv,
    Pdf,
    Epub,
    Mobi,
    Html,
}

impl Format {
    /// Parse an extension, rejecting anything outside the supported set.
    pub fn parse(extension: &str) -> Result<Self, ApiError> {
        extension
            .parse()
            .map_err(|_| ApiError::InvalidFormat(extension.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    #[serde(default)]
    pub slug: String,
}

/// A saved article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_archived: i64,
    #[serde(default)]
    pub is_starred: i64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub published_by: Option<Vec<String>>,
    #[serde(default)]
    pub origin_url: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub reading_time: Option<i64>,
}

impl Entry {
    pub fn tag_labels(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.label.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedEntries {
    #[serde(default)]
    pub items: Vec<Entry>,
}

/// One page of `GET /api/entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntriesPage {
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
    pub total: u64,
    #[serde(rename = "_embedded")]
    pub embedded: EmbeddedEntries,
}

impl EntriesPage {
    pub fn items(&self) -> &[Entry] {
        &self.embedded.items
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub ranges: Vec<AnnotationRange>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `GET /api/annotations/{entry}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationList {
    pub total: u64,
    #[serde(default)]
    pub rows: Vec<Annotation>,
}
