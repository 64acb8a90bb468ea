//! Per-operation request options.
//!
//! # Design
//! Each operation that takes parameters has its own options struct. Builder
//! methods accept the raw values a caller would type (`1`, `"asc"`) and keep
//! only those inside the operation's allowed set; anything else leaves the
//! documented default in place. The drop is silent to the caller and logged
//! at `debug`.
//!
//! `params()` renders the options as ordered `(name, value)` pairs, which
//! the client then places in the query string or the form body.

use std::str::FromStr;

use strum::{AsRefStr, Display, EnumString};
use tracing::debug;

/// Ordered request parameters.
pub type Params = Vec<(String, String)>;

/// Boolean-like `0`/`1` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Off,
    On,
}

impl Flag {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Flag::Off),
            1 => Some(Flag::On),
            _ => None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Flag::Off => "0",
            Flag::On => "1",
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value {
            Flag::On
        } else {
            Flag::Off
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SortKey {
    #[default]
    Created,
    Updated,
}

/// How much of each entry the list endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Detail {
    Metadata,
    Full,
}

fn flag(param: &'static str, value: i64) -> Option<Flag> {
    let flag = Flag::from_value(value);
    if flag.is_none() {
        debug!(param, value, "value outside {{0, 1}}, keeping default");
    }
    flag
}

fn choice<T: FromStr>(param: &'static str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        debug!(param, value, "unsupported value, keeping default");
    }
    parsed
}

fn positive(param: &'static str, value: i64) -> Option<u32> {
    let parsed = u32::try_from(value).ok().filter(|v| *v > 0);
    if parsed.is_none() {
        debug!(param, value, "value must be at least 1, keeping default");
    }
    parsed
}

/// Tags travel as one comma-and-space separated string.
pub fn join_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn push(params: &mut Params, name: &str, value: impl Into<String>) {
    params.push((name.to_string(), value.into()));
}

fn push_flag(params: &mut Params, name: &str, flag: Option<Flag>) {
    if let Some(flag) = flag {
        push(params, name, flag.as_param());
    }
}

fn push_opt(params: &mut Params, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        push(params, name, value.clone());
    }
}

/// Filters for `GET /api/entries`.
///
/// Defaults: `sort=created`, `order=desc`, `page=1`, `perPage=30`, `tags=""`,
/// `since=0`; status flags and `detail` are omitted, so the server returns
/// entries in every state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesQuery {
    archive: Option<Flag>,
    starred: Option<Flag>,
    delete: Option<Flag>,
    public: Option<Flag>,
    sort: SortKey,
    order: SortOrder,
    page: u32,
    per_page: u32,
    tags: Vec<String>,
    since: i64,
    detail: Option<Detail>,
}

impl Default for EntriesQuery {
    fn default() -> Self {
        Self {
            archive: None,
            starred: None,
            delete: None,
            public: None,
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: 30,
            tags: Vec::new(),
            since: 0,
            detail: None,
        }
    }
}

impl EntriesQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive(mut self, value: i64) -> Self {
        self.archive = flag("archive", value).or(self.archive);
        self
    }

    pub fn starred(mut self, value: i64) -> Self {
        self.starred = flag("starred", value).or(self.starred);
        self
    }

    pub fn delete(mut self, value: i64) -> Self {
        self.delete = flag("delete", value).or(self.delete);
        self
    }

    pub fn public(mut self, value: i64) -> Self {
        self.public = flag("public", value).or(self.public);
        self
    }

    pub fn sort(mut self, value: &str) -> Self {
        self.sort = choice("sort", value).unwrap_or(self.sort);
        self
    }

    pub fn order(mut self, value: &str) -> Self {
        self.order = choice("order", value).unwrap_or(self.order);
        self
    }

    pub fn page(mut self, value: i64) -> Self {
        self.page = positive("page", value).unwrap_or(self.page);
        self
    }

    pub fn per_page(mut self, value: i64) -> Self {
        self.per_page = positive("perPage", value).unwrap_or(self.per_page);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Only entries updated after this UNIX timestamp.
    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = timestamp;
        self
    }

    pub fn detail(mut self, value: &str) -> Self {
        self.detail = choice("detail", value).or(self.detail);
        self
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push(&mut params, "sort", self.sort.as_ref());
        push(&mut params, "order", self.order.as_ref());
        push(&mut params, "page", self.page.to_string());
        push(&mut params, "perPage", self.per_page.to_string());
        push(&mut params, "tags", join_tags(&self.tags));
        push(&mut params, "since", self.since.to_string());
        push_flag(&mut params, "archive", self.archive);
        push_flag(&mut params, "starred", self.starred);
        push_flag(&mut params, "delete", self.delete);
        push_flag(&mut params, "public", self.public);
        if let Some(detail) = self.detail {
            push(&mut params, "detail", detail.as_ref());
        }
        params
    }
}

/// Payload for `POST /api/entries`. Only `url` is required; every other
/// field is sent only when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    url: String,
    title: Option<String>,
    tags: Vec<String>,
    archive: Option<Flag>,
    starred: Option<Flag>,
    content: Option<String>,
    language: Option<String>,
    published_at: Option<String>,
    authors: Option<String>,
    public: Option<Flag>,
    original_url: Option<String>,
}

impl NewEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            tags: Vec::new(),
            archive: None,
            starred: None,
            content: None,
            language: None,
            published_at: None,
            authors: None,
            public: None,
            original_url: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn archive(mut self, value: i64) -> Self {
        self.archive = flag("archive", value).or(self.archive);
        self
    }

    pub fn starred(mut self, value: i64) -> Self {
        self.starred = flag("starred", value).or(self.starred);
        self
    }

    /// HTML to store instead of fetching the page.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Publication date, as a timestamp or an ISO 8601 string.
    pub fn published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    /// Comma-separated author names.
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }

    pub fn public(mut self, value: i64) -> Self {
        self.public = flag("public", value).or(self.public);
        self
    }

    pub fn original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = Some(url.into());
        self
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push(&mut params, "url", self.url.clone());
        push_opt(&mut params, "title", &self.title);
        if !self.tags.is_empty() {
            push(&mut params, "tags", join_tags(&self.tags));
        }
        push_flag(&mut params, "archive", self.archive);
        push_flag(&mut params, "starred", self.starred);
        push_opt(&mut params, "content", &self.content);
        push_opt(&mut params, "language", &self.language);
        push_opt(&mut params, "published_at", &self.published_at);
        push_opt(&mut params, "authors", &self.authors);
        push_flag(&mut params, "public", self.public);
        push_opt(&mut params, "original_url", &self.original_url);
        params
    }
}

/// Partial update for `PATCH /api/entries/{id}`. Unset fields are left
/// untouched on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    title: Option<String>,
    tags: Vec<String>,
    archive: Option<Flag>,
    starred: Option<Flag>,
    delete: Option<Flag>,
    public: Option<Flag>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn archive(mut self, value: i64) -> Self {
        self.archive = flag("archive", value).or(self.archive);
        self
    }

    pub fn starred(mut self, value: i64) -> Self {
        self.starred = flag("starred", value).or(self.starred);
        self
    }

    pub fn delete(mut self, value: i64) -> Self {
        self.delete = flag("delete", value).or(self.delete);
        self
    }

    pub fn public(mut self, value: i64) -> Self {
        self.public = flag("public", value).or(self.public);
        self
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push_opt(&mut params, "title", &self.title);
        if !self.tags.is_empty() {
            push(&mut params, "tags", join_tags(&self.tags));
        }
        push_flag(&mut params, "archive", self.archive);
        push_flag(&mut params, "starred", self.starred);
        push_flag(&mut params, "delete", self.delete);
        push_flag(&mut params, "public", self.public);
        params
    }
}

/// Lookup for `GET /api/entries/exists`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryExists {
    url: Option<String>,
    urls: Vec<String>,
    return_id: Option<Flag>,
}

impl EntryExists {
    /// Check a single URL; the server answers `{"exists": ...}`.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Check several URLs at once; the server answers `{url: ...}` per URL.
    pub fn urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// With `1`, the server answers with entry ids instead of booleans.
    pub fn return_id(mut self, value: i64) -> Self {
        self.return_id = flag("return_id", value).or(self.return_id);
        self
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push_opt(&mut params, "url", &self.url);
        for url in &self.urls {
            push(&mut params, "urls[]", url.clone());
        }
        push_flag(&mut params, "return_id", self.return_id);
        params
    }
}

/// Text range an annotation covers, in the annotator.js shape Wallabag uses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRange {
    pub start: String,
    pub start_offset: u32,
    pub end: String,
    pub end_offset: u32,
}

/// Payload for `POST /api/annotations/{entry}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAnnotation {
    text: String,
    quote: String,
    ranges: Vec<AnnotationRange>,
}

impl NewAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = quote.into();
        self
    }

    pub fn range(mut self, range: AnnotationRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Ranges are flattened with bracket keys (`ranges[0][start]`), which
    /// the server's form decoder rebuilds into a list of objects.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push(&mut params, "text", self.text.clone());
        push(&mut params, "quote", self.quote.clone());
        for (i, range) in self.ranges.iter().enumerate() {
            push(&mut params, &format!("ranges[{i}][start]"), range.start.clone());
            push(&mut params, &format!("ranges[{i}][startOffset]"), range.start_offset.to_string());
            push(&mut params, &format!("ranges[{i}][end]"), range.end.clone());
            push(&mut params, &format!("ranges[{i}][endOffset]"), range.end_offset.to_string());
        }
        params
    }
}

/// Payload for `PUT /api/annotations/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationUpdate {
    text: Option<String>,
}

impl AnnotationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push_opt(&mut params, "text", &self.text);
        params
    }
}

/// Password-grant credentials for `POST /oauth/v2/token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// The grant type is always `password`.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        push(&mut params, "grant_type", "password");
        push(&mut params, "client_id", self.client_id.clone());
        push(&mut params, "client_secret", self.client_secret.clone());
        push(&mut params, "username", self.username.clone());
        push(&mut params, "password", self.password.clone());
        params
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
