//! Stateless HTTP request builder and response parser for the Wallabag API.
//!
//! # Design
//! `WallabagClient` holds the connection settings (host, token, OAuth client,
//! response format, user agent) and nothing else. Every operation is a
//! `build_*` method that produces an `HttpRequest`; every response, whatever
//! the operation, goes through `parse_response`. The caller executes the
//! round-trip in between (see `transport::Wallabag` for the blocking one).
//!
//! Token placement follows the verb: GET and DELETE carry `access_token` and
//! all other parameters in the query string, POST/PATCH/PUT carry them in a
//! form-encoded body.

use serde_json::Value;
use tracing::{error, warn};
use url::{form_urlencoded, Url};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::http::{ApiResponse, HttpMethod, HttpRequest, HttpResponse};
use crate::options::{
    join_tags, AnnotationUpdate, Credentials, EntriesQuery, EntryExists, EntryPatch,
    NewAnnotation, NewEntry, Params,
};
use crate::types::Format;

pub const DEFAULT_USER_AGENT: &str = concat!("wallabag-core/", env!("CARGO_PKG_VERSION"));

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Content types returned raw instead of being parsed as JSON.
const BINARY_CONTENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/epub",
    "application/x-mobipocket-ebook",
];

/// Builder for a [`WallabagClient`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct WallabagClientBuilder {
    host: String,
    token: String,
    client_id: String,
    client_secret: String,
    extension: String,
    user_agent: String,
}

impl WallabagClientBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = client_secret.into();
        self
    }

    /// One of `xml, json, txt, csv, pdf, epub, mobi, html`. Defaults to `json`.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// ## Errors
    ///
    /// `InvalidFormat` for an unsupported extension, `InvalidHost` when the
    /// host is not an absolute base URL.
    pub fn build(self) -> ApiResult<WallabagClient> {
        let format = Format::parse(&self.extension)?;
        let host = parse_host(&self.host)?;
        Ok(WallabagClient {
            host,
            token: self.token,
            client_id: self.client_id,
            client_secret: self.client_secret,
            format,
            user_agent: self.user_agent,
        })
    }
}

/// Synchronous, stateless client for the Wallabag API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network.
#[derive(Clone)]
pub struct WallabagClient {
    host: Url,
    token: String,
    client_id: String,
    client_secret: String,
    format: Format,
    user_agent: String,
}

impl WallabagClient {
    /// JSON client with the default user agent.
    pub fn new(host: &str, token: &str) -> ApiResult<Self> {
        Self::builder(host).token(token).build()
    }

    pub fn builder(host: &str) -> WallabagClientBuilder {
        WallabagClientBuilder {
            host: host.to_string(),
            token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            extension: Format::default().to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::builder(&config.host)
            .token(config.token.as_str())
            .client_id(config.client_id.as_str())
            .client_secret(config.client_secret.as_str())
            .extension(config.format.as_str())
            .user_agent(config.user_agent.as_str())
            .build()
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Password-grant credentials for this client's OAuth id and secret.
    pub fn credentials(&self, username: &str, password: &str) -> Credentials {
        Credentials::new(
            self.client_id.as_str(),
            self.client_secret.as_str(),
            username,
            password,
        )
    }

    // ENTRIES

    pub fn build_get_entries(&self, query: &EntriesQuery) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["entries"]), query.params())
    }

    pub fn build_post_entry(&self, entry: &NewEntry) -> HttpRequest {
        self.request(HttpMethod::Post, self.api(&["entries"]), entry.params())
    }

    pub fn build_get_entry(&self, entry: i64) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["entries", &entry.to_string()]), Params::new())
    }

    pub fn build_patch_entry(&self, entry: i64, patch: &EntryPatch) -> HttpRequest {
        self.request(HttpMethod::Patch, self.api(&["entries", &entry.to_string()]), patch.params())
    }

    pub fn build_delete_entry(&self, entry: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, self.api(&["entries", &entry.to_string()]), Params::new())
    }

    /// Export in the client's format; PDF/EPUB/MOBI come back as bytes.
    pub fn build_get_entry_export(&self, entry: i64) -> HttpRequest {
        let segments = self.api(&["entries", &entry.to_string(), "export"]);
        self.request(HttpMethod::Get, segments, Params::new())
    }

    /// Re-fetch the article content. The server answers `304` when nothing
    /// changed.
    pub fn build_reload_entry(&self, entry: i64) -> HttpRequest {
        let segments = self.api(&["entries", &entry.to_string(), "reload"]);
        self.request(HttpMethod::Patch, segments, Params::new())
    }

    pub fn build_entries_exists(&self, exists: &EntryExists) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["entries", "exists"]), exists.params())
    }

    // TAGS

    pub fn build_get_tags(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["tags"]), Params::new())
    }

    pub fn build_get_tag(&self, tag: &str) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["tags", tag]), Params::new())
    }

    /// Remove one tag from every entry.
    pub fn build_delete_tag(&self, tag: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, self.api(&["tags", tag]), Params::new())
    }

    pub fn build_get_entry_tags(&self, entry: i64) -> HttpRequest {
        let segments = self.api(&["entries", &entry.to_string(), "tags"]);
        self.request(HttpMethod::Get, segments, Params::new())
    }

    pub fn build_post_entry_tags<I, S>(&self, entry: i64, tags: I) -> HttpRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = self.api(&["entries", &entry.to_string(), "tags"]);
        let params = vec![("tags".to_string(), join_tags(tags))];
        self.request(HttpMethod::Post, segments, params)
    }

    pub fn build_delete_entry_tag(&self, entry: i64, tag: &str) -> HttpRequest {
        let segments = self.api(&["entries", &entry.to_string(), "tags", tag]);
        self.request(HttpMethod::Delete, segments, Params::new())
    }

    /// Remove a tag, looked up by label, from every entry.
    pub fn build_delete_tag_label(&self, tag: &str) -> HttpRequest {
        let params = vec![("tag".to_string(), tag.to_string())];
        self.request(HttpMethod::Delete, self.api(&["tag", "label"]), params)
    }

    /// Remove several tags, looked up by label, from every entry.
    pub fn build_delete_tags_label<I, S>(&self, tags: I) -> HttpRequest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params = vec![("tags".to_string(), join_tags(tags))];
        self.request(HttpMethod::Delete, self.api(&["tag", "label"]), params)
    }

    // ANNOTATIONS

    pub fn build_get_annotations(&self, entry: i64) -> HttpRequest {
        let segments = self.api(&["annotations", &entry.to_string()]);
        self.request(HttpMethod::Get, segments, Params::new())
    }

    pub fn build_post_annotation(&self, entry: i64, annotation: &NewAnnotation) -> HttpRequest {
        let segments = self.api(&["annotations", &entry.to_string()]);
        self.request(HttpMethod::Post, segments, annotation.params())
    }

    pub fn build_put_annotation(&self, annotation: i64, update: &AnnotationUpdate) -> HttpRequest {
        let segments = self.api(&["annotations", &annotation.to_string()]);
        self.request(HttpMethod::Put, segments, update.params())
    }

    pub fn build_delete_annotation(&self, annotation: i64) -> HttpRequest {
        let segments = self.api(&["annotations", &annotation.to_string()]);
        self.request(HttpMethod::Delete, segments, Params::new())
    }

    // VERSION

    pub fn build_get_version(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.api(&["version"]), Params::new())
    }

    // AUTH

    /// Password-grant token exchange against this client's host.
    pub fn build_token_request(&self, credentials: &Credentials) -> HttpRequest {
        token_request(&self.host, &self.user_agent, credentials)
    }

    /// Generic dispatch: `method` is a verb name (`get`, `post`, `patch`,
    /// `put`, `delete`, any case) and `path` is appended to the host as
    /// given, extension and percent-escapes included. A `?query` on `path`
    /// is sent ahead of `params`.
    pub fn build_query(&self, method: &str, path: &str, params: Params) -> ApiResult<HttpRequest> {
        let method: HttpMethod = method
            .parse()
            .map_err(|_| ApiError::InvalidMethod(method.to_string()))?;
        let (path, query) = path.split_once('?').unwrap_or((path, ""));

        let mut url = self.host.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        url.set_query(None);
        url.set_fragment(None);

        let merged = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .chain(params)
            .collect();
        Ok(self.request(method, url, merged))
    }

    pub fn parse_response(&self, response: HttpResponse) -> ApiResult<ApiResponse> {
        parse_response(response)
    }

    pub fn parse_token(&self, response: HttpResponse) -> ApiResult<String> {
        parse_token(response)
    }

    /// `["api", ..resource]` with the format extension on the last segment.
    fn api(&self, resource: &[&str]) -> Url {
        let mut segments: Vec<String> = std::iter::once("api")
            .chain(resource.iter().copied())
            .map(str::to_string)
            .collect();
        if let Some(last) = segments.last_mut() {
            last.push('.');
            last.push_str(self.format.as_ref());
        }
        endpoint(&self.host, &segments)
    }

    fn request(&self, method: HttpMethod, mut url: Url, mut params: Params) -> HttpRequest {
        params.push(("access_token".to_string(), self.token.clone()));
        let mut headers = vec![("user-agent".to_string(), self.user_agent.clone())];
        if method.has_body() {
            headers.push(("content-type".to_string(), FORM_CONTENT_TYPE.to_string()));
            HttpRequest {
                method,
                path: url.into(),
                headers,
                body: Some(encode_form(&params)),
            }
        } else {
            url.query_pairs_mut().extend_pairs(&params);
            HttpRequest {
                method,
                path: url.into(),
                headers,
                body: None,
            }
        }
    }
}

impl std::fmt::Debug for WallabagClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallabagClient")
            .field("host", &self.host.as_str())
            .field("client_id", &self.client_id)
            .field("format", &self.format)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// `POST /oauth/v2/token`, without an access token attached.
pub fn token_request(host: &Url, user_agent: &str, credentials: &Credentials) -> HttpRequest {
    let segments = ["oauth", "v2", "token"].map(str::to_string);
    HttpRequest {
        method: HttpMethod::Post,
        path: endpoint(host, &segments).into(),
        headers: vec![
            ("user-agent".to_string(), user_agent.to_string()),
            ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
        ],
        body: Some(encode_form(&credentials.params())),
    }
}

pub(crate) fn parse_host(host: &str) -> ApiResult<Url> {
    let url = Url::parse(host).map_err(|e| ApiError::InvalidHost(format!("{host}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidHost(host.to_string()));
    }
    Ok(url)
}

/// `host` with `segments` appended, each one percent-encoded.
fn endpoint(host: &Url, segments: &[String]) -> Url {
    let mut url = host.clone();
    // Hosts are checked to be base URLs at construction, so this always succeeds.
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url.set_query(None);
    url
}

fn encode_form(params: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

fn is_binary(response: &HttpResponse) -> bool {
    response
        .content_type()
        .map(str::to_ascii_lowercase)
        .is_some_and(|ct| BINARY_CONTENT_TYPES.iter().any(|b| ct.trim_start().starts_with(b)))
}

/// Turn any API response into an `ApiResponse`.
///
/// Binary exports are returned as bytes whatever the status. `304` is an
/// empty result. Other non-2xx statuses are errors, after logging any
/// `errors` envelope in the body. A 2xx body that is empty or not JSON is an
/// empty result, not an error.
pub fn parse_response(response: HttpResponse) -> ApiResult<ApiResponse> {
    if is_binary(&response) {
        return Ok(ApiResponse::Binary(response.body));
    }
    if response.status == 304 {
        return Ok(ApiResponse::Empty);
    }
    if !response.is_success() {
        log_error_envelope(&response.body);
        return Err(ApiError::status(response.status, response.text()));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApiResponse::Empty);
    }
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(value) => {
            log_error_envelope_value(&value);
            Ok(ApiResponse::Json(value))
        }
        Err(e) => {
            warn!(
                status = response.status,
                content_type = response.content_type().unwrap_or_default(),
                error = %e,
                "response body is not JSON, returning an empty result"
            );
            Ok(ApiResponse::Empty)
        }
    }
}

/// Extract `access_token` from a token exchange response.
pub fn parse_token(response: HttpResponse) -> ApiResult<String> {
    if !response.is_success() {
        log_error_envelope(&response.body);
        return Err(ApiError::status(response.status, response.text()));
    }
    let value: Value = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::Deserialization(e.to_string()))?;
    value
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Deserialization("response has no access_token".to_string()))
}

fn log_error_envelope(body: &[u8]) {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        log_error_envelope_value(&value);
    }
}

/// Log each entry of a `{"errors": {name: {"content": ...}}}` envelope.
fn log_error_envelope_value(value: &Value) {
    let Some(errors) = value.get("errors").and_then(Value::as_object) else {
        return;
    };
    for (name, detail) in errors {
        let content = detail
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| detail.to_string());
        error!(error = %name, "Wallabag: {content}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnnotationRange;

    const HOST: &str = "http://localhost:3000";

    fn client() -> WallabagClient {
        WallabagClient::new(HOST, "tok").unwrap()
    }

    fn query_of(req: &HttpRequest) -> Vec<(String, String)> {
        Url::parse(&req.path)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    fn form_of(req: &HttpRequest) -> Vec<(String, String)> {
        form_urlencoded::parse(req.body.as_deref().unwrap().as_bytes())
            .into_owned()
            .collect()
    }

    fn value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn path_of(req: &HttpRequest) -> String {
        let url = Url::parse(&req.path).unwrap();
        url.path().to_string()
    }

    fn response(status: u16, content_type: &str, body: &[u8]) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.to_vec(),
        }
    }

    #[test]
    fn build_get_entries_puts_params_and_token_in_query() {
        let req = client().build_get_entries(&EntriesQuery::new().tags(["foo", "bar"]));
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(path_of(&req), "/api/entries.json");
        assert!(req.body.is_none());
        let query = query_of(&req);
        assert_eq!(value(&query, "tags"), Some("foo, bar"));
        assert_eq!(value(&query, "order"), Some("desc"));
        assert_eq!(value(&query, "access_token"), Some("tok"));
    }

    #[test]
    fn build_post_entry_puts_params_and_token_in_form() {
        let req = client().build_post_entry(&NewEntry::new("https://example.org").tags(["foo", "bar"]));
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/entries.json");
        assert_eq!(req.header("content-type"), Some(FORM_CONTENT_TYPE));
        let form = form_of(&req);
        assert_eq!(value(&form, "url"), Some("https://example.org"));
        assert_eq!(value(&form, "tags"), Some("foo, bar"));
        assert_eq!(value(&form, "access_token"), Some("tok"));
    }

    #[test]
    fn token_is_never_in_both_places() {
        let c = client();
        for req in [c.build_patch_entry(1, &EntryPatch::new().title("t")), c.build_reload_entry(1)] {
            assert!(query_of(&req).is_empty());
            assert_eq!(value(&form_of(&req), "access_token"), Some("tok"));
        }
        for req in [c.build_delete_entry(1), c.build_get_version()] {
            assert!(req.body.is_none());
            assert_eq!(value(&query_of(&req), "access_token"), Some("tok"));
        }
    }

    #[test]
    fn every_request_carries_the_user_agent() {
        let c = WallabagClient::builder(HOST).user_agent("MyReader/2.0").build().unwrap();
        assert_eq!(c.build_get_tags().header("User-Agent"), Some("MyReader/2.0"));
        assert_eq!(client().build_get_tags().header("user-agent"), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn entry_paths() {
        let c = client();
        assert_eq!(path_of(&c.build_get_entry(42)), "/api/entries/42.json");
        assert_eq!(path_of(&c.build_get_entry_export(42)), "/api/entries/42/export.json");
        assert_eq!(path_of(&c.build_reload_entry(42)), "/api/entries/42/reload.json");
        assert_eq!(c.build_reload_entry(42).method, HttpMethod::Patch);
        assert_eq!(path_of(&c.build_get_entry_tags(42)), "/api/entries/42/tags.json");
        assert_eq!(path_of(&c.build_delete_entry(42)), "/api/entries/42.json");
        assert_eq!(c.build_delete_entry(42).method, HttpMethod::Delete);
    }

    #[test]
    fn exists_sends_repeated_urls() {
        let req = client().build_entries_exists(&EntryExists::urls(["http://a", "http://b"]));
        assert_eq!(path_of(&req), "/api/entries/exists.json");
        let urls: Vec<_> = query_of(&req)
            .into_iter()
            .filter(|(k, _)| k == "urls[]")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(urls, ["http://a", "http://b"]);
    }

    #[test]
    fn tag_names_are_percent_encoded_in_path() {
        let req = client().build_delete_entry_tag(3, "read later");
        assert_eq!(req.path, "http://localhost:3000/api/entries/3/tags/read%20later.json?access_token=tok");
        let req = client().build_delete_tag("a/b");
        assert_eq!(path_of(&req), "/api/tags/a%2Fb.json");
    }

    #[test]
    fn label_deletion_keeps_its_params() {
        let req = client().build_delete_tag_label("foo");
        assert_eq!(path_of(&req), "/api/tag/label.json");
        assert_eq!(value(&query_of(&req), "tag"), Some("foo"));

        let req = client().build_delete_tags_label(["foo", "bar"]);
        assert_eq!(value(&query_of(&req), "tags"), Some("foo, bar"));
    }

    #[test]
    fn post_entry_tags_joins_tags() {
        let req = client().build_post_entry_tags(9, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(value(&form_of(&req), "tags"), Some("foo, bar"));
    }

    #[test]
    fn annotation_requests() {
        let c = client();
        let new = NewAnnotation::new("note").range(AnnotationRange {
            start: "/p[1]".into(),
            start_offset: 0,
            end: "/p[1]".into(),
            end_offset: 5,
        });
        let req = c.build_post_annotation(5, &new);
        assert_eq!(path_of(&req), "/api/annotations/5.json");
        assert_eq!(value(&form_of(&req), "ranges[0][endOffset]"), Some("5"));

        let req = c.build_put_annotation(11, &AnnotationUpdate::new().text("edited"));
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(value(&form_of(&req), "text"), Some("edited"));

        assert_eq!(c.build_get_annotations(5).method, HttpMethod::Get);
        assert_eq!(c.build_delete_annotation(11).method, HttpMethod::Delete);
    }

    #[test]
    fn extension_is_applied_to_every_api_path() {
        let c = WallabagClient::builder(HOST).extension("pdf").build().unwrap();
        assert_eq!(path_of(&c.build_get_entry_export(1)), "/api/entries/1/export.pdf");
        assert_eq!(path_of(&c.build_get_version()), "/api/version.pdf");
    }

    #[test]
    fn host_with_subpath_and_trailing_slash() {
        let c = WallabagClient::new("https://example.org/wallabag/", "t").unwrap();
        assert_eq!(path_of(&c.build_get_tags()), "/wallabag/api/tags.json");
    }

    #[test]
    fn token_request_has_no_access_token() {
        let c = WallabagClient::builder(HOST)
            .client_id("cid")
            .client_secret("csecret")
            .build()
            .unwrap();
        let req = c.build_token_request(&c.credentials("wallabag", "wallabag"));
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/oauth/v2/token");
        let form = form_of(&req);
        assert_eq!(value(&form, "grant_type"), Some("password"));
        assert_eq!(value(&form, "client_id"), Some("cid"));
        assert_eq!(value(&form, "client_secret"), Some("csecret"));
        assert_eq!(value(&form, "username"), Some("wallabag"));
        assert_eq!(value(&form, "access_token"), None);
    }

    #[test]
    fn invalid_extension_fails_at_construction() {
        let err = WallabagClient::builder(HOST).extension("docx").build().unwrap_err();
        assert!(matches!(err, ApiError::InvalidFormat(_)));
    }

    #[test]
    fn invalid_host_fails_at_construction() {
        assert!(matches!(
            WallabagClient::new("not a url", "t").unwrap_err(),
            ApiError::InvalidHost(_)
        ));
        assert!(matches!(
            WallabagClient::new("mailto:me@example.org", "t").unwrap_err(),
            ApiError::InvalidHost(_)
        ));
    }

    #[test]
    fn set_token_changes_subsequent_requests() {
        let mut c = client();
        c.set_token("fresh");
        assert_eq!(c.token(), "fresh");
        assert_eq!(value(&query_of(&c.build_get_tags()), "access_token"), Some("fresh"));
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("tok\""));
    }

    #[test]
    fn build_query_dispatches_by_verb_name() {
        let req = client()
            .build_query("patch", "/api/entries/1.json", vec![("title".into(), "x".into())])
            .unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.path, "http://localhost:3000/api/entries/1.json");
        assert_eq!(value(&form_of(&req), "title"), Some("x"));
    }

    #[test]
    fn build_query_keeps_the_query_string_of_the_path() {
        let req = client()
            .build_query("get", "/api/entries.json?perPage=5", vec![("page".into(), "2".into())])
            .unwrap();
        assert_eq!(path_of(&req), "/api/entries.json");
        assert_eq!(
            query_of(&req),
            [
                ("perPage".to_string(), "5".to_string()),
                ("page".to_string(), "2".to_string()),
                ("access_token".to_string(), "tok".to_string()),
            ]
        );
    }

    #[test]
    fn build_query_does_not_reencode_escaped_paths() {
        let req = client()
            .build_query("delete", "/api/tags/read%20later.json", Params::new())
            .unwrap();
        assert_eq!(req.path, "http://localhost:3000/api/tags/read%20later.json?access_token=tok");
    }

    #[test]
    fn build_query_appends_to_host_subpath() {
        let c = WallabagClient::new("https://example.org/wallabag/", "t").unwrap();
        let req = c.build_query("get", "api/version.json", Params::new()).unwrap();
        assert_eq!(path_of(&req), "/wallabag/api/version.json");
    }

    #[test]
    fn build_query_rejects_unknown_verb() {
        let err = client().build_query("head", "/api/version.json", Params::new()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidMethod(m) if m == "head"));
    }

    #[test]
    fn parse_json_success() {
        let parsed = parse_response(response(200, "application/json", br#"{"id":1}"#)).unwrap();
        assert_eq!(parsed.as_json().unwrap()["id"], 1);
    }

    #[test]
    fn parse_binary_returns_bytes_regardless_of_status() {
        for status in [200, 500] {
            let parsed = parse_response(response(status, "application/pdf", b"%PDF-1.4")).unwrap();
            assert_eq!(parsed, ApiResponse::Binary(b"%PDF-1.4".to_vec()));
        }
        let parsed = parse_response(response(200, "application/epub+zip", b"PK\x03\x04")).unwrap();
        assert_eq!(parsed.as_bytes(), Some(&b"PK\x03\x04"[..]));
    }

    #[test]
    fn binary_content_type_is_case_insensitive() {
        let parsed = parse_response(response(200, "Application/PDF", b"%PDF-1.4")).unwrap();
        assert_eq!(parsed.as_bytes(), Some(&b"%PDF-1.4"[..]));
    }

    #[test]
    fn parse_not_found_is_an_error() {
        let err = parse_response(response(404, "application/json", b"{}")).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, ApiError::Status { status: 404, ref body } if body == "{}"));
    }

    #[test]
    fn parse_not_modified_is_empty() {
        let parsed = parse_response(response(304, "text/html", b"")).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn parse_empty_body_is_empty() {
        assert!(parse_response(response(204, "", b"")).unwrap().is_empty());
    }

    #[tracing_test::traced_test]
    #[test]
    fn parse_malformed_json_degrades_to_empty() {
        let parsed = parse_response(response(200, "application/json", b"<html>oops")).unwrap();
        assert!(parsed.is_empty());
        assert!(logs_contain("response body is not JSON"));
    }

    #[tracing_test::traced_test]
    #[test]
    fn parse_error_envelope_is_logged() {
        let body = br#"{"errors":{"url":{"content":"This value should not be blank."}}}"#;
        let err = parse_response(response(400, "application/json", body)).unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(logs_contain("This value should not be blank."));
    }

    #[test]
    fn parse_token_success() {
        let body = br#"{"access_token":"abc","expires_in":3600,"token_type":"bearer"}"#;
        assert_eq!(parse_token(response(200, "application/json", body)).unwrap(), "abc");
    }

    #[test]
    fn parse_token_invalid_grant_is_an_error() {
        let body = br#"{"error":"invalid_grant","error_description":"Invalid username and password combination"}"#;
        let err = parse_token(response(400, "application/json", body)).unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn parse_token_without_token_field() {
        let err = parse_token(response(200, "application/json", br#"{"token_type":"bearer"}"#)).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
