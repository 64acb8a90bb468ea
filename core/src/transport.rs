//! Blocking executor for `WallabagClient` requests.
//!
//! `Wallabag` pairs a `WallabagClient` with a `ureq::Agent`: each method
//! builds the request, performs the round-trip and parses the response in
//! one call. HTTP error statuses come back from the agent as data so that
//! `parse_response` alone decides what counts as an error.

use std::time::Duration;

use tracing::{debug, instrument, Span};
use ureq::typestate::WithBody;
use ureq::RequestBuilder;

use crate::client::{
    parse_host, parse_response, parse_token, token_request, WallabagClient, DEFAULT_USER_AGENT,
};
use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::http::{ApiResponse, HttpMethod, HttpRequest, HttpResponse};
use crate::options::{
    AnnotationUpdate, Credentials, EntriesQuery, EntryExists, EntryPatch, NewAnnotation,
    NewEntry, Params,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exports can be whole ebooks, so allow more than ureq's default body limit.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking Wallabag API client.
///
/// ```rust,no_run
/// use wallabag_core::{Credentials, EntriesQuery, Wallabag, WallabagClient};
///
/// let credentials = Credentials::new("client-id", "client-secret", "wallabag", "wallabag");
/// let token = Wallabag::get_token("https://app.wallabag.it", &credentials)?;
/// let wallabag = Wallabag::new(WallabagClient::new("https://app.wallabag.it", &token)?);
/// let unread = wallabag.get_entries(&EntriesQuery::new().archive(0))?;
/// # Ok::<(), wallabag_core::ApiError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Wallabag {
    client: WallabagClient,
    agent: ureq::Agent,
}

impl Wallabag {
    pub fn new(client: WallabagClient) -> Self {
        Self::with_timeout(client, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(client: WallabagClient, timeout: Duration) -> Self {
        Self {
            client,
            agent: agent(timeout),
        }
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let client = WallabagClient::from_config(config)?;
        Ok(Self::with_timeout(client, Duration::from_millis(config.timeout_ms)))
    }

    pub fn client(&self) -> &WallabagClient {
        &self.client
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.client.set_token(token);
    }

    /// Exchange password-grant credentials for an access token at `host`,
    /// without needing a client first.
    pub fn get_token(host: &str, credentials: &Credentials) -> ApiResult<String> {
        let host = parse_host(host)?;
        let request = token_request(&host, DEFAULT_USER_AGENT, credentials);
        parse_token(send(&agent(DEFAULT_TIMEOUT), request)?)
    }

    /// Exchange `credentials` at this client's host. The stored token is not
    /// changed.
    pub fn request_token(&self, credentials: &Credentials) -> ApiResult<String> {
        let request = self.client.build_token_request(credentials);
        parse_token(self.execute(request)?)
    }

    /// Obtain a fresh token with the configured OAuth client and the given
    /// user, and use it for every later call.
    pub fn refresh_token(&mut self, username: &str, password: &str) -> ApiResult<String> {
        let credentials = self.client.credentials(username, password);
        let token = self.request_token(&credentials)?;
        self.client.set_token(token.as_str());
        Ok(token)
    }

    /// Perform the round-trip for an already built request.
    pub fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        send(&self.agent, request)
    }

    /// Generic dispatch by verb name and host-relative path.
    pub fn query(&self, method: &str, path: &str, params: Params) -> ApiResult<ApiResponse> {
        let request = self.client.build_query(method, path, params)?;
        self.call(request)
    }

    fn call(&self, request: HttpRequest) -> ApiResult<ApiResponse> {
        parse_response(self.execute(request)?)
    }

    // ENTRIES

    pub fn get_entries(&self, query: &EntriesQuery) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_entries(query))
    }

    pub fn post_entry(&self, entry: &NewEntry) -> ApiResult<ApiResponse> {
        self.call(self.client.build_post_entry(entry))
    }

    pub fn get_entry(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_entry(entry))
    }

    pub fn patch_entry(&self, entry: i64, patch: &EntryPatch) -> ApiResult<ApiResponse> {
        self.call(self.client.build_patch_entry(entry, patch))
    }

    pub fn delete_entry(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_delete_entry(entry))
    }

    pub fn get_entry_export(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_entry_export(entry))
    }

    pub fn reload_entry(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_reload_entry(entry))
    }

    pub fn entries_exists(&self, exists: &EntryExists) -> ApiResult<ApiResponse> {
        self.call(self.client.build_entries_exists(exists))
    }

    // TAGS

    pub fn get_tags(&self) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_tags())
    }

    pub fn get_tag(&self, tag: &str) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_tag(tag))
    }

    pub fn delete_tag(&self, tag: &str) -> ApiResult<ApiResponse> {
        self.call(self.client.build_delete_tag(tag))
    }

    pub fn get_entry_tags(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_entry_tags(entry))
    }

    pub fn post_entry_tags<I, S>(&self, entry: i64, tags: I) -> ApiResult<ApiResponse>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.call(self.client.build_post_entry_tags(entry, tags))
    }

    pub fn delete_entry_tag(&self, entry: i64, tag: &str) -> ApiResult<ApiResponse> {
        self.call(self.client.build_delete_entry_tag(entry, tag))
    }

    pub fn delete_tag_label(&self, tag: &str) -> ApiResult<ApiResponse> {
        self.call(self.client.build_delete_tag_label(tag))
    }

    pub fn delete_tags_label<I, S>(&self, tags: I) -> ApiResult<ApiResponse>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.call(self.client.build_delete_tags_label(tags))
    }

    // ANNOTATIONS

    pub fn get_annotations(&self, entry: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_annotations(entry))
    }

    pub fn post_annotation(&self, entry: i64, annotation: &NewAnnotation) -> ApiResult<ApiResponse> {
        self.call(self.client.build_post_annotation(entry, annotation))
    }

    pub fn put_annotation(&self, annotation: i64, update: &AnnotationUpdate) -> ApiResult<ApiResponse> {
        self.call(self.client.build_put_annotation(annotation, update))
    }

    pub fn delete_annotation(&self, annotation: i64) -> ApiResult<ApiResponse> {
        self.call(self.client.build_delete_annotation(annotation))
    }

    // VERSION

    pub fn version(&self) -> ApiResult<ApiResponse> {
        self.call(self.client.build_get_version())
    }
}

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: RequestBuilder<WithBody>,
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

/// The query string is left out of the span since it carries the token.
#[instrument(
    name = "wallabag_request",
    skip(agent, request),
    fields(
        http.method = %request.method,
        http.url = request.path.split('?').next().unwrap_or_default(),
        http.status_code = tracing::field::Empty,
    )
)]
fn send(agent: &ureq::Agent, request: HttpRequest) -> ApiResult<HttpResponse> {
    let HttpRequest {
        method,
        path,
        headers,
        body,
    } = request;

    let mut response = match method {
        HttpMethod::Get => with_headers(agent.get(&path), &headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(&path), &headers).call(),
        HttpMethod::Post => send_body(with_headers(agent.post(&path), &headers), body),
        HttpMethod::Patch => send_body(with_headers(agent.patch(&path), &headers), body),
        HttpMethod::Put => send_body(with_headers(agent.put(&path), &headers), body),
    }?;

    let status = response.status().as_u16();
    Span::current().record("http.status_code", status);

    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()?;
    debug!(status, bytes = body.len(), "response received");

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}
