//! In-memory fake of the Wallabag REST API.
//!
//! Only the JSON format is served, except for entry exports, which also
//! answer `pdf`, `epub` and `txt`. Every `/api` route wants a valid
//! `access_token` in the query string or the form body. The OAuth endpoint
//! hands out [`ACCESS_TOKEN`] for the fixed credentials below.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub const CLIENT_ID: &str = "1_3847efhvxack8gwog8scg8oowww0csogg4wwoogg0cg444g8k4";
pub const CLIENT_SECRET: &str = "i1j19n9e7mog0ook48gwo0kck88oskggwgswwg48gsw4sc8gk";
pub const USERNAME: &str = "wallabag";
pub const PASSWORD: &str = "wallabag";
pub const ACCESS_TOKEN: &str = "NzQ4ZjM4ZTA1YjNkNTA4YjRiMGNmZGU4NjYzNDYwNzM4OTQ0";
pub const VERSION: &str = "2.6.9";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    pub slug: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: String,
    pub is_archived: i64,
    pub is_starred: i64,
    pub is_public: bool,
    pub tags: Vec<Tag>,
    pub language: Option<String>,
    pub published_at: Option<String>,
    pub published_by: Vec<String>,
    pub origin_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start: String,
    pub start_offset: u32,
    pub end: String,
    pub end_offset: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    #[serde(skip)]
    pub entry_id: i64,
    pub text: String,
    pub quote: String,
    pub ranges: Vec<Range>,
}

/// Decoded query string or form body, keeping repeated keys.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Params(Vec<(String, String)>);

impl Params {
    fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, name: &str) -> Option<i64> {
        self.get(name)
            .and_then(|v| v.parse().ok())
            .filter(|v| *v == 0 || *v == 1)
    }

    fn number(&self, name: &str, default: usize) -> usize {
        self.get(name)
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    }

    fn has_token(&self) -> bool {
        self.get("access_token") == Some(ACCESS_TOKEN)
    }
}

/// Failures, rendered with the `{"errors": {...}}` envelope Wallabag uses
/// for validation problems.
#[derive(Debug)]
pub enum Failure {
    Unauthorized,
    InvalidGrant,
    NotFound(&'static str, String),
    BadRequest(&'static str, String),
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let envelope = |field: &str, content: String| json!({ "errors": { field: { "content": content } } });
        match self {
            Failure::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "access_denied",
                    "error_description": "OAuth2 authentication required",
                })),
            )
                .into_response(),
            Failure::InvalidGrant => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid username and password combination",
                })),
            )
                .into_response(),
            Failure::NotFound(field, content) => {
                (StatusCode::NOT_FOUND, Json(envelope(field, content))).into_response()
            }
            Failure::BadRequest(field, content) => {
                (StatusCode::BAD_REQUEST, Json(envelope(field, content))).into_response()
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Store {
    next_id: i64,
    entries: BTreeMap<i64, Entry>,
    tags: Vec<Tag>,
    annotations: BTreeMap<i64, Annotation>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn entry_mut(&mut self, id: i64) -> Result<&mut Entry, Failure> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| Failure::NotFound("entry", format!("Entry {id} not found")))
    }

    /// Existing tag with this label, or a new one.
    fn tag(&mut self, label: &str) -> Tag {
        if let Some(tag) = self.tags.iter().find(|t| t.label == label) {
            return tag.clone();
        }
        let tag = Tag {
            id: self.next_id(),
            label: label.to_string(),
            slug: label.to_lowercase().replace(' ', "-"),
        };
        self.tags.push(tag.clone());
        tag
    }

    fn add_tags(&mut self, id: i64, labels: &str) -> Result<(), Failure> {
        let tags: Vec<Tag> = split_labels(labels).map(|l| self.tag(l)).collect();
        let entry = self.entry_mut(id)?;
        for tag in tags {
            if !entry.tags.contains(&tag) {
                entry.tags.push(tag);
            }
        }
        Ok(())
    }

    /// Drop a tag (by label, slug or id) from the registry and every entry.
    fn remove_tag(&mut self, key: &str) -> Option<Tag> {
        let pos = self
            .tags
            .iter()
            .position(|t| t.label == key || t.slug == key || t.id.to_string() == key)?;
        let tag = self.tags.remove(pos);
        for entry in self.entries.values_mut() {
            entry.tags.retain(|t| t.id != tag.id);
        }
        Some(tag)
    }
}

fn split_labels(labels: &str) -> impl Iterator<Item = &str> {
    labels.split(',').map(str::trim).filter(|l| !l.is_empty())
}

/// `"12.json"` → `12`.
fn id_of(segment: &str) -> Result<i64, Failure> {
    strip_json(segment)
        .parse()
        .map_err(|_| Failure::NotFound("id", format!("{segment} is not a valid id")))
}

fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn authorize(query: &Params, form: Option<&Params>) -> Result<(), Failure> {
    if query.has_token() || form.is_some_and(Params::has_token) {
        Ok(())
    } else {
        debug!("rejecting request without a valid access_token");
        Err(Failure::Unauthorized)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/oauth/v2/token", post(token))
        .route("/api/version.json", get(version))
        .route("/api/entries.json", get(list_entries).post(create_entry))
        .route("/api/entries/exists.json", get(entries_exists))
        .route(
            "/api/entries/{id}",
            get(get_entry).patch(patch_entry).delete(delete_entry),
        )
        .route("/api/entries/{id}/tags.json", get(entry_tags).post(add_entry_tags))
        .route("/api/entries/{id}/reload.json", patch(reload_entry))
        .route("/api/entries/{id}/{export}", get(export_entry))
        .route("/api/entries/{id}/tags/{tag}", delete(delete_entry_tag))
        .route("/api/tags.json", get(list_tags))
        .route("/api/tags/{tag}", get(get_tag).delete(delete_tag))
        .route("/api/tag/label.json", delete(delete_tag_label))
        .route(
            "/api/annotations/{id}",
            get(list_annotations)
                .post(create_annotation)
                .put(update_annotation)
                .delete(delete_annotation),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn token(Form(form): Form<Params>) -> Result<Json<Value>, Failure> {
    let valid = form.get("grant_type") == Some("password")
        && form.get("client_id") == Some(CLIENT_ID)
        && form.get("client_secret") == Some(CLIENT_SECRET)
        && form.get("username") == Some(USERNAME)
        && form.get("password") == Some(PASSWORD);
    if !valid {
        return Err(Failure::InvalidGrant);
    }
    Ok(Json(json!({
        "access_token": ACCESS_TOKEN,
        "expires_in": 3600,
        "token_type": "bearer",
        "scope": null,
        "refresh_token": "bW9jay1yZWZyZXNoLXRva2Vu",
    })))
}

async fn version(Query(query): Query<Params>) -> Result<Json<Value>, Failure> {
    authorize(&query, None)?;
    Ok(Json(json!(VERSION)))
}

// ENTRIES

async fn list_entries(
    State(db): State<Db>,
    Query(query): Query<Params>,
) -> Result<Json<Value>, Failure> {
    authorize(&query, None)?;
    let store = db.read().await;
    let wanted: Vec<&str> = query.get("tags").map(split_labels).into_iter().flatten().collect();

    let mut items: Vec<&Entry> = store
        .entries
        .values()
        .filter(|e| query.flag("archive").is_none_or(|f| e.is_archived == f))
        .filter(|e| query.flag("starred").is_none_or(|f| e.is_starred == f))
        .filter(|e| wanted.iter().all(|w| e.tags.iter().any(|t| t.label == *w)))
        .collect();
    if query.get("order") != Some("asc") {
        items.reverse();
    }

    let limit = query.number("perPage", 30);
    let page = query.number("page", 1);
    let total = items.len();
    let pages = total.div_ceil(limit).max(1);
    let offset = (page - 1).saturating_mul(limit);
    let items: Vec<&Entry> = items.into_iter().skip(offset).take(limit).collect();

    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "pages": pages,
        "total": total,
        "_embedded": { "items": items },
    })))
}

async fn create_entry(
    State(db): State<Db>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, Some(&form))?;
    let url = form
        .get("url")
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Failure::BadRequest("url", "This value should not be blank.".into()))?;

    let mut store = db.write().await;
    let id = store.next_id();
    let entry = Entry {
        id,
        url: url.to_string(),
        title: form.get("title").unwrap_or(url).to_string(),
        content: form.get("content").unwrap_or_default().to_string(),
        is_archived: form.flag("archive").unwrap_or(0),
        is_starred: form.flag("starred").unwrap_or(0),
        is_public: form.flag("public") == Some(1),
        tags: Vec::new(),
        language: form.get("language").map(str::to_string),
        published_at: form.get("published_at").map(str::to_string),
        published_by: form
            .get("authors")
            .map(|a| split_labels(a).map(str::to_string).collect())
            .unwrap_or_default(),
        origin_url: form.get("original_url").map(str::to_string),
    };
    store.entries.insert(id, entry);
    if let Some(labels) = form.get("tags") {
        store.add_tags(id, labels)?;
    }
    Ok(Json(store.entry_mut(id)?.clone()))
}

async fn get_entry(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    Ok(Json(store.entry_mut(id)?.clone()))
}

async fn patch_entry(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, Some(&form))?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    if let Some(labels) = form.get("tags") {
        store.add_tags(id, labels)?;
    }
    let entry = store.entry_mut(id)?;
    if let Some(title) = form.get("title") {
        entry.title = title.to_string();
    }
    if let Some(archive) = form.flag("archive") {
        entry.is_archived = archive;
    }
    if let Some(starred) = form.flag("starred") {
        entry.is_starred = starred;
    }
    if let Some(public) = form.flag("public") {
        entry.is_public = public == 1;
    }
    Ok(Json(entry.clone()))
}

async fn delete_entry(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    let entry = store.entry_mut(id)?.clone();
    store.entries.remove(&id);
    store.annotations.retain(|_, a| a.entry_id != id);
    Ok(Json(entry))
}

/// Content can never be re-fetched here, so the answer is always the
/// "nothing changed" one.
async fn reload_entry(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<StatusCode, Failure> {
    authorize(&query, Some(&form))?;
    let id = id_of(&id)?;
    db.write().await.entry_mut(id)?;
    Ok(StatusCode::NOT_MODIFIED)
}

async fn export_entry(
    State(db): State<Db>,
    Path((id, export)): Path<(String, String)>,
    Query(query): Query<Params>,
) -> Result<Response, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    let entry = db.write().await.entry_mut(id)?.clone();
    let response = match export.as_str() {
        "export.json" => Json(entry).into_response(),
        "export.pdf" => (
            [(header::CONTENT_TYPE, "application/pdf")],
            format!("%PDF-1.4\n% {}\n%%EOF\n", entry.title).into_bytes(),
        )
            .into_response(),
        "export.epub" => {
            let mut bytes = b"PK\x03\x04".to_vec();
            bytes.extend_from_slice(b"mimetypeapplication/epub+zip");
            ([(header::CONTENT_TYPE, "application/epub+zip")], bytes).into_response()
        }
        "export.txt" => (
            [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
            format!("{}\n\n{}", entry.title, entry.content),
        )
            .into_response(),
        other => {
            return Err(Failure::BadRequest("format", format!("unsupported export {other}")));
        }
    };
    Ok(response)
}

async fn entries_exists(
    State(db): State<Db>,
    Query(query): Query<Params>,
) -> Result<Json<Value>, Failure> {
    authorize(&query, None)?;
    let store = db.read().await;
    let return_id = query.flag("return_id") == Some(1);
    let lookup = |url: &str| {
        let found = store.entries.values().find(|e| e.url == url).map(|e| e.id);
        if return_id {
            json!(found)
        } else {
            json!(found.is_some())
        }
    };

    if let Some(url) = query.get("url") {
        return Ok(Json(json!({ "exists": lookup(url) })));
    }
    let results: serde_json::Map<String, Value> = query
        .all("urls[]")
        .map(|url| (url.to_string(), lookup(url)))
        .collect();
    Ok(Json(Value::Object(results)))
}

// TAGS

async fn entry_tags(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Vec<Tag>>, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    Ok(Json(store.entry_mut(id)?.tags.clone()))
}

async fn add_entry_tags(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, Some(&form))?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    store.add_tags(id, form.get("tags").unwrap_or_default())?;
    Ok(Json(store.entry_mut(id)?.clone()))
}

async fn delete_entry_tag(
    State(db): State<Db>,
    Path((id, tag)): Path<(String, String)>,
    Query(query): Query<Params>,
) -> Result<Json<Entry>, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    let label = strip_json(&tag);
    let mut store = db.write().await;
    let entry = store.entry_mut(id)?;
    entry.tags.retain(|t| t.label != label);
    Ok(Json(entry.clone()))
}

async fn list_tags(State(db): State<Db>, Query(query): Query<Params>) -> Result<Json<Vec<Tag>>, Failure> {
    authorize(&query, None)?;
    Ok(Json(db.read().await.tags.clone()))
}

async fn get_tag(
    State(db): State<Db>,
    Path(tag): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Tag>, Failure> {
    authorize(&query, None)?;
    let key = strip_json(&tag);
    db.read()
        .await
        .tags
        .iter()
        .find(|t| t.label == key || t.slug == key || t.id.to_string() == key)
        .cloned()
        .map(Json)
        .ok_or_else(|| Failure::NotFound("tag", format!("Tag {key} not found")))
}

async fn delete_tag(
    State(db): State<Db>,
    Path(tag): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Tag>, Failure> {
    authorize(&query, None)?;
    let key = strip_json(&tag);
    db.write()
        .await
        .remove_tag(key)
        .map(Json)
        .ok_or_else(|| Failure::NotFound("tag", format!("Tag {key} not found")))
}

/// `?tag=x` removes one tag and returns it; `?tags=a, b` removes several
/// and returns the ones that existed.
async fn delete_tag_label(
    State(db): State<Db>,
    Query(query): Query<Params>,
) -> Result<Json<Value>, Failure> {
    authorize(&query, None)?;
    let mut store = db.write().await;
    if let Some(label) = query.get("tag") {
        let tag = store
            .remove_tag(label)
            .ok_or_else(|| Failure::NotFound("tag", format!("Tag {label} not found")))?;
        return Ok(Json(json!(tag)));
    }
    let labels = query.get("tags").unwrap_or_default();
    let removed: Vec<Tag> = split_labels(labels)
        .filter_map(|label| store.remove_tag(label))
        .collect();
    Ok(Json(json!(removed)))
}

// ANNOTATIONS

async fn list_annotations(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Value>, Failure> {
    authorize(&query, None)?;
    let entry_id = id_of(&id)?;
    let mut store = db.write().await;
    store.entry_mut(entry_id)?;
    let rows: Vec<&Annotation> = store
        .annotations
        .values()
        .filter(|a| a.entry_id == entry_id)
        .collect();
    Ok(Json(json!({ "total": rows.len(), "rows": rows })))
}

/// Rebuild `ranges[i][field]` form keys into ranges.
fn ranges_from(form: &Params) -> Vec<Range> {
    let mut ranges: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
    for (key, value) in &form.0 {
        let Some(rest) = key.strip_prefix("ranges[") else {
            continue;
        };
        let Some((index, field)) = rest.split_once("][") else {
            continue;
        };
        let (Ok(index), Some(field)) = (index.parse(), field.strip_suffix(']')) else {
            continue;
        };
        ranges
            .entry(index)
            .or_default()
            .insert(field.to_string(), value.clone());
    }
    ranges
        .into_values()
        .map(|fields| {
            let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
            let offset = |name: &str| fields.get(name).and_then(|v| v.parse().ok()).unwrap_or(0);
            Range {
                start: text("start"),
                start_offset: offset("startOffset"),
                end: text("end"),
                end_offset: offset("endOffset"),
            }
        })
        .collect()
}

async fn create_annotation(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<Annotation>, Failure> {
    authorize(&query, Some(&form))?;
    let entry_id = id_of(&id)?;
    let mut store = db.write().await;
    store.entry_mut(entry_id)?;
    let annotation = Annotation {
        id: store.next_id(),
        entry_id,
        text: form.get("text").unwrap_or_default().to_string(),
        quote: form.get("quote").unwrap_or_default().to_string(),
        ranges: ranges_from(&form),
    };
    store.annotations.insert(annotation.id, annotation.clone());
    Ok(Json(annotation))
}

async fn update_annotation(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<Annotation>, Failure> {
    authorize(&query, Some(&form))?;
    let id = id_of(&id)?;
    let mut store = db.write().await;
    let annotation = store
        .annotations
        .get_mut(&id)
        .ok_or_else(|| Failure::NotFound("annotation", format!("Annotation {id} not found")))?;
    if let Some(text) = form.get("text") {
        annotation.text = text.to_string();
    }
    Ok(Json(annotation.clone()))
}

async fn delete_annotation(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<Params>,
) -> Result<Json<Annotation>, Failure> {
    authorize(&query, None)?;
    let id = id_of(&id)?;
    db.write()
        .await
        .annotations
        .remove(&id)
        .map(Json)
        .ok_or_else(|| Failure::NotFound("annotation", format!("Annotation {id} not found")))
}
