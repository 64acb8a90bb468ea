//! Full lifecycle test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `Wallabag`
//! operation over real HTTP. Validates that request building, the ureq
//! transport and response parsing agree with the server end-to-end.

use mock_server::{ACCESS_TOKEN, CLIENT_ID, CLIENT_SECRET, PASSWORD, USERNAME};
use wallabag_core::{
    Annotation, AnnotationList, AnnotationRange, AnnotationUpdate, ApiError, ApiResponse, Credentials,
    EntriesPage, EntriesQuery, Entry, EntryExists, EntryPatch, NewAnnotation, NewEntry, Tag,
    Wallabag, WallabagClient,
};

/// Serve the mock on its own runtime thread and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
    });

    format!("http://{addr}")
}

fn credentials() -> Credentials {
    Credentials::new(CLIENT_ID, CLIENT_SECRET, USERNAME, PASSWORD)
}

fn json<T: serde::de::DeserializeOwned>(response: ApiResponse) -> T {
    response.deserialize().unwrap()
}

#[test]
fn token_exchange() {
    let host = start_server();

    let token = Wallabag::get_token(&host, &credentials()).unwrap();
    assert_eq!(token, ACCESS_TOKEN);

    let bad = Credentials::new(CLIENT_ID, CLIENT_SECRET, USERNAME, "wrong");
    let err = Wallabag::get_token(&host, &bad).unwrap_err();
    assert_eq!(err.status_code(), Some(400));
}

#[test]
fn refresh_token_replaces_stored_token() {
    let host = start_server();
    let client = WallabagClient::builder(&host)
        .token("stale")
        .client_id(CLIENT_ID)
        .client_secret(CLIENT_SECRET)
        .build()
        .unwrap();
    let mut wallabag = Wallabag::new(client);

    let err = wallabag.version().unwrap_err();
    assert_eq!(err.status_code(), Some(401));

    let token = wallabag.refresh_token(USERNAME, PASSWORD).unwrap();
    assert_eq!(token, ACCESS_TOKEN);
    assert_eq!(wallabag.client().token(), ACCESS_TOKEN);

    let version: String = json(wallabag.version().unwrap());
    assert!(!version.is_empty());
}

#[test]
fn entry_lifecycle() {
    // Step 1: start mock server and authenticate.
    let host = start_server();
    let token = Wallabag::get_token(&host, &credentials()).unwrap();
    let wallabag = Wallabag::new(WallabagClient::new(&host, &token).unwrap());

    // Step 2: list is empty.
    let page: EntriesPage = json(wallabag.get_entries(&EntriesQuery::new()).unwrap());
    assert_eq!(page.total, 0);
    assert!(page.items().is_empty());

    // Step 3: create an entry with tags.
    let created: Entry = json(
        wallabag
            .post_entry(
                &NewEntry::new("http://example.org/article")
                    .title("An article")
                    .tags(["foo", "bar"])
                    .starred(1),
            )
            .unwrap(),
    );
    assert_eq!(created.title.as_deref(), Some("An article"));
    assert_eq!(created.tag_labels(), ["foo", "bar"]);
    assert_eq!(created.is_starred, 1);
    let id = created.id;

    // Step 4: get it back and find it through filters.
    let fetched: Entry = json(wallabag.get_entry(id).unwrap());
    assert_eq!(fetched, created);

    let page: EntriesPage = json(
        wallabag
            .get_entries(&EntriesQuery::new().starred(1).tags(["foo"]))
            .unwrap(),
    );
    assert_eq!(page.total, 1);
    assert_eq!(page.items()[0].id, id);

    let page: EntriesPage = json(wallabag.get_entries(&EntriesQuery::new().archive(1)).unwrap());
    assert_eq!(page.total, 0);

    // Step 5: exists by url.
    let exists: serde_json::Value = json(
        wallabag
            .entries_exists(&EntryExists::url("http://example.org/article"))
            .unwrap(),
    );
    assert_eq!(exists["exists"], true);

    // Step 6: patch only the archive flag.
    let patched: Entry = json(wallabag.patch_entry(id, &EntryPatch::new().archive(1)).unwrap());
    assert_eq!(patched.is_archived, 1);
    assert_eq!(patched.title.as_deref(), Some("An article"));

    // Step 7: reload is "not modified", which parses as empty.
    assert!(wallabag.reload_entry(id).unwrap().is_empty());

    // Step 8: tags.
    let tagged: Entry = json(wallabag.post_entry_tags(id, ["read later"]).unwrap());
    assert_eq!(tagged.tag_labels(), ["foo", "bar", "read later"]);

    let untagged: Entry = json(wallabag.delete_entry_tag(id, "read later").unwrap());
    assert_eq!(untagged.tag_labels(), ["foo", "bar"]);

    let tags: Vec<Tag> = json(wallabag.get_entry_tags(id).unwrap());
    assert_eq!(tags.len(), 2);

    let removed: Tag = json(wallabag.delete_tag_label("foo").unwrap());
    assert_eq!(removed.label, "foo");

    let all: Vec<Tag> = json(wallabag.get_tags().unwrap());
    let labels: Vec<_> = all.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, ["bar", "read later"]);

    let removed: Vec<Tag> = json(wallabag.delete_tags_label(["bar", "read later"]).unwrap());
    assert_eq!(removed.len(), 2);

    // Step 9: delete, then the entry is gone.
    let deleted: Entry = json(wallabag.delete_entry(id).unwrap());
    assert_eq!(deleted.id, id);

    let err = wallabag.get_entry(id).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
}

#[test]
fn export_pdf_returns_bytes() {
    let host = start_server();
    let wallabag = Wallabag::new(WallabagClient::new(&host, ACCESS_TOKEN).unwrap());
    let created: Entry = json(
        wallabag
            .post_entry(&NewEntry::new("http://example.org/paper").title("Paper"))
            .unwrap(),
    );

    let pdf_client = WallabagClient::builder(&host)
        .token(ACCESS_TOKEN)
        .extension("pdf")
        .build()
        .unwrap();
    let exported = Wallabag::new(pdf_client).get_entry_export(created.id).unwrap();

    let bytes = exported.as_bytes().unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn annotation_lifecycle() {
    let host = start_server();
    let wallabag = Wallabag::new(WallabagClient::new(&host, ACCESS_TOKEN).unwrap());
    let entry: Entry = json(wallabag.post_entry(&NewEntry::new("http://example.org/a")).unwrap());

    let range = AnnotationRange {
        start: "/p[1]".to_string(),
        start_offset: 0,
        end: "/p[1]".to_string(),
        end_offset: 12,
    };
    let created: Annotation = json(
        wallabag
            .post_annotation(
                entry.id,
                &NewAnnotation::new("worth it")
                    .quote("Lorem ipsum")
                    .range(range.clone()),
            )
            .unwrap(),
    );
    assert_eq!(created.text, "worth it");
    assert_eq!(created.ranges, [range]);

    let updated: Annotation = json(
        wallabag
            .put_annotation(created.id, &AnnotationUpdate::new().text("changed my mind"))
            .unwrap(),
    );
    assert_eq!(updated.text, "changed my mind");

    let list: AnnotationList = json(wallabag.get_annotations(entry.id).unwrap());
    assert_eq!(list.total, 1);
    assert_eq!(list.rows[0].id, created.id);

    wallabag.delete_annotation(created.id).unwrap();
    let list: AnnotationList = json(wallabag.get_annotations(entry.id).unwrap());
    assert_eq!(list.total, 0);
}

#[test]
fn generic_query_dispatch() {
    let host = start_server();
    let wallabag = Wallabag::new(WallabagClient::new(&host, ACCESS_TOKEN).unwrap());

    let version: String = json(wallabag.query("get", "/api/version.json", Vec::new()).unwrap());
    assert!(!version.is_empty());

    let created: Entry = json(
        wallabag
            .query(
                "POST",
                "api/entries.json",
                vec![("url".to_string(), "http://example.org/q".to_string())],
            )
            .unwrap(),
    );
    assert_eq!(created.url.as_deref(), Some("http://example.org/q"));

    let err = wallabag.query("fetch", "/api/version.json", Vec::new()).unwrap_err();
    assert!(matches!(err, ApiError::InvalidMethod(_)));
}

#[test]
fn unreachable_host_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = WallabagClient::new(&format!("http://127.0.0.1:{port}"), ACCESS_TOKEN).unwrap();

    let err = Wallabag::new(client).version().unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
