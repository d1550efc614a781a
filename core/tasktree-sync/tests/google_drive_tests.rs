use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tasktree_sync::{
    GoogleDriveConfig, GoogleDriveStore, RemoteStore, Session, SyncConfig, SyncEngine, SyncError,
    SyncEvent,
};
use tasktree_types::AppDocument;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "ya29.test-token";

fn store_for(server: &MockServer) -> GoogleDriveStore {
    GoogleDriveStore::new(GoogleDriveConfig {
        api_base_url: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

fn millis(raw: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(raw)
        .unwrap()
        .timestamp_millis()
}

// ── Config defaults ─────────────────────────────────────────────

#[test]
fn google_drive_config_default() {
    let cfg = GoogleDriveConfig::default();
    assert_eq!(cfg.api_base_url, "https://www.googleapis.com");
    assert_eq!(cfg.http_timeout_secs, 60);
}

#[test]
fn google_drive_config_partial_json() {
    let cfg: GoogleDriveConfig =
        serde_json::from_str(r#"{"api_base_url":"http://localhost:9999"}"#).unwrap();
    assert_eq!(cfg.api_base_url, "http://localhost:9999");
    assert_eq!(cfg.http_timeout_secs, 60);
}

#[test]
fn google_drive_provider_name() {
    let store = GoogleDriveStore::new(GoogleDriveConfig::default()).unwrap();
    assert_eq!(store.provider_name(), "Google Drive");
    assert_eq!(store.config().api_base_url, "https://www.googleapis.com");
}

// ── locate ──────────────────────────────────────────────────────

#[tokio::test]
async fn locate_finds_file_by_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "name = 'TaskTree.json' and trashed = false"))
        .and(query_param("fields", "files(id,modifiedTime)"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "file-1", "modifiedTime": "2024-03-01T10:00:00.500Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let file = store.locate(TOKEN, "TaskTree.json").await.unwrap().unwrap();
    assert_eq!(file.id, "file-1");
    assert_eq!(
        file.modified_time.unwrap().timestamp_millis(),
        millis("2024-03-01T10:00:00.500Z")
    );
}

#[tokio::test]
async fn locate_returns_none_when_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.locate(TOKEN, "TaskTree.json").await.unwrap().is_none());
}

#[tokio::test]
async fn locate_picks_first_of_duplicates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                {"id": "older", "modifiedTime": "2024-01-01T00:00:00Z"},
                {"id": "newer", "modifiedTime": "2024-02-01T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let file = store.locate(TOKEN, "TaskTree.json").await.unwrap().unwrap();
    assert_eq!(file.id, "older");
}

#[tokio::test]
async fn locate_escapes_quotes_in_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", r"name = 'Bob\'s tasks.json' and trashed = false"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.locate(TOKEN, "Bob's tasks.json").await.unwrap().is_none());
}

#[tokio::test]
async fn locate_unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.locate(TOKEN, "TaskTree.json").await.unwrap_err();
    assert!(err.is_auth(), "{err:?}");
    assert!(err.to_string().contains("Invalid Credentials"));
}

#[tokio::test]
async fn forbidden_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.locate(TOKEN, "TaskTree.json").await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn server_error_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.locate(TOKEN, "TaskTree.json").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn malformed_listing_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.locate(TOKEN, "TaskTree.json").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let store = GoogleDriveStore::new(GoogleDriveConfig {
        api_base_url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    })
    .unwrap();

    let err = store.locate(TOKEN, "TaskTree.json").await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
    assert!(!err.is_auth());
}

// ── read_metadata / read_content ────────────────────────────────

#[tokio::test]
async fn read_metadata_returns_modified_time() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("fields", "id,modifiedTime"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "modifiedTime": "2024-03-01T10:00:07.125Z"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let modified = store.read_metadata(TOKEN, "file-1").await.unwrap();
    assert_eq!(modified.timestamp_millis(), millis("2024-03-01T10:00:07.125Z"));
}

#[tokio::test]
async fn read_metadata_without_timestamp_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.read_metadata(TOKEN, "file-1").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

#[tokio::test]
async fn read_content_downloads_media() {
    let server = MockServer::start().await;
    let body = serde_json::to_vec(&AppDocument::sample()).unwrap();

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let content = store.read_content(TOKEN, "file-1").await.unwrap();
    assert_eq!(content, body);
}

#[tokio::test]
async fn read_content_not_found_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.read_content(TOKEN, "gone").await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}

// ── write ───────────────────────────────────────────────────────

#[tokio::test]
async fn write_creates_with_post() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(query_param("fields", "id,modifiedTime"))
        .and(header(
            "content-type",
            "multipart/related; boundary=tasktree_boundary_2024",
        ))
        .and(body_string_contains(r#""name":"TaskTree.json""#))
        .and(body_string_contains(r#""darkMode":false"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "new-file",
            "modifiedTime": "2024-03-01T10:00:03.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let payload = serde_json::to_vec(&AppDocument::sample()).unwrap();
    let (id, modified) = store
        .write(TOKEN, None, "TaskTree.json", &payload)
        .await
        .unwrap();
    assert_eq!(id, "new-file");
    assert_eq!(modified.timestamp_millis(), millis("2024-03-01T10:00:03.000Z"));
}

#[tokio::test]
async fn write_overwrites_with_patch() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-1"))
        .and(query_param("uploadType", "multipart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "modifiedTime": "2024-03-01T10:00:09.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let (id, _) = store
        .write(TOKEN, Some("file-1"), "TaskTree.json", b"{}")
        .await
        .unwrap();
    assert_eq!(id, "file-1");
}

#[tokio::test]
async fn write_falls_back_to_metadata_read() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "modifiedTime": "2024-03-01T10:00:11.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let (_, modified) = store
        .write(TOKEN, Some("file-1"), "TaskTree.json", b"{}")
        .await
        .unwrap();
    assert_eq!(modified.timestamp_millis(), millis("2024-03-01T10:00:11.000Z"));
}

#[tokio::test]
async fn write_unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .write(TOKEN, None, "TaskTree.json", b"{}")
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

// ── Engine over Drive ───────────────────────────────────────────

#[tokio::test]
async fn engine_pulls_document_from_drive() {
    let server = MockServer::start().await;
    let remote_doc = AppDocument::sample();

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "file-1", "modifiedTime": "2024-03-01T10:00:00Z"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&remote_doc))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("fields", "id,modifiedTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "modifiedTime": "2024-03-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let (mut engine, mut events) =
        SyncEngine::new(Arc::new(store_for(&server)), SyncConfig::default());
    engine.start(Session::logged_in(TOKEN)).await;

    let pulled = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if let SyncEvent::DocumentReplaced(doc) = event {
                return Some(doc);
            }
        }
        None
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(pulled, remote_doc);
    assert_eq!(
        engine.watermark().await.timestamp().timestamp_millis(),
        millis("2024-03-01T10:00:00Z")
    );
    engine.stop().await;
}

#[tokio::test]
async fn engine_logs_out_on_revoked_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (mut engine, mut events) =
        SyncEngine::new(Arc::new(store_for(&server)), SyncConfig::default());
    engine.start(Session::logged_in(TOKEN)).await;

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SyncEvent::SessionInvalidated(_)), "{event:?}");
    assert_eq!(engine.phase().await, tasktree_sync::EnginePhase::Suspended);
}
