use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use todo_service::db::Database;
use todo_service::service::TodoService;
use todo_service::{create_app, AppState};

struct TestServer {
    addr: String,
    client: Client,
    _dir: Option<TempDir>,
}

impl TestServer {
    async fn new() -> Self {
        let db = Database::connect(":memory:", Duration::from_secs(10))
            .await
            .expect("Failed to create in-memory database");
        Self::start(db, "", None).await
    }

    async fn with_base_path(base_path: &str) -> Self {
        let db = Database::connect(":memory:", Duration::from_secs(10))
            .await
            .expect("Failed to create in-memory database");
        Self::start(db, base_path, None).await
    }

    /// Server backed by a database file the test can tamper with.
    async fn on_disk() -> (Self, PathBuf) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("todos.db");
        let db = Database::connect(path.to_str().unwrap(), Duration::from_secs(10))
            .await
            .expect("Failed to create database file");
        (Self::start(db, "", Some(dir)).await, path)
    }

    async fn start(db: Database, base_path: &str, dir: Option<TempDir>) -> Self {
        let state = AppState {
            todos: TodoService::new(&db),
            base_path: Arc::new(base_path.to_string()),
            static_dir: Arc::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")),
            request_timeout: Duration::from_secs(60),
        };
        let app = create_app(state);

        // Bind to random available port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = format!("http://{}", listener.local_addr().unwrap());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            addr,
            client: Client::new(),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    async fn create(&self, title: &str) -> String {
        let resp = self
            .client
            .post(self.url("/todo"))
            .json(&json!({ "title": title }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn list(&self) -> Vec<Value> {
        let resp = self.client.get(self.url("/todo")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["data"].as_array().unwrap().clone()
    }
}

fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[tokio::test]
async fn test_buy_milk_scenario() {
    let server = TestServer::new().await;

    // Create
    let resp = server
        .client
        .post(server.url("/todo"))
        .json(&json!({"title": "buy milk"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Todo created successfully");
    let id = body["id"].as_str().unwrap().to_string();
    assert!(is_object_id(&id), "unexpected id {id}");

    // List
    let resp = server.client.get(server.url("/todo")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "All todos retrieved");
    let todos = body["data"].as_array().unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["id"], id);
    assert_eq!(todos[0]["title"], "buy milk");
    assert_eq!(todos[0]["completed"], false);
    let created_at = todos[0]["created_at"].as_str().unwrap().to_string();

    // Update
    let resp = server
        .client
        .put(server.url(&format!("/todo/{}", id)))
        .json(&json!({"title": "buy milk", "completed": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["modifiedCount"], 1);

    let todos = server.list().await;
    assert_eq!(todos[0]["completed"], true);
    assert_eq!(todos[0]["created_at"], created_at);
    assert_eq!(todos[0]["id"], id);

    // Delete
    let resp = server
        .client
        .delete(server.url(&format!("/todo/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deletedCount"], 1);
    assert!(server.list().await.is_empty());

    // Delete again
    let resp = server
        .client
        .delete(server.url(&format!("/todo/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].is_string());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_empty() {
    let server = TestServer::new().await;
    assert!(server.list().await.is_empty());
}

#[tokio::test]
async fn test_created_at_is_rfc3339() {
    let server = TestServer::new().await;
    server.create("timestamped").await;

    let todos = server.list().await;
    let created_at = todos[0]["created_at"].as_str().unwrap();
    time::OffsetDateTime::parse(created_at, &time::format_description::well_known::Rfc3339)
        .expect("created_at should be RFC 3339");
}

#[tokio::test]
async fn test_ids_are_unique() {
    let server = TestServer::new().await;
    let first = server.create("one").await;
    let second = server.create("two").await;
    assert_ne!(first, second);
    assert_eq!(server.list().await.len(), 2);
}

#[tokio::test]
async fn test_create_rejects_blank_title() {
    let server = TestServer::new().await;

    for body in [json!({"title": ""}), json!({"title": "   "}), json!({})] {
        let resp = server
            .client
            .post(server.url("/todo"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "title cannot be empty");
    }

    assert!(server.list().await.is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let server = TestServer::new().await;

    let resp = server
        .client
        .post(server.url("/todo"))
        .header("content-type", "application/json")
        .body("{\"title\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "could not decode data");

    assert!(server.list().await.is_empty());
}

#[tokio::test]
async fn test_update_rejects_malformed_json_without_writing() {
    let server = TestServer::new().await;
    let id = server.create("unchanged").await;

    let resp = server
        .client
        .put(server.url(&format!("/todo/{}", id)))
        .header("content-type", "application/json")
        .body("{\"title\": \"changed\", \"completed\": tru")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "could not decode data");

    let todos = server.list().await;
    assert_eq!(todos[0]["title"], "unchanged");
    assert_eq!(todos[0]["completed"], false);
}

#[tokio::test]
async fn test_update_rejects_empty_title() {
    let server = TestServer::new().await;
    let id = server.create("keep me").await;

    let resp = server
        .client
        .put(server.url(&format!("/todo/{}", id)))
        .json(&json!({"title": "", "completed": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let todos = server.list().await;
    assert_eq!(todos[0]["title"], "keep me");
    assert_eq!(todos[0]["completed"], false);
}

#[tokio::test]
async fn test_update_unknown_id_reports_zero() {
    let server = TestServer::new().await;

    let resp = server
        .client
        .put(server.url("/todo/65a1b2c3d4e5f60718293a4b"))
        .json(&json!({"title": "nobody", "completed": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["modifiedCount"], 0);
    assert!(server.list().await.is_empty());
}

#[tokio::test]
async fn test_update_only_touches_target() {
    let server = TestServer::new().await;
    let target = server.create("target").await;
    let other = server.create("other").await;

    let resp = server
        .client
        .put(server.url(&format!("/todo/{}", target)))
        .json(&json!({"title": "renamed", "completed": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let todos = server.list().await;
    let find = |id: &str| todos.iter().find(|t| t["id"] == id).unwrap().clone();
    assert_eq!(find(&target)["title"], "renamed");
    assert_eq!(find(&target)["completed"], true);
    assert_eq!(find(&other)["title"], "other");
    assert_eq!(find(&other)["completed"], false);
}

#[tokio::test]
async fn test_malformed_ids_rejected() {
    let server = TestServer::new().await;
    server.create("survivor").await;

    for id in ["123", "not-a-valid-object-id!!", "65A1B2C3D4E5F60718293A4B"] {
        let resp = server
            .client
            .put(server.url(&format!("/todo/{}", id)))
            .json(&json!({"title": "x", "completed": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "PUT {id}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "the id is invalid");

        let resp = server
            .client
            .delete(server.url(&format!("/todo/{}", id)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "DELETE {id}");
    }

    let todos = server.list().await;
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["title"], "survivor");
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let (server, path) = TestServer::on_disk().await;
    server.create("doomed").await;

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP TABLE documents").unwrap();

    let resp = server.client.get(server.url("/todo")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "could not fetch the todo collection");
    assert!(body["error"].as_str().unwrap().contains("documents"));

    let resp = server
        .client
        .post(server.url("/todo"))
        .json(&json!({"title": "lost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_landing_page() {
    let server = TestServer::new().await;

    let resp = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/html"));
    let body = resp.text().await.unwrap();
    assert!(body.contains("Todo List"));
}

#[tokio::test]
async fn test_static_assets() {
    let server = TestServer::new().await;

    let resp = server
        .client
        .get(server.url("/static/app.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("javascript"));
    let body = resp.text().await.unwrap();
    let on_disk =
        std::fs::read_to_string(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static/app.js"))
            .unwrap();
    assert_eq!(body, on_disk);

    let resp = server
        .client
        .get(server.url("/static/style.css"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .client
        .get(server.url("/static/unknown.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_base_path_nesting() {
    let server = TestServer::with_base_path("/app").await;

    let resp = server
        .client
        .post(server.url("/app/todo"))
        .json(&json!({"title": "nested"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server.client.get(server.url("/app/todo")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server.client.get(server.url("/todo")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server.client.get(server.url("/app")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains(r#"src="/app/static/app.js""#));
}
