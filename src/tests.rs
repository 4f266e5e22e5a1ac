//! Integration tests for the CMS backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use reqwest::Client;
use tower::ServiceExt;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, ModuleSet, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PAGE_SIZE};
use crate::db::{init_database, Repository};
use crate::search::SearchIndex;
use crate::storage::BlobStore;
use crate::{create_router, AppState};

/// Build application state backed by files under `temp_dir`.
async fn test_state(temp_dir: &TempDir, modules: ModuleSet) -> AppState {
    let db_path = temp_dir.path().join("test.sqlite");
    let index_path = temp_dir.path().join("index");
    let upload_dir = temp_dir.path().join("uploads");

    // Initialize database
    let pool = init_database(&db_path).await.expect("Failed to init DB");
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&index_path).expect("Failed to init search"));

    let storage = Arc::new(
        BlobStore::open(&upload_dir, "/uploads")
            .await
            .expect("Failed to init storage"),
    );

    let config = Config {
        db_path,
        index_path,
        upload_dir,
        public_url: "/uploads".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        page_size: DEFAULT_PAGE_SIZE,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        modules,
    };

    AppState {
        repo,
        search,
        storage,
        config: Arc::new(config),
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_modules(ModuleSet::ALL).await
    }

    async fn with_modules(modules: ModuleSet) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(&temp_dir, modules).await;

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    /// Create an entity and return its id.
    async fn create(&self, collection: &str, body: Value) -> String {
        let (status, body) = self.post(&format!("/api/{}", collection), body).await;
        assert_eq!(status, 200, "create failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_catalog_is_seeded() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/components").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    for name in [
        "text-block",
        "text-editor-block",
        "image-block",
        "accordion-block",
        "list-block",
    ] {
        assert!(names.contains(&name), "missing {}", name);
    }

    let (status, body) = fixture.get("/api/components/accordion-block").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["type"], "accordion-block");

    let (status, body) = fixture.get("/api/components/text-block/default").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!([]));

    let (status, body) = fixture.get("/api/components/video-block").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_text_block_stored_and_decoded() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create(
            "pages",
            json!({
                "name": "Home",
                "elements": [{ "component_id": "text-block", "content": "Hello" }]
            }),
        )
        .await;

    let (status, body) = fixture.get(&format!("/api/pages/{}/entries", id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"][0]["data"], r#"["Hello"]"#);

    let (status, body) = fixture.get("/api/public/pages/home").await;
    assert_eq!(status, 200);
    let component = &body["data"]["components"][0];
    assert_eq!(component["type"], "text-block");
    assert_eq!(component["content"], json!(["Hello"]));
}

#[tokio::test]
async fn test_image_block_paths_stored() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create(
            "sections",
            json!({
                "name": "Gallery",
                "elements": [{ "componentId": "image-block", "content": ["/a.png", "/b.png"] }]
            }),
        )
        .await;

    let (_, body) = fixture.get(&format!("/api/sections/{}/entries", id)).await;
    assert_eq!(body["data"][0]["data"], r#"["/a.png","/b.png"]"#);
}

#[tokio::test]
async fn test_update_replaces_entries() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create(
            "pages",
            json!({
                "name": "About",
                "elements": [
                    { "component_id": "text-block", "content": "Intro" },
                    { "component_id": "image-block", "content": "[\"/team.png\"]" }
                ]
            }),
        )
        .await;

    let (status, body) = fixture
        .put(
            &format!("/api/pages/{}", id),
            json!({
                "elements": [{ "component_id": "image-block", "content": "[\"/team.png\"]" }]
            }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let (_, body) = fixture.get(&format!("/api/pages/{}/entries", id)).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["component_id"], "image-block");

    // The detail view carries the same entries.
    let (_, body) = fixture.get("/api/pages/about").await;
    assert_eq!(body["data"]["name"], "About");
    assert_eq!(body["data"]["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_keeps_incoming_order() {
    let fixture = TestFixture::new().await;
    let id = fixture.create("personas", json!({ "name": "Founder" })).await;

    let order = ["list-block", "text-block", "accordion-block", "image-block"];
    let elements: Vec<Value> = order
        .iter()
        .map(|c| json!({ "component_id": c, "content": "" }))
        .collect();
    let (status, _) = fixture
        .put(&format!("/api/personas/{}", id), json!({ "elements": elements }))
        .await;
    assert_eq!(status, 200);

    let (_, body) = fixture.get(&format!("/api/personas/{}/entries", id)).await;
    let stored: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["component_id"].as_str().unwrap())
        .collect();
    assert_eq!(stored, order);

    // An update without elements clears them.
    let (status, _) = fixture
        .put(&format!("/api/personas/{}", id), json!({ "title": "Founders" }))
        .await;
    assert_eq!(status, 200);
    let (_, body) = fixture.get(&format!("/api/personas/{}/entries", id)).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_malformed_editor_content_falls_back() {
    let fixture = TestFixture::new().await;

    fixture
        .create(
            "pages",
            json!({
                "name": "Notes",
                "elements": [{ "component_id": "text-editor-block", "content": "not json" }]
            }),
        )
        .await;

    let (status, body) = fixture.get("/api/public/pages/notes").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["components"][0]["content"], json!(["not json"]));

    let (_, body) = fixture.get("/api/public/pages/notes/render").await;
    assert_eq!(
        body["data"]["blocks"][0]["html"],
        r#"<div class="text-editor-block">not json</div>"#
    );
}

#[tokio::test]
async fn test_service_cycle_rejected() {
    let fixture = TestFixture::new().await;

    let a = fixture.create("services", json!({ "name": "A" })).await;
    let b = fixture
        .create("services", json!({ "name": "B", "parentId": a }))
        .await;

    let (status, body) = fixture
        .put(&format!("/api/services/{}", a), json!({ "parentId": b }))
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["success"], false);
    assert!(body["error"]["details"]["fields"]["parentId"].is_string());

    let (status, _) = fixture
        .put(&format!("/api/services/{}", a), json!({ "parentId": a }))
        .await;
    assert_eq!(status, 422);

    let (_, body) = fixture.get(&format!("/api/services/{}", a)).await;
    assert!(body["data"].get("parentId").is_none());

    // Detaching with null is allowed.
    let (status, body) = fixture
        .put(&format!("/api/services/{}", b), json!({ "parentId": null }))
        .await;
    assert_eq!(status, 200);
    assert!(body["data"].get("parentId").is_none());
}

#[tokio::test]
async fn test_unknown_component_rejects_whole_save() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create(
            "pages",
            json!({
                "name": "Keep",
                "elements": [{ "component_id": "text-block", "content": "original" }]
            }),
        )
        .await;

    let (status, body) = fixture
        .put(
            &format!("/api/pages/{}", id),
            json!({
                "elements": [
                    { "component_id": "text-block", "content": "new" },
                    { "component_id": "gone-block", "content": "x" }
                ]
            }),
        )
        .await;
    assert_eq!(status, 422);
    assert_eq!(
        body["error"]["details"]["fields"]["elements[1].component_id"],
        "Selected component type no longer exists"
    );

    let (_, body) = fixture.get(&format!("/api/pages/{}/entries", id)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["data"], r#"["original"]"#);
}

#[tokio::test]
async fn test_unknown_type_renders_nothing() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/components",
            json!({ "name": "video-block", "description": "Embedded video" }),
        )
        .await;
    assert_eq!(status, 200);
    let video_id = body["data"]["id"].as_str().unwrap().to_string();

    fixture
        .create(
            "pages",
            json!({
                "name": "Media",
                "elements": [
                    { "component_id": video_id, "content": { "src": "clip.mp4" } },
                    { "component_id": "text-block", "content": "Caption" }
                ]
            }),
        )
        .await;

    let (status, body) = fixture.get("/api/public/pages/media/render").await;
    assert_eq!(status, 200);
    let blocks = body["data"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["type"], "text-block");

    // The public read API still exposes the raw data.
    let (_, body) = fixture.get("/api/public/pages/media").await;
    assert_eq!(body["data"]["components"][0]["content"], json!({ "src": "clip.mp4" }));

    // A template in use cannot be removed.
    let (status, body) = fixture.delete(&format!("/api/components/{}", video_id)).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_delete_entity() {
    let fixture = TestFixture::new().await;

    let id = fixture
        .create(
            "sections",
            json!({
                "name": "Footer",
                "elements": [{ "component_id": "text-block", "content": "bye" }]
            }),
        )
        .await;

    let (status, _) = fixture.delete(&format!("/api/sections/{}", id)).await;
    assert_eq!(status, 200);

    let (status, _) = fixture.get(&format!("/api/sections/{}/entries", id)).await;
    assert_eq!(status, 404);
    let (status, _) = fixture.delete(&format!("/api/sections/{}", id)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_validation_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.post("/api/pages", json!({ "name": "  " })).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["fields"]["name"].is_string());

    fixture.create("pages", json!({ "name": "Pricing" })).await;
    let (status, body) = fixture
        .post("/api/pages", json!({ "name": "Other", "slug": "pricing" }))
        .await;
    assert_eq!(status, 422);
    assert!(body["error"]["details"]["fields"]["slug"].is_string());

    let (status, body) = fixture
        .post("/api/pages", json!({ "name": "Child", "parentId": "x" }))
        .await;
    assert_eq!(status, 422);
    assert!(body["error"]["details"]["fields"]["parentId"].is_string());

    let (status, body) = fixture
        .post("/api/services", json!({ "name": "Tax", "personaIds": ["nobody"] }))
        .await;
    assert_eq!(status, 422);
    assert!(body["error"]["details"]["fields"]["personaIds"].is_string());
}

#[tokio::test]
async fn test_pagination() {
    let fixture = TestFixture::new().await;
    for name in ["One", "Two", "Three"] {
        fixture.create("personas", json!({ "name": name })).await;
    }

    let (status, body) = fixture.get("/api/personas?page=2&perPage=2").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["perPage"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_disabled_module_is_not_found() {
    let fixture = TestFixture::with_modules(ModuleSet::PAGES | ModuleSet::SERVICES).await;

    let (status, _) = fixture.get("/api/pages").await;
    assert_eq!(status, 200);

    let (status, body) = fixture.get("/api/personas").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.post("/api/personas", json!({ "name": "X" })).await;
    assert_eq!(status, 404);

    let (status, _) = fixture.get("/api/widgets").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_upload_serve_and_delete() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/uploads?filename=logo.png"))
        .body("fake-png")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

    let resp = fixture.client.get(fixture.url(&url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "fake-png");

    let resp = fixture
        .client
        .delete(fixture.url("/api/uploads"))
        .json(&json!({ "url": url }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture.client.get(fixture.url(&url)).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .post(fixture.url("/api/uploads"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_search_finds_component_text() {
    let fixture = TestFixture::new().await;

    fixture
        .create(
            "services",
            json!({
                "name": "Bookkeeping",
                "elements": [{
                    "component_id": "accordion-block",
                    "content": [{ "title": "Invoices", "content": "We reconcile quarterly ledgers" }]
                }]
            }),
        )
        .await;
    fixture.create("pages", json!({ "name": "Ledgers explained" })).await;

    // Give the reader time to pick up the commit.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let (status, body) = fixture.get("/api/search?q=ledgers").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = fixture.get("/api/search?q=ledgers&kind=services").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["results"][0]["name"], "Bookkeeping");

    let (status, _) = fixture.get("/api/search?q=ledgers&kind=widgets").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_search_paging_bounds() {
    let fixture = TestFixture::with_modules(ModuleSet::PAGES | ModuleSet::SERVICES).await;
    for name in ["Audit one", "Audit two", "Audit three"] {
        fixture.create("pages", json!({ "name": name })).await;
    }
    fixture.create("services", json!({ "name": "Audit" })).await;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let (status, body) = fixture.get("/api/search?q=audit&limit=0").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["limit"], 1);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 1);

    let (status, body) = fixture
        .get(&format!("/api/search?q=audit&offset={}", usize::MAX))
        .await;
    assert_eq!(status, 200);
    assert!(body["data"]["results"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total"], 4);

    let (_, body) = fixture.get("/api/search?q=audit&kind=pages&limit=2&offset=2").await;
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn test_router_gates_disabled_modules_in_process() {
    let temp_dir = TempDir::new().unwrap();
    let state = test_state(&temp_dir, ModuleSet::PAGES).await;
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::get("/api/pages").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/api/services").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
