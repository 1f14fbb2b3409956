//! End-to-end tests of the router over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;

use kitsync_api::{build_router, AppState, KitService, ServerConfig};
use kitsync_catalog::{CacheConfig, CatalogCache, CatalogSource};
use kitsync_core::{EventBus, FetchError, SystemClock, TemplateDetail, TemplateSummary};
use kitsync_db::MemoryStore;

struct StaticSource;

#[async_trait]
impl CatalogSource for StaticSource {
    async fn fetch_catalog(&self, _timeout: Duration) -> Result<Vec<TemplateSummary>, FetchError> {
        Ok(vec![
            TemplateSummary {
                id: 1,
                title: "Agency".to_string(),
                kind: "page".to_string(),
                popularity_index: 5,
                published: 200,
                ..Default::default()
            },
            TemplateSummary {
                id: 2,
                title: "Bistro".to_string(),
                kind: "pack".to_string(),
                popularity_index: 9,
                published: 100,
                tags: vec!["food".to_string()],
                ..Default::default()
            },
        ])
    }

    async fn fetch_template(
        &self,
        template_id: i64,
        _timeout: Duration,
    ) -> Result<TemplateDetail, FetchError> {
        match template_id {
            1 => Ok(TemplateDetail {
                id: 1,
                title: "Agency".to_string(),
                content: Some(json!({"elements": []})),
                data: None,
                extra: Default::default(),
            }),
            _ => Err(FetchError::Payload("Template requires a license".to_string())),
        }
    }
}

fn app() -> Router {
    app_with(ServerConfig::default())
}

fn app_with(config: ServerConfig) -> Router {
    let store = Arc::new(MemoryStore::new());
    let kits = KitService::new(store.clone(), EventBus::default());
    let catalog = CatalogCache::new(
        store,
        Arc::new(StaticSource),
        Arc::new(SystemClock),
        CacheConfig::default(),
    );
    build_router(AppState::new(kits, catalog, config))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

async fn save_kit(app: &Router, title: &str, document_id: Option<&str>) -> String {
    let (status, body) = post(
        app,
        "/api/v1/tokens/save",
        json!({
            "id": document_id,
            "title": title,
            "tokens": "{\"ang_color_text\":\"#000\",\"post_title\":\"Home\"}"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(&app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_global_kit_propagation_and_resolution() {
    let app = app();
    let kit_id = save_kit(&app, "Brand", Some("D1")).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/kits/global",
        Some(json!({"kit_id": kit_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for document_id in ["D2", "D3"] {
        let (status, body) = post(
            &app,
            "/api/v1/tokens/apply",
            json!({"id": kit_id, "document_id": document_id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data: Value = serde_json::from_str(body["data"].as_str().unwrap()).unwrap();
        assert_eq!(data, json!({"ang_color_text": "#000"}));
    }

    let (status, body) = post(
        &app,
        "/api/v1/tokens/update",
        json!({"id": kit_id, "current_id": "D1", "tokens": {"ang_color_text": "#f00"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enqueued"], json!(["D2", "D3"]));

    let (_, body) = get(&app, "/api/v1/kit-queue/D1").await;
    assert_eq!(body["stale"], false);
    let (_, body) = get(&app, "/api/v1/kit-queue/D2").await;
    assert_eq!(body["stale"], true);

    let (_, heartbeat) = get(&app, "/api/v1/heartbeat/snapshot").await;
    assert_eq!(heartbeat["stylekit_queue"], json!(["D2", "D3"]));
    assert_eq!(heartbeat["global_kit_id"], json!(kit_id));

    // Discard twice: the second call is a no-op.
    let discard = json!({"id": "D2", "resolution": "discard"});
    let (_, body) = post(&app, "/api/v1/kit-queue/remove", discard.clone()).await;
    assert_eq!(body["removed"], true);
    let (status, body) = post(&app, "/api/v1/kit-queue/remove", discard).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);
    let (_, binding) = get(&app, "/api/v1/documents/D2/binding").await;
    assert!(binding["kit_id"].is_null());

    let (_, body) = post(
        &app,
        "/api/v1/kit-queue/remove",
        json!({"id": "D3", "resolution": "apply"}),
    )
    .await;
    assert_eq!(body["removed"], true);
    let data: Value = serde_json::from_str(body["data"].as_str().unwrap()).unwrap();
    assert_eq!(data, json!({"ang_color_text": "#f00"}));

    let (_, heartbeat) = get(&app, "/api/v1/heartbeat/snapshot").await;
    assert_eq!(heartbeat["stylekit_queue"], json!([]));
}

#[tokio::test]
async fn test_numeric_document_ids_are_accepted() {
    let app = app();
    let kit_id = save_kit(&app, "Brand", None).await;
    let (status, _) = post(
        &app,
        "/api/v1/tokens/apply",
        json!({"id": kit_id, "document_id": 42}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, binding) = get(&app, "/api/v1/documents/42/binding").await;
    assert_eq!(binding["kit_id"], json!(kit_id));
}

#[tokio::test]
async fn test_missing_kit_is_404_with_hint() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/v1/tokens/get",
        json!({"id": "01890a5d-ac96-774b-bcce-b302099a8057"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(body["hint"].as_str().is_some());
}

#[tokio::test]
async fn test_global_pointer_validation_and_conflict() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/kits/global",
        Some(json!({"kit_id": "01890a5d-ac96-774b-bcce-b302099a8057"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");

    let first = save_kit(&app, "First", None).await;
    let second = save_kit(&app, "Second", None).await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/kits/global",
        Some(json!({"kit_id": first, "expected": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Stale expectation loses.
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/kits/global",
        Some(json!({"kit_id": second, "expected": null})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (_, body) = get(&app, "/api/v1/kits/global").await;
    assert_eq!(body["kit_id"], json!(first));
}

#[tokio::test]
async fn test_delete_global_kit_unbinds_documents() {
    let app = app();
    let kit_id = save_kit(&app, "Brand", Some("D1")).await;
    send(
        &app,
        Method::PUT,
        "/api/v1/kits/global",
        Some(json!({"kit_id": kit_id})),
    )
    .await;

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/kits/{}", kit_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["was_global"], true);
    assert_eq!(body["unbound_documents"], json!(["D1"]));

    let (_, global) = get(&app, "/api/v1/kits/global").await;
    assert!(global["kit_id"].is_null());
    let (status, _) = get(&app, &format!("/api/v1/kits/{}", kit_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_and_import() {
    let app = app();
    let kit_id = save_kit(&app, "Brand", None).await;

    let request = Request::builder()
        .uri(format!("/api/v1/kits/{}/export", kit_id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with(&format!("attachment; filename=\"kit-{}-", kit_id)));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let file = String::from_utf8(bytes.to_vec()).unwrap();

    let (status, body) = post(
        &app,
        "/api/v1/kits/import",
        json!({"filename": "brand.json", "content": file}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ids"].as_array().unwrap().len(), 1);
    assert_ne!(body["id"], json!(kit_id));

    let (status, body) = post(
        &app,
        "/api/v1/kits/import",
        json!({"filename": "brand.json", "content": "{\"content\": {}}"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_format");
}

#[tokio::test]
async fn test_bulk_export_archive_imports_back() {
    let app = app();
    let first = save_kit(&app, "Brand", None).await;
    let second = save_kit(&app, "Dark", None).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/kits/export")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"ids": [first, second]}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"kits-"));
    assert!(disposition.ends_with(".zip\""));
    let archive = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let (status, body) = post(
        &app,
        "/api/v1/kits/import",
        json!({
            "filename": "kits.zip",
            "content": base64::engine::general_purpose::STANDARD.encode(&archive)
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ids"].as_array().unwrap().len(), 2);

    let (_, kits) = get(&app, "/api/v1/kits").await;
    assert_eq!(kits.as_array().unwrap().len(), 4);

    let (status, body) = post(&app, "/api/v1/kits/export", json!({"ids": []})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn test_import_limit_follows_configuration() {
    let file = json!({"title": "Brand", "content": {"ang_color_text": "#000"}}).to_string();

    let strict = app_with(ServerConfig {
        max_import_bytes: file.len() - 1,
        ..ServerConfig::default()
    });
    let (status, body) = post(
        &strict,
        "/api/v1/kits/import",
        json!({"filename": "brand.json", "content": file}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_format");

    let exact = app_with(ServerConfig {
        max_import_bytes: file.len(),
        ..ServerConfig::default()
    });
    let (status, body) = post(
        &exact,
        "/api/v1/kits/import",
        json!({"filename": "brand.json", "content": file}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_export_empty_kit_is_rejected() {
    let app = app();
    let (_, body) = post(
        &app,
        "/api/v1/tokens/save",
        json!({"title": "Nothing", "tokens": {"post_title": "Home"}}),
    )
    .await;
    let kit_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = get(&app, &format!("/api/v1/kits/{}/export", kit_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_kit");
}

#[tokio::test]
async fn test_reset_blanks_style_properties() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/v1/tokens/reset",
        json!({
            "id": "D1",
            "properties": {
                "ang_color_text": "#000",
                "hide_title": true,
                "ang_container_padding": {"unit": "px", "top": "10"},
                "post_title": "Home"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data: Value = serde_json::from_str(body["data"].as_str().unwrap()).unwrap();
    assert_eq!(
        data,
        json!({
            "ang_color_text": "",
            "ang_container_padding": {"top": "", "unit": "px"},
            "hide_title": false
        })
    );
}

#[tokio::test]
async fn test_migrate_document_properties() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/v1/documents/migrate",
        json!({"properties": {"ang_size_xxl": ["64px"], "ang_text_size_small": "16px"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema_version"], 2);
    assert_eq!(body["properties"]["ang_size_xxl_font_size"], json!(["64px"]));
    assert_eq!(body["properties"]["ang_size_xxl_typography"], "custom");
    assert_eq!(body["applied"], json!(["ang_size_xxl"]));
    assert_eq!(body["warnings"][0]["type"], "unexpected_shape");
}

#[tokio::test]
async fn test_template_listing_and_detail() {
    let app = app();
    let (status, body) = get(&app, "/api/v1/templates?sort=new").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["templates"][0]["id"], 1);

    let (_, body) = get(&app, "/api/v1/templates?show=packs&search=FOOD").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["templates"][0]["type"], "pack");

    let (status, body) = get(&app, "/api/v1/templates/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Agency");

    let (status, body) = get(&app, "/api/v1/templates/9").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "payload_error");
}

#[tokio::test]
async fn test_import_history() {
    let app = app();
    let (status, record) = post(
        &app,
        "/api/v1/imports",
        json!({"template_id": 1, "document_id": "D7", "method": "page"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["template_id"], 1);

    let (_, history) = get(&app, "/api/v1/imports?limit=10").await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, binding) = get(&app, "/api/v1/documents/D7/binding").await;
    assert_eq!(binding["recently_imported"], true);
}
