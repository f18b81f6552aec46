#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use muninn_core::config::MuninnConfig;
use muninn_core::registry::ArchiveRegistry;
use sqlx::PgPool;
use tower::ServiceExt;

use muninn_api::config::ServerConfig;
use muninn_api::router::build_app_router;
use muninn_api::state::AppState;

/// Archive configuration used by most tests: a writable non-spatial
/// archive with one namespace, and a read-only archive sharing nothing.
pub const TEST_ARCHIVES: &str = r#"
    [archives.demo]
    table_prefix = "demo_"
    spatial = false

    [[archives.demo.namespaces]]
    name = "mynamespace"
    fields = [
        { name = "counter", type = "long" },
        { name = "note", type = "text", optional = true },
    ]

    [archives.demo.serializers.default]
    base = "core"

    [archives.demo.serializers.extended]
    base = "complete"

    [archives.demo.serializers.light]
    base = "complete"
    namespaces = []
    exclude = ["source_products", "remote_url"]

    [archives.frozen]
    table_prefix = "frozen_"
    spatial = false
    read_only = true
"#;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        muninn_config: PathBuf::from("muninn.toml"),
    }
}

/// Build the full application router for `archives` and create the tables
/// of every archive.
pub async fn build_app_with(pool: PgPool, archives: &str) -> Router {
    let registry = Arc::new(ArchiveRegistry::from_config(
        MuninnConfig::from_toml_str(archives).unwrap(),
    ));
    for archive in registry.archives() {
        muninn_db::ensure_archive_schema(&pool, archive).await.unwrap();
    }

    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry,
    };
    build_app_router(state, &config).unwrap()
}

/// Build the application router with [`TEST_ARCHIVES`].
pub async fn build_test_app(pool: PgPool) -> Router {
    build_app_with(pool, TEST_ARCHIVES).await
}

/// A minimal valid product payload.
pub fn product(product_type: &str, product_name: &str) -> serde_json::Value {
    serde_json::json!({
        "product_type": product_type,
        "product_name": product_name,
        "physical_name": format!("{product_name}.dat"),
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "testserver");
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a product and return its rendered body.
pub async fn create(app: Router, archive: &str, body: serde_json::Value) -> serde_json::Value {
    let response = post_json(app, &format!("/{archive}"), body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await
}
