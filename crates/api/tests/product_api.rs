//! HTTP-level integration tests for the archive product endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use axum::http::StatusCode;
use common::{body_json, create, delete, get, patch_json, post_json, product, put_json};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Create / retrieve
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_create_product_returns_201(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let mut body = product("TYPE", "one");
    body["tags"] = json!(["a", "b", "a"]);
    body["mynamespace"] = json!({"counter": 3});
    body["uuid"] = json!("00000000-0000-0000-0000-000000000000");

    let response = post_json(app, "/demo", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_ne!(json["uuid"], "00000000-0000-0000-0000-000000000000");
    assert_eq!(json["active"], true);
    assert!(json["metadata_date"].is_string());
    assert_eq!(json["tags"], json!(["a", "b"]));
    assert_eq!(json["source_products"], json!([]));
    assert_eq!(json["mynamespace"], json!({"counter": 3, "note": null}));
}

#[sqlx::test]
async fn test_create_requires_core_fields(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(app, "/demo", json!({"product_type": "T"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("product_name"));
}

#[sqlx::test]
async fn test_duplicate_type_and_name_returns_400(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    create(app, "demo", product("T", "dup")).await;

    let app = common::build_test_app(pool).await;
    let response = post_json(app, "/demo/", product("T", "dup")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_get_by_id_and_by_name_agree(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created = create(app, "demo", product("TYPE", "named")).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let by_id = body_json(get(app, &format!("/demo/{id}/")).await).await;
    let app = common::build_test_app(pool).await;
    let by_name = body_json(get(app, "/demo/TYPE/named").await).await;

    assert_eq!(by_id, by_name);
    assert_eq!(by_id["product_name"], "named");
    // default mode renders core fields only
    assert!(by_id.get("tags").is_none());
    assert!(by_id.get("mynamespace").is_none());
}

#[sqlx::test]
async fn test_get_with_mode(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created = create(app, "demo", product("T", "m")).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let extended = body_json(get(app, &format!("/demo/{id}?mode=extended")).await).await;
    assert_eq!(extended["tags"], json!([]));
    assert_eq!(extended["source_products"], json!([]));
    assert!(extended["mynamespace"].is_null());

    let app = common::build_test_app(pool.clone()).await;
    let light = body_json(get(app, &format!("/demo/{id}?mode=light")).await).await;
    assert!(light.get("tags").is_some());
    assert!(light.get("source_products").is_none());
    assert!(light.get("remote_url").is_none());
    assert!(light.get("mynamespace").is_none());

    let app = common::build_test_app(pool).await;
    let response = get(app, &format!("/demo/{id}?mode=bogus")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid value for query param \"mode\": \"bogus\"");
}

#[sqlx::test]
async fn test_get_unknown_product_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let response = get(app, "/demo/7d5a3a3c-9b6e-4f0e-8d52-1b1c6d8a0f11").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = common::build_test_app(pool.clone()).await;
    let response = get(app, "/demo/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = common::build_test_app(pool).await;
    let response = get(app, "/demo/T/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_patch_reconciles_tags_and_namespaces(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let mut body = product("T", "patched");
    body["tags"] = json!(["keep", "drop"]);
    let created = create(app, "demo", body).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let response = patch_json(
        app,
        &format!("/demo/{id}"),
        json!({"size": 10, "tags": ["keep", "new"], "mynamespace": {"counter": 1}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["size"], 10);
    assert_eq!(json["product_name"], "patched");
    assert_eq!(json["tags"], json!(["keep", "new"]));
    assert_eq!(json["mynamespace"]["counter"], 1);
    assert!(json["metadata_date"].as_str().unwrap() >= created["metadata_date"].as_str().unwrap());

    // a second patch updates the existing namespace row
    let app = common::build_test_app(pool).await;
    let json = body_json(
        patch_json(
            app,
            &format!("/demo/{id}"),
            json!({"mynamespace": {"note": "hello"}}),
        )
        .await,
    )
    .await;
    assert_eq!(json["mynamespace"], json!({"counter": 1, "note": "hello"}));
}

#[sqlx::test]
async fn test_patch_new_namespace_row_needs_required_fields(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created = create(app, "demo", product("T", "ns")).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool).await;
    let response = patch_json(
        app,
        &format!("/demo/{id}"),
        json!({"mynamespace": {"note": "no counter"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "mynamespace.counter: This field is required.");
}

#[sqlx::test]
async fn test_put_by_name_requires_full_payload(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    create(app, "demo", product("T", "put")).await;

    let app = common::build_test_app(pool.clone()).await;
    let response = put_json(app, "/demo/T/put", json!({"size": 1})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = product("T", "put");
    body["remote_url"] = json!("http://example.org/put.dat");
    let app = common::build_test_app(pool).await;
    let response = put_json(app, "/demo/T/put/", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["remote_url"], "http://example.org/put.dat");
}

#[sqlx::test]
async fn test_namespace_refused_by_write_profile(pool: PgPool) {
    let archives = r#"
        [archives.demo]
        table_prefix = "demo_"
        spatial = false

        [[archives.demo.namespaces]]
        name = "mynamespace"
        fields = [{ name = "counter", type = "long" }]

        [archives.demo.serializers.default]
        base = "core"

        [archives.demo.serializers.write]
        base = "complete"
        namespaces = []
    "#;
    let app = common::build_app_with(pool, archives).await;
    let mut body = product("T", "refused");
    body["mynamespace"] = json!({"counter": 1});

    let response = post_json(app, "/demo", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "namespace 'mynamespace' provided to an endpoint that does not accept it"
    );
}

// ---------------------------------------------------------------------------
// Tag / link actions
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_tag_and_untag(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let mut body = product("T", "tagged");
    body["tags"] = json!(["a"]);
    let created = create(app, "demo", body).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let response = post_json(app, &format!("/demo/{id}/tag"), json!(["a", "b", "c"])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["tags"], json!(["a", "b", "c"]));

    let app = common::build_test_app(pool.clone()).await;
    let response = post_json(app, &format!("/demo/{id}/untag/"), json!(["b", "zzz"])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["tags"], json!(["a", "c"]));

    let app = common::build_test_app(pool).await;
    let response = post_json(app, &format!("/demo/{id}/tag"), json!("not-a-list")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_link_unlink_and_relation_filters(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let source = create(app, "demo", product("T", "source")).await;
    let source_id = source["uuid"].as_str().unwrap().to_string();
    let app = common::build_test_app(pool.clone()).await;
    let derived = create(app, "demo", product("T", "derived")).await;
    let derived_id = derived["uuid"].as_str().unwrap().to_string();

    let app = common::build_test_app(pool.clone()).await;
    let response = post_json(app, &format!("/demo/{derived_id}/link"), json!([source_id])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["source_products"], json!([source_id]));

    // products derived from `source`
    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, &format!("/demo?source_product={source_id}")).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["uuid"], derived_id.as_str());

    // products `derived` was made from
    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, &format!("/demo?derived_product={derived_id}")).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["uuid"], source_id.as_str());

    let app = common::build_test_app(pool.clone()).await;
    let response = post_json(app, &format!("/demo/{derived_id}/unlink"), json!([source_id])).await;
    assert_eq!(body_json(response).await["source_products"], json!([]));

    let app = common::build_test_app(pool).await;
    let response = post_json(
        app,
        &format!("/demo/{derived_id}/link"),
        json!(["7d5a3a3c-9b6e-4f0e-8d52-1b1c6d8a0f11"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test]
async fn test_unknown_action_not_allowed(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created = create(app, "demo", product("T", "act")).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool).await;
    let response = post_json(app, &format!("/demo/{id}/retag"), json!([])).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_list_filters_and_ordering(pool: PgPool) {
    for (name, start, tags, counter) in [
        ("a", "2020-01-03", vec!["x"], 1),
        ("b", "2020-01-01", vec!["y"], 2),
        ("c", "2020-01-02", vec![], 3),
    ] {
        let app = common::build_test_app(pool.clone()).await;
        let mut body = product("T", name);
        body["validity_start"] = json!(start);
        body["tags"] = json!(tags);
        body["mynamespace"] = json!({"counter": counter});
        create(app, "demo", body).await;
    }

    let names = |list: &serde_json::Value| -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|p| p["product_name"].as_str().unwrap().to_string())
            .collect()
    };

    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, "/demo").await).await;
    assert_eq!(names(&list), ["b", "c", "a"]);

    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, "/demo?ordering=-mynamespace__counter").await).await;
    assert_eq!(names(&list), ["c", "b", "a"]);

    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, "/demo?tag=x,y").await).await;
    assert_eq!(names(&list), ["b", "a"]);

    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, "/demo?mynamespace__counter__gte=2").await).await;
    assert_eq!(names(&list), ["b", "c"]);

    let app = common::build_test_app(pool.clone()).await;
    let list = body_json(get(app, "/demo?product_name__in=a,c&validity_start__year=2020").await).await;
    assert_eq!(names(&list), ["c", "a"]);

    // invalid ordering terms are ignored
    let app = common::build_test_app(pool).await;
    let list = body_json(get(app, "/demo?ordering=nonsense").await).await;
    assert_eq!(names(&list), ["b", "c", "a"]);
}

#[sqlx::test]
async fn test_regex_filters_use_database_syntax(pool: PgPool) {
    for name in ["aa", "ab"] {
        let app = common::build_test_app(pool.clone()).await;
        create(app, "demo", product("T", name)).await;
    }

    // backreference: `^(a)\1$`
    let app = common::build_test_app(pool.clone()).await;
    let response = get(app, "/demo?product_name__regex=%5E%28a%29%5C1%24").await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["product_name"], "aa");

    // named group: `(?P<x>a)`, which PostgreSQL does not accept
    let app = common::build_test_app(pool).await;
    let response = get(app, "/demo?product_name__regex=%28%3FP%3Cx%3Ea%29").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Enter a valid regular expression"));
}

#[sqlx::test]
async fn test_paginated_listing(pool: PgPool) {
    let archives = format!(
        "[pagination]\npage_size = 2\nmax_page_size = 10\n{}",
        common::TEST_ARCHIVES
    );
    for name in ["p1", "p2", "p3"] {
        let app = common::build_app_with(pool.clone(), &archives).await;
        create(app, "demo", product("T", name)).await;
    }

    let app = common::build_app_with(pool.clone(), &archives).await;
    let page = body_json(get(app, "/demo?page=2").await).await;
    assert_eq!(page["count"], 3);
    assert!(page["next"].is_null());
    assert_eq!(page["previous"], "http://testserver/demo");
    assert_eq!(page["results"].as_array().unwrap().len(), 1);

    let app = common::build_app_with(pool.clone(), &archives).await;
    let page = body_json(get(app, "/demo?page_size=3").await).await;
    assert_eq!(page["results"].as_array().unwrap().len(), 3);

    let app = common::build_app_with(pool, &archives).await;
    let response = get(app, "/demo?page=9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Invalid page.");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_delete_returns_204(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created = create(app, "demo", product("T", "gone")).await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let response = delete(app, &format!("/demo/{id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool.clone()).await;
    let response = get(app, &format!("/demo/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = common::build_test_app(pool).await;
    let response = delete(app, "/demo/T/gone").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test]
async fn test_delete_removes_product_file(pool: PgPool) {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();
    std::fs::write(root.path().join("sub/file.dat"), b"payload").unwrap();

    let archives = format!(
        r#"
        [archives.files]
        table_prefix = "files_"
        spatial = false
        root = "{}"
        "#,
        root.path().display()
    );

    let app = common::build_app_with(pool.clone(), &archives).await;
    let created = create(
        app,
        "files",
        json!({
            "product_type": "T",
            "product_name": "file",
            "physical_name": "file.dat",
            "archive_path": "sub",
        }),
    )
    .await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_app_with(pool, &archives).await;
    let response = delete(app, &format!("/files/{id}/")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!root.path().join("sub/file.dat").exists());
    assert!(root.path().join("sub").exists());
}

#[sqlx::test]
async fn test_failed_file_removal_keeps_product(pool: PgPool) {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();

    let archives = format!(
        r#"
        [archives.files]
        table_prefix = "files_"
        spatial = false
        root = "{}"
        "#,
        root.path().display()
    );

    // `sub/..` exists but has no file name to move aside
    let app = common::build_app_with(pool.clone(), &archives).await;
    let created = create(
        app,
        "files",
        json!({
            "product_type": "T",
            "product_name": "weird",
            "physical_name": "..",
            "archive_path": "sub",
        }),
    )
    .await;
    let id = created["uuid"].as_str().unwrap();

    let app = common::build_app_with(pool.clone(), &archives).await;
    let response = delete(app, &format!("/files/{id}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("unable to remove product 'weird'"));

    // the deletion was rolled back
    let app = common::build_app_with(pool, &archives).await;
    let response = get(app, &format!("/files/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(root.path().join("sub").exists());
}
