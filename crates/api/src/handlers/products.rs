//! Handlers for archive products.
//!
//! Every route is addressed through [`ResolvedArchive`], so by the time a
//! handler runs the archive exists, the method is permitted and the query
//! string has been validated. GET requests render with the shape of the
//! requested `mode`; every other method parses and renders with the
//! archive's write shape. Writes run inside one transaction each.

use std::collections::{BTreeMap, HashMap};

use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use muninn_core::config::DEFAULT_MODE;
use muninn_core::datetime::utc_now;
use muninn_core::error::CoreError;
use muninn_core::query::{ListQuery, QueryParams, MODE_PARAM};
use muninn_core::reconcile::{additions, reconcile, removals};
use muninn_core::registry::Archive;
use muninn_core::removal::remove_product_file;
use muninn_core::shape::{ProductShape, WriteMode};
use muninn_core::types::ProductId;
use muninn_db::models::product::Product;
use muninn_db::repositories::{LinkRepo, NamespaceRepo, ProductRepo, TagRepo};
use serde_json::{Map, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::archive::ResolvedArchive;
use crate::response::{PageResponse, RequestUrl};
use crate::state::AppState;

/// How a detail route addresses its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKey {
    /// `/{archive}/{id}`
    Id(String),
    /// `/{archive}/{product_type}/{product_name}`
    Name {
        product_type: String,
        product_name: String,
    },
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKey::Id(id) => f.write_str(id),
            ProductKey::Name {
                product_type,
                product_name,
            } => write!(f, "{product_type}/{product_name}"),
        }
    }
}

/// Detail actions reachable with POST on `/{archive}/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Tag,
    Untag,
    Link,
    Unlink,
}

impl Action {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "tag" => Some(Action::Tag),
            "untag" => Some(Action::Untag),
            "link" => Some(Action::Link),
            "unlink" => Some(Action::Unlink),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// GET /{archive}
///
/// List products matching the filter parameters. The response is a plain
/// array, or a page envelope when pagination is configured.
pub async fn list_products(
    State(state): State<AppState>,
    ResolvedArchive { archive, params }: ResolvedArchive,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let query = ListQuery::from_params(
        &params,
        archive.config(),
        archive.filters(),
        state.registry.pagination(),
    )?;
    let shape = archive.shape(&query.mode)?;

    let mut conn = state.pool.acquire().await?;

    let Some(request) = query.page else {
        let products =
            ProductRepo::list(&mut conn, &archive, &query.predicates, &query.ordering, None)
                .await?;
        let results = render_many(&mut conn, &archive, &shape, &products).await?;
        return Ok(Json(results).into_response());
    };

    let count = ProductRepo::count(&mut conn, &archive, &query.predicates).await?;
    let count = u64::try_from(count).unwrap_or(0);
    let page = request.locate(count)?;
    let products = ProductRepo::list(
        &mut conn,
        &archive,
        &query.predicates,
        &query.ordering,
        Some(&page),
    )
    .await?;
    let results = render_many(&mut conn, &archive, &shape, &products).await?;

    let url = RequestUrl::from_parts(&headers, &uri)
        .ok_or_else(|| AppError::InternalError(format!("cannot rebuild request URL {uri}")))?;
    Ok(Json(PageResponse::new(count, &page, &url, results)).into_response())
}

/// POST /{archive}
///
/// Create a product with its tags, source links and namespace rows.
pub async fn create_product(
    State(state): State<AppState>,
    ResolvedArchive { archive, .. }: ResolvedArchive,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let shape = archive.write_shape();
    let input = shape.parse_input(&payload, WriteMode::Create)?;

    let mut tx = state.pool.begin().await?;

    if let Some(sources) = &input.source_products {
        ensure_sources_exist(&mut tx, &archive, sources).await?;
    }

    let uuid = Uuid::new_v4();
    let product = ProductRepo::insert(&mut tx, &archive, uuid, utc_now(), &input.core).await?;

    if let Some(tags) = &input.tags {
        TagRepo::insert(&mut tx, &archive, uuid, &additions(&[], tags)).await?;
    }
    if let Some(sources) = &input.source_products {
        LinkRepo::insert(&mut tx, &archive, uuid, &additions(&[], sources)).await?;
    }
    for (namespace, values) in &input.namespaces {
        NamespaceRepo::insert(&mut tx, &archive, namespace, uuid, values).await?;
    }

    let body = render_one(&mut tx, &archive, &shape, &product).await?;
    tx.commit().await?;

    tracing::info!(
        archive = %archive.name(),
        uuid = %uuid,
        product_type = %product.product_type,
        product_name = %product.product_name,
        "Product created",
    );

    Ok((StatusCode::CREATED, Json(body)))
}

// ---------------------------------------------------------------------------
// Detail by id
// ---------------------------------------------------------------------------

/// GET /{archive}/{id}
pub async fn get_product(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    retrieve(&state, resolved, ProductKey::Id(id)).await
}

/// PUT /{archive}/{id}
pub async fn replace_product(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(payload) = payload?;
    update(&state, resolved, ProductKey::Id(id), payload, WriteMode::Replace).await
}

/// PATCH /{archive}/{id}
pub async fn patch_product(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(payload) = payload?;
    update(&state, resolved, ProductKey::Id(id), payload, WriteMode::Partial).await
}

/// DELETE /{archive}/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    destroy(&state, resolved, ProductKey::Id(id)).await
}

// ---------------------------------------------------------------------------
// Detail by (product_type, product_name), and id actions
// ---------------------------------------------------------------------------

fn name_key(product_type: String, product_name: String) -> ProductKey {
    ProductKey::Name {
        product_type,
        product_name,
    }
}

/// GET /{archive}/{product_type}/{product_name}
pub async fn get_product_by_name(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, product_type, product_name)): Path<(String, String, String)>,
) -> AppResult<Json<Value>> {
    retrieve(&state, resolved, name_key(product_type, product_name)).await
}

/// PUT /{archive}/{product_type}/{product_name}
pub async fn replace_product_by_name(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, product_type, product_name)): Path<(String, String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(payload) = payload?;
    let key = name_key(product_type, product_name);
    update(&state, resolved, key, payload, WriteMode::Replace).await
}

/// PATCH /{archive}/{product_type}/{product_name}
pub async fn patch_product_by_name(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, product_type, product_name)): Path<(String, String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(payload) = payload?;
    let key = name_key(product_type, product_name);
    update(&state, resolved, key, payload, WriteMode::Partial).await
}

/// DELETE /{archive}/{product_type}/{product_name}
pub async fn delete_product_by_name(
    State(state): State<AppState>,
    resolved: ResolvedArchive,
    Path((_, product_type, product_name)): Path<(String, String, String)>,
) -> AppResult<StatusCode> {
    destroy(&state, resolved, name_key(product_type, product_name)).await
}

/// POST /{archive}/{id}/{tag|untag|link|unlink}
///
/// `tag` and `link` add the listed entries that are missing; `untag` and
/// `unlink` remove the listed entries that exist. The body is a JSON list
/// of tags or of source product ids. Responds with the updated product.
pub async fn product_action(
    State(state): State<AppState>,
    ResolvedArchive { archive, .. }: ResolvedArchive,
    Path((_, id, segment)): Path<(String, String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let action = Action::from_segment(&segment)
        .ok_or_else(|| AppError::MethodNotAllowed("POST".into()))?;
    let Json(body) = payload?;
    let shape = archive.write_shape();

    let mut tx = state.pool.begin().await?;
    let product = find_product(&mut tx, &archive, &ProductKey::Id(id)).await?;
    let uuid = product.uuid;

    match action {
        Action::Tag | Action::Untag => {
            let tags = shape.parse_tags_body(&body)?;
            let existing = TagRepo::tags_for(&mut tx, &archive, uuid).await?;
            if action == Action::Tag {
                TagRepo::insert(&mut tx, &archive, uuid, &additions(&existing, &tags)).await?;
            } else {
                TagRepo::delete(&mut tx, &archive, uuid, &removals(&existing, &tags)).await?;
            }
        }
        Action::Link | Action::Unlink => {
            let sources = shape.parse_source_products_body(&body)?;
            let existing = LinkRepo::sources_for(&mut tx, &archive, uuid).await?;
            if action == Action::Link {
                ensure_sources_exist(&mut tx, &archive, &sources).await?;
                LinkRepo::insert(&mut tx, &archive, uuid, &additions(&existing, &sources))
                    .await?;
            } else {
                LinkRepo::delete(&mut tx, &archive, uuid, &removals(&existing, &sources))
                    .await?;
            }
        }
    }

    let body = render_one(&mut tx, &archive, &shape, &product).await?;
    tx.commit().await?;

    tracing::info!(archive = %archive.name(), uuid = %uuid, action = %segment, "Product relations updated");

    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Shared operations
// ---------------------------------------------------------------------------

async fn retrieve(
    state: &AppState,
    ResolvedArchive { archive, params }: ResolvedArchive,
    key: ProductKey,
) -> AppResult<Json<Value>> {
    let shape = archive.shape(requested_mode(&params))?;
    let mut conn = state.pool.acquire().await?;
    let product = find_product(&mut conn, &archive, &key).await?;
    Ok(Json(render_one(&mut conn, &archive, &shape, &product).await?))
}

async fn update(
    state: &AppState,
    ResolvedArchive { archive, .. }: ResolvedArchive,
    key: ProductKey,
    payload: Value,
    mode: WriteMode,
) -> AppResult<Json<Value>> {
    let shape = archive.write_shape();
    let input = shape.parse_input(&payload, mode)?;

    let mut tx = state.pool.begin().await?;
    let existing = find_product(&mut tx, &archive, &key).await?;
    let uuid = existing.uuid;

    if let Some(sources) = &input.source_products {
        ensure_sources_exist(&mut tx, &archive, sources).await?;
    }

    let product = ProductRepo::update(&mut tx, &archive, uuid, utc_now(), &input.core)
        .await?
        .ok_or_else(|| not_found(&key))?;

    if let Some(tags) = &input.tags {
        let current = TagRepo::tags_for(&mut tx, &archive, uuid).await?;
        let delta = reconcile(&current, tags);
        TagRepo::delete(&mut tx, &archive, uuid, &delta.delete).await?;
        TagRepo::insert(&mut tx, &archive, uuid, &delta.create).await?;
    }
    if let Some(sources) = &input.source_products {
        let current = LinkRepo::sources_for(&mut tx, &archive, uuid).await?;
        let delta = reconcile(&current, sources);
        LinkRepo::delete(&mut tx, &archive, uuid, &delta.delete).await?;
        LinkRepo::insert(&mut tx, &archive, uuid, &delta.create).await?;
    }

    for (namespace, values) in &input.namespaces {
        if NamespaceRepo::update(&mut tx, &archive, namespace, uuid, values).await? {
            continue;
        }
        // no row yet, so the values must be complete enough to create one
        let missing = shape
            .namespace(namespace)
            .map(|ns| ns.missing_required(values))
            .unwrap_or_default();
        if !missing.is_empty() {
            return Err(AppError::Core(CoreError::Validation(
                missing
                    .iter()
                    .map(|field| format!("{namespace}.{field}: This field is required."))
                    .collect::<Vec<_>>()
                    .join("; "),
            )));
        }
        NamespaceRepo::insert(&mut tx, &archive, namespace, uuid, values).await?;
    }

    let body = render_one(&mut tx, &archive, &shape, &product).await?;
    tx.commit().await?;

    tracing::info!(archive = %archive.name(), uuid = %uuid, partial = (mode == WriteMode::Partial), "Product updated");

    Ok(Json(body))
}

/// Delete the row, then the product file. The file is only touched once
/// the row is gone, and a failure to remove it rolls the deletion back.
async fn destroy(
    state: &AppState,
    ResolvedArchive { archive, .. }: ResolvedArchive,
    key: ProductKey,
) -> AppResult<StatusCode> {
    let mut tx = state.pool.begin().await?;
    let product = find_product(&mut tx, &archive, &key).await?;

    if !ProductRepo::delete(&mut tx, &archive, product.uuid).await? {
        return Err(not_found(&key));
    }

    let root = archive.root().map(|p| p.to_path_buf());
    let file = product.file();
    let removed = tokio::task::spawn_blocking(move || remove_product_file(root.as_deref(), &file))
        .await
        .map_err(|e| AppError::InternalError(format!("file removal task failed: {e}")))?;

    match removed {
        Ok(file_removed) => {
            tx.commit().await?;
            tracing::info!(
                archive = %archive.name(),
                uuid = %product.uuid,
                file_removed,
                "Product deleted",
            );
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err.into())
        }
    }
}

fn requested_mode(params: &QueryParams) -> &str {
    params.get(MODE_PARAM).unwrap_or(DEFAULT_MODE)
}

fn not_found(key: &ProductKey) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Product",
        id: key.to_string(),
    })
}

/// Look up the addressed product. A malformed id is simply not found.
async fn find_product(
    conn: &mut PgConnection,
    archive: &Archive,
    key: &ProductKey,
) -> AppResult<Product> {
    let found = match key {
        ProductKey::Id(id) => match Uuid::parse_str(id) {
            Ok(uuid) => ProductRepo::find_by_id(conn, archive, uuid).await?,
            Err(_) => None,
        },
        ProductKey::Name {
            product_type,
            product_name,
        } => ProductRepo::find_by_type_and_name(conn, archive, product_type, product_name).await?,
    };
    found.ok_or_else(|| not_found(key))
}

/// Every id in `sources` must name a product of the same archive.
async fn ensure_sources_exist(
    conn: &mut PgConnection,
    archive: &Archive,
    sources: &[ProductId],
) -> AppResult<()> {
    let existing = ProductRepo::existing_ids(conn, archive, sources).await?;
    let missing: Vec<String> = sources
        .iter()
        .filter(|id| !existing.contains(id))
        .map(|id| format!("source_products: Invalid pk \"{id}\" - object does not exist."))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Core(CoreError::Validation(missing.join("; "))))
    }
}

async fn render_one(
    conn: &mut PgConnection,
    archive: &Archive,
    shape: &ProductShape,
    product: &Product,
) -> Result<Value, sqlx::Error> {
    let mut rendered = render_many(conn, archive, shape, std::slice::from_ref(product)).await?;
    Ok(rendered.pop().unwrap_or(Value::Null))
}

/// Render products with the relations their shape includes, fetching each
/// relation once for the whole batch.
async fn render_many(
    conn: &mut PgConnection,
    archive: &Archive,
    shape: &ProductShape,
    products: &[Product],
) -> Result<Vec<Value>, sqlx::Error> {
    let ids: Vec<ProductId> = products.iter().map(|p| p.uuid).collect();

    let tags = if shape.tags {
        TagRepo::tags_for_many(conn, archive, &ids).await?
    } else {
        HashMap::new()
    };
    let sources = if shape.source_products {
        LinkRepo::sources_for_many(conn, archive, &ids).await?
    } else {
        HashMap::new()
    };

    let mut namespace_rows: Vec<(&str, HashMap<ProductId, Map<String, Value>>)> = Vec::new();
    for ns in &shape.namespaces {
        let Some(schema) = archive.config().namespace(&ns.name) else {
            continue;
        };
        let rows = NamespaceRepo::fetch_many(conn, archive, schema, &ids).await?;
        namespace_rows.push((ns.name.as_str(), rows));
    }

    Ok(products
        .iter()
        .map(|product| {
            let namespaces: BTreeMap<String, Map<String, Value>> = namespace_rows
                .iter()
                .filter_map(|(name, rows)| {
                    rows.get(&product.uuid)
                        .map(|row| (name.to_string(), row.clone()))
                })
                .collect();
            shape.render(
                &product.to_json_map(),
                tags.get(&product.uuid).map(Vec::as_slice).unwrap_or(&[]),
                sources.get(&product.uuid).map(Vec::as_slice).unwrap_or(&[]),
                &namespaces,
            )
        })
        .collect())
}
