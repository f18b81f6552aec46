//! API root and schema description.

use std::collections::BTreeMap;

use axum::extract::{OriginalUri, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::response::RequestUrl;
use crate::state::AppState;

/// GET /
///
/// Map every archive name to the absolute URL of its listing.
pub async fn api_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Json<Map<String, Value>>> {
    let base = RequestUrl::from_parts(&headers, &uri)
        .ok_or_else(|| AppError::InternalError(format!("cannot rebuild request URL {uri}")))?;

    let root = state
        .registry
        .names()
        .map(|name| (name.to_string(), Value::String(base.join(&format!("/{name}/")))))
        .collect();
    Ok(Json(root))
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub archives: BTreeMap<String, ArchiveDescription>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveDescription {
    pub read_only: bool,
    pub spatial: bool,
    pub modes: Vec<String>,
    pub namespaces: Vec<String>,
    pub filters: Vec<String>,
}

/// GET /schema
///
/// Describe what each archive accepts: serializer modes, namespaces and
/// filter parameter names.
pub async fn api_schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    let archives = state
        .registry
        .archives()
        .map(|archive| {
            let config = archive.config();
            let description = ArchiveDescription {
                read_only: archive.read_only(),
                spatial: config.spatial,
                modes: archive.modes().map(str::to_string).collect(),
                namespaces: config.namespace_names().map(str::to_string).collect(),
                filters: archive.filters().names().map(str::to_string).collect(),
            };
            (archive.name().to_string(), description)
        })
        .collect();

    Json(SchemaResponse { archives })
}
