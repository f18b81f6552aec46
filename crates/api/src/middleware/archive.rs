//! Archive resolution extractor.

use std::sync::Arc;

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::request::Parts;
use muninn_core::error::CoreError;
use muninn_core::query::{validate_params, QueryParams};
use muninn_core::registry::Archive;

use crate::error::AppError;
use crate::state::AppState;

/// The archive named by the `{archive}` path segment, together with the
/// request's query parameters.
///
/// Resolution fails, in this order, with:
/// - 404 when no such archive is configured,
/// - 403 for a non-safe method on a read-only archive,
/// - 400 when the query string names a parameter the archive does not know.
///
/// Query validation runs for every method, before any database access.
#[derive(Debug, Clone)]
pub struct ResolvedArchive {
    pub archive: Arc<Archive>,
    pub params: QueryParams,
}

impl FromRequestParts<AppState> for ResolvedArchive {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = RawPathParams::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::InternalError(e.body_text()))?;
        let name = path
            .iter()
            .find_map(|(key, value)| (key == "archive").then_some(value))
            .ok_or_else(|| AppError::InternalError("route has no archive segment".into()))?;

        let archive = state.registry.get(name).ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Archive",
                id: name.to_string(),
            })
        })?;

        if archive.read_only() && !parts.method.is_safe() {
            tracing::debug!(archive = %archive.name(), method = %parts.method, "Write to read-only archive refused");
            return Err(AppError::Core(CoreError::Forbidden(
                "You do not have permission to perform this action.".into(),
            )));
        }

        let params = QueryParams::new(
            url::form_urlencoded::parse(parts.uri.query().unwrap_or("").as_bytes())
                .into_owned()
                .collect(),
        );
        validate_params(&params, archive.filters(), state.registry.pagination())?;

        Ok(Self { archive, params })
    }
}
