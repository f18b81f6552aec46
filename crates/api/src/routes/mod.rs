pub mod health;
pub mod products;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the route tree.
///
/// Route hierarchy:
///
/// ```text
/// /                                              archive name -> URL (GET)
/// /schema                                        archives, modes, filters (GET)
///
/// /{archive}                                     list, create
/// /{archive}/{id}                                get, update, patch, delete
/// /{archive}/{product_type}/{product_name}       get, update, patch, delete
/// /{archive}/{id}/tag                            add tags (POST)
/// /{archive}/{id}/untag                          remove tags (POST)
/// /{archive}/{id}/link                           add source products (POST)
/// /{archive}/{id}/unlink                         remove source products (POST)
/// ```
///
/// Static paths take precedence over `{archive}`; the configuration
/// rejects archives named after them.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root::api_root))
        .route("/schema", get(handlers::root::api_schema))
        .route("/schema/", get(handlers::root::api_schema))
        .merge(products::router())
}
