//! Route definitions for archive products.

use axum::routing::{get, MethodRouter};
use axum::Router;

use crate::handlers::products;
use crate::state::AppState;

/// Product routes, one set per archive through the `{archive}` segment.
///
/// ```text
/// GET    /{archive}                               -> list_products
/// POST   /{archive}                               -> create_product
/// GET    /{archive}/{id}                          -> get_product
/// PUT    /{archive}/{id}                          -> replace_product
/// PATCH  /{archive}/{id}                          -> patch_product
/// DELETE /{archive}/{id}                          -> delete_product
/// GET    /{archive}/{product_type}/{product_name} -> get_product_by_name
/// PUT    /{archive}/{product_type}/{product_name} -> replace_product_by_name
/// PATCH  /{archive}/{product_type}/{product_name} -> patch_product_by_name
/// DELETE /{archive}/{product_type}/{product_name} -> delete_product_by_name
/// POST   /{archive}/{id}/{action}                 -> product_action
/// ```
///
/// The three-segment path is shared: POST dispatches to the `tag`,
/// `untag`, `link` and `unlink` actions, every other method addresses a
/// product by type and name. Each path is also served with a trailing slash.
pub fn router() -> Router<AppState> {
    let collection = get(products::list_products).post(products::create_product);

    let by_id = get(products::get_product)
        .put(products::replace_product)
        .patch(products::patch_product)
        .delete(products::delete_product);

    let by_name = get(products::get_product_by_name)
        .put(products::replace_product_by_name)
        .patch(products::patch_product_by_name)
        .delete(products::delete_product_by_name)
        .post(products::product_action);

    Router::new()
        .merge(with_trailing_slash("/{archive}", collection))
        .merge(with_trailing_slash("/{archive}/{key}", by_id))
        .merge(with_trailing_slash("/{archive}/{key}/{name}", by_name))
}

fn with_trailing_slash(path: &str, route: MethodRouter<AppState>) -> Router<AppState> {
    Router::new()
        .route(path, route.clone())
        .route(&format!("{path}/"), route)
}
