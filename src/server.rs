//! HTTP server and routes.

mod acquire;
mod handlers;
mod state;

pub use state::AppState;

use crate::auth;
use axum::{Router, middleware, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
///
/// Every route sits behind the Basic auth guard.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/opds", get(handlers::catalog_root))
        .route("/opds/library/{lib_id}", get(handlers::catalog_library))
        .route("/opds/search.xml", get(handlers::opensearch))
        .route("/opds/search", get(handlers::catalog_search))
        .route("/acquire/{item_id}", get(acquire::acquire))
        .route("/acquire/{item_id}/{slug}", get(acquire::acquire_named))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
