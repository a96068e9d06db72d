use crate::{AppState, handlers};
use axum::{Router, routing::delete};

/// Admin Router Module
///
/// Mounted at `/api/admin`. Handlers take the `AdminKey` extractor, so a request without
/// the configured `x-admin-key` is refused with 403 before any storage access.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // DELETE /admin/poems/{id}
        // Removes any poem regardless of author, cascading its interactions.
        .route("/poems/{id}", delete(handlers::admin_delete_poem))
}
