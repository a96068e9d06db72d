use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Every handler here receives a resolved `AuthUser`. Its id is the asserted owner for the
/// ownership-guarded poem and gallery mutations and the acting user for interactions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Poems ---
        // POST /poems
        // Poets only. An optional galleryId must name one of the caller's galleries.
        .route("/poems", post(handlers::create_poem))
        // PUT/DELETE /poems/{id}
        // Owner only; a poem that is absent or not yours is a 404 either way.
        .route(
            "/poems/{id}",
            put(handlers::update_poem).delete(handlers::delete_poem),
        )
        // --- Galleries ---
        .route("/galleries", post(handlers::create_gallery))
        // Deleting a gallery keeps its poems, ungalleried.
        .route(
            "/galleries/{id}",
            put(handlers::rename_gallery).delete(handlers::delete_gallery),
        )
        // --- Interactions ---
        // Idempotent; acting on one's own poem answers `ignored: true`.
        .route(
            "/poems/{id}/like",
            post(handlers::like_poem).delete(handlers::unlike_poem),
        )
        .route(
            "/poems/{id}/save",
            post(handlers::save_poem).delete(handlers::unsave_poem),
        )
        .route("/poems/{id}/read", post(handlers::mark_poem_read))
}
