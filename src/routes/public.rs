use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only browsing plus the account gateway. Reserved galleries are filtered out of
/// listings in the handlers, never here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Answers `{ok:true}` only after a storage round trip succeeds.
        .route("/health", get(handlers::health))
        // --- Accounts ---
        .route("/register", post(handlers::register_user))
        .route("/login", post(handlers::login_user))
        .route("/logout", post(handlers::logout_user))
        // --- Poems ---
        // GET /poems?authorId=...&gallery=none|<id>
        .route("/poems", get(handlers::list_poems))
        .route("/poems/{id}", get(handlers::get_poem))
        // --- Galleries ---
        // GET /galleries?authorId=...
        .route("/galleries", get(handlers::list_galleries))
        // Reserved galleries stay reachable by id.
        .route("/galleries/{id}", get(handlers::get_gallery))
        // --- Profiles ---
        .route("/users/{id}/liked-poems", get(handlers::liked_poems))
        .route("/users/{id}/saved-poems", get(handlers::saved_poems))
        // GET /users/{id}/poem-interactions?poemIds=a,b,c
        .route(
            "/users/{id}/poem-interactions",
            get(handlers::get_poem_interactions),
        )
        .route("/poets/{id}/stats", get(handlers::get_poet_stats))
}
