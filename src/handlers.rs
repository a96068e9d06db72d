use crate::{
    AppState,
    auth::{AdminKey, AuthUser, issue_token},
    error::{AppError, ErrorBody},
    interactions::{self, POEM_NOT_FOUND},
    models::{
        AuthResponse, GalleryEnvelope, GalleryList, GalleryRequest, InteractionKind,
        InteractionResponse, LoginRequest, NewPoem, OkResponse, PoemChanges, PoemEnvelope,
        PoemInteractions, PoemList, PoemRequest, PoetStatsEnvelope, RegisterRequest,
    },
    policy,
    repository::Repository,
    visibility::{self, GalleryFilter},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

pub const GALLERY_NOT_FOUND: &str = "Gallery not found.";

// --- Filter Structs ---

/// PoemFilter
///
/// Query parameters of GET /api/poems.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PoemFilter {
    /// Only poems by this author.
    pub author_id: Option<String>,
    /// `none` for the "no gallery" view, or a gallery id.
    pub gallery: Option<String>,
}

/// GalleryFilterParams
///
/// Query parameters of GET /api/galleries.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GalleryFilterParams {
    /// Only galleries owned by this author.
    pub author_id: Option<String>,
}

/// PoemIdsParams
///
/// Query parameters of GET /api/users/{id}/poem-interactions.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PoemIdsParams {
    /// Comma-separated poem ids. Entries that are not ids are skipped.
    pub poem_ids: Option<String>,
}

// --- Input Parsing ---

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation("Invalid id.".to_string()))
}

fn parse_optional_id(raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_id(value).map(Some),
    }
}

/// Trimmed and non-empty, otherwise "Incomplete data.".
fn required_text(value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(AppError::incomplete)
}

/// A poem may only be filed into a gallery its author owns.
async fn ensure_owned_gallery(
    repo: &dyn Repository,
    gallery_id: Uuid,
    owner_id: Uuid,
) -> Result<(), AppError> {
    match repo.get_gallery(gallery_id).await? {
        Some(gallery) if gallery.author_id == owner_id => Ok(()),
        _ => Err(AppError::NotFound(GALLERY_NOT_FOUND)),
    }
}

// --- Handlers: Health & Accounts ---

/// health
///
/// [Public Route] Liveness plus a storage round trip.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Storage reachable", body = OkResponse),
        (status = 500, description = "Storage unreachable", body = OkResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<OkResponse>) {
    match state.repo.ping().await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(OkResponse { ok: false }))
        }
    }
}

/// register_user
///
/// [Public Route] Creates a poet or reader account and opens a session.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Incomplete data, invalid role or weak password", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let user = policy::register(state.repo.as_ref(), state.hasher.as_ref(), payload).await?;
    let token = issue_token(&state.config, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// login_user
///
/// [Public Route] Verifies credentials. A supplied role must match the account's role;
/// that failure (403) is distinct from bad credentials (401).
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 403, description = "Role does not match the account", body = ErrorBody)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let user = policy::login(state.repo.as_ref(), state.hasher.as_ref(), payload).await?;
    let token = issue_token(&state.config, &user)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse { user, token }))
}

/// logout_user
///
/// [Public Route] Sessions are stateless tokens; the client simply drops its token.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses((status = 200, description = "Logged out", body = OkResponse))
)]
pub async fn logout_user() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

// --- Handlers: Poems ---

/// list_poems
///
/// [Public Route] All poems, newest first. `gallery=none` selects poems with no gallery or
/// in a reserved (hidden) gallery.
#[utoipa::path(
    get,
    path = "/api/poems",
    params(PoemFilter),
    responses(
        (status = 200, description = "Poems", body = PoemList),
        (status = 400, description = "Invalid filter", body = ErrorBody)
    )
)]
pub async fn list_poems(
    State(state): State<AppState>,
    query: Result<Query<PoemFilter>, QueryRejection>,
) -> Result<Json<PoemList>, AppError> {
    let Query(filter) = query?;
    let author_id = parse_optional_id(filter.author_id.as_deref())?;
    let gallery_filter = GalleryFilter::parse(filter.gallery.as_deref())?;

    let poems = state.repo.list_poems(author_id).await?;

    let hidden_ids = if gallery_filter == GalleryFilter::Unassigned {
        visibility::hidden_gallery_ids(&state.repo.list_galleries(author_id).await?)
    } else {
        HashSet::new()
    };

    let poems = visibility::filter_poems(poems, gallery_filter, &hidden_ids);
    Ok(Json(PoemList { poems }))
}

/// get_poem
///
/// [Public Route] A single poem by id.
#[utoipa::path(
    get,
    path = "/api/poems/{id}",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Found", body = PoemEnvelope),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_poem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PoemEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let poem = state
        .repo
        .get_poem(id)
        .await?
        .ok_or(AppError::NotFound(POEM_NOT_FOUND))?;
    Ok(Json(PoemEnvelope { poem }))
}

/// create_poem
///
/// [Authenticated Route] Publishes a poem as the authenticated poet, optionally into one of
/// their galleries.
#[utoipa::path(
    post,
    path = "/api/poems",
    request_body = PoemRequest,
    responses(
        (status = 201, description = "Created", body = PoemEnvelope),
        (status = 400, description = "Incomplete data", body = ErrorBody),
        (status = 403, description = "Readers cannot publish", body = ErrorBody),
        (status = 404, description = "Gallery not found", body = ErrorBody)
    )
)]
pub async fn create_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<PoemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PoemEnvelope>), AppError> {
    auth.require_poet()?;
    let Json(payload) = payload?;
    let title = required_text(payload.title)?;
    let content = required_text(payload.content)?;

    if let Some(gallery_id) = payload.gallery_id {
        ensure_owned_gallery(state.repo.as_ref(), gallery_id, auth.id).await?;
    }

    let poem = state
        .repo
        .create_poem(NewPoem {
            author_id: Some(auth.id),
            gallery_id: payload.gallery_id,
            title,
            content,
        })
        .await?;

    tracing::info!(poem_id = %poem.id, author_id = %auth.id, "poem published");
    Ok((StatusCode::CREATED, Json(PoemEnvelope { poem })))
}

/// update_poem
///
/// [Authenticated Route] Replaces title, content and gallery of the caller's own poem.
///
/// *Authorization*: the repository applies the change only `WHERE id AND author_id` match,
/// so another user's poem and a missing poem both answer 404.
#[utoipa::path(
    put,
    path = "/api/poems/{id}",
    params(("id" = Uuid, Path, description = "Poem ID")),
    request_body = PoemRequest,
    responses(
        (status = 200, description = "Updated", body = PoemEnvelope),
        (status = 400, description = "Incomplete data", body = ErrorBody),
        (status = 404, description = "Not Found or Not Yours", body = ErrorBody)
    )
)]
pub async fn update_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PoemRequest>, JsonRejection>,
) -> Result<Json<PoemEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let changes = PoemChanges {
        title: required_text(payload.title)?,
        content: required_text(payload.content)?,
        gallery_id: payload.gallery_id,
    };

    if let Some(gallery_id) = changes.gallery_id {
        ensure_owned_gallery(state.repo.as_ref(), gallery_id, auth.id).await?;
    }

    let poem = state
        .repo
        .update_poem(id, auth.id, changes)
        .await?
        .ok_or(AppError::NotFound(POEM_NOT_FOUND))?;
    Ok(Json(PoemEnvelope { poem }))
}

/// delete_poem
///
/// [Authenticated Route] Deletes the caller's own poem together with its likes, saves and
/// reads. Missing and not-owned are both 404.
#[utoipa::path(
    delete,
    path = "/api/poems/{id}",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Deleted", body = OkResponse),
        (status = 404, description = "Not Found or Not Yours", body = ErrorBody)
    )
)]
pub async fn delete_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.repo.delete_poem(id, auth.id).await? {
        return Err(AppError::NotFound(POEM_NOT_FOUND));
    }
    Ok(Json(OkResponse { ok: true }))
}

/// admin_delete_poem
///
/// [Admin Route] Deletes any poem by id, bypassing ownership. Requires the `x-admin-key`
/// header to match the configured key.
#[utoipa::path(
    delete,
    path = "/api/admin/poems/{id}",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Deleted", body = OkResponse),
        (status = 403, description = "Missing or wrong admin key", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn admin_delete_poem(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.repo.delete_poem_admin(id).await? {
        return Err(AppError::NotFound(POEM_NOT_FOUND));
    }
    tracing::warn!(poem_id = %id, "poem deleted through the administrative path");
    Ok(Json(OkResponse { ok: true }))
}

// --- Handlers: Galleries ---

/// list_galleries
///
/// [Public Route] Galleries, newest first, without reserved ones. Poems in reserved
/// galleries are counted with the ungalleried ones.
#[utoipa::path(
    get,
    path = "/api/galleries",
    params(GalleryFilterParams),
    responses(
        (status = 200, description = "Visible galleries", body = GalleryList),
        (status = 400, description = "Invalid author id", body = ErrorBody)
    )
)]
pub async fn list_galleries(
    State(state): State<AppState>,
    query: Result<Query<GalleryFilterParams>, QueryRejection>,
) -> Result<Json<GalleryList>, AppError> {
    let Query(filter) = query?;
    let author_id = parse_optional_id(filter.author_id.as_deref())?;

    let (galleries, poems) = tokio::try_join!(
        state.repo.list_galleries(author_id),
        state.repo.list_poems(author_id),
    )?;

    Ok(Json(visibility::gallery_listing(galleries, &poems)))
}

/// get_gallery
///
/// [Public Route] A single gallery by id. Reserved galleries are returned too.
#[utoipa::path(
    get,
    path = "/api/galleries/{id}",
    params(("id" = Uuid, Path, description = "Gallery ID")),
    responses(
        (status = 200, description = "Found", body = GalleryEnvelope),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_gallery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GalleryEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let gallery = state
        .repo
        .get_gallery(id)
        .await?
        .ok_or(AppError::NotFound(GALLERY_NOT_FOUND))?;
    Ok(Json(GalleryEnvelope { gallery }))
}

/// create_gallery
///
/// [Authenticated Route] Creates a gallery owned by the authenticated poet.
#[utoipa::path(
    post,
    path = "/api/galleries",
    request_body = GalleryRequest,
    responses(
        (status = 201, description = "Created", body = GalleryEnvelope),
        (status = 400, description = "Incomplete data", body = ErrorBody),
        (status = 403, description = "Readers cannot own galleries", body = ErrorBody),
        (status = 409, description = "Duplicate name", body = ErrorBody)
    )
)]
pub async fn create_gallery(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<GalleryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GalleryEnvelope>), AppError> {
    auth.require_poet()?;
    let Json(payload) = payload?;
    let name = required_text(payload.name)?;

    let gallery = state.repo.create_gallery(auth.id, &name).await?;
    Ok((StatusCode::CREATED, Json(GalleryEnvelope { gallery })))
}

/// rename_gallery
///
/// [Authenticated Route] Renames the caller's own gallery.
#[utoipa::path(
    put,
    path = "/api/galleries/{id}",
    params(("id" = Uuid, Path, description = "Gallery ID")),
    request_body = GalleryRequest,
    responses(
        (status = 200, description = "Renamed", body = GalleryEnvelope),
        (status = 404, description = "Not Found or Not Yours", body = ErrorBody),
        (status = 409, description = "Duplicate name", body = ErrorBody)
    )
)]
pub async fn rename_gallery(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<GalleryRequest>, JsonRejection>,
) -> Result<Json<GalleryEnvelope>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let name = required_text(payload.name)?;

    let gallery = state
        .repo
        .rename_gallery(id, auth.id, &name)
        .await?
        .ok_or(AppError::NotFound(GALLERY_NOT_FOUND))?;
    Ok(Json(GalleryEnvelope { gallery }))
}

/// delete_gallery
///
/// [Authenticated Route] Deletes the caller's own gallery. Its poems remain, ungalleried.
#[utoipa::path(
    delete,
    path = "/api/galleries/{id}",
    params(("id" = Uuid, Path, description = "Gallery ID")),
    responses(
        (status = 200, description = "Deleted", body = OkResponse),
        (status = 404, description = "Not Found or Not Yours", body = ErrorBody)
    )
)]
pub async fn delete_gallery(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.repo.delete_gallery(id, auth.id).await? {
        return Err(AppError::NotFound(GALLERY_NOT_FOUND));
    }
    Ok(Json(OkResponse { ok: true }))
}

// --- Handlers: Interactions ---

async fn add_interaction(
    state: &AppState,
    kind: InteractionKind,
    poem_id: &str,
    user: &AuthUser,
) -> Result<Json<InteractionResponse>, AppError> {
    let poem_id = parse_id(poem_id)?;
    let outcome = interactions::record(state.repo.as_ref(), kind, poem_id, user.id).await?;
    Ok(Json(InteractionResponse {
        ok: true,
        ignored: outcome.is_ignored().then_some(true),
    }))
}

async fn remove_interaction(
    state: &AppState,
    kind: InteractionKind,
    poem_id: &str,
    user: &AuthUser,
) -> Result<Json<OkResponse>, AppError> {
    let poem_id = parse_id(poem_id)?;
    interactions::remove(state.repo.as_ref(), kind, poem_id, user.id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// like_poem
///
/// [Authenticated Route] Idempotent like. Liking one's own poem answers `ignored: true`.
#[utoipa::path(
    post,
    path = "/api/poems/{id}/like",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Recorded or ignored", body = InteractionResponse),
        (status = 404, description = "Poem not found", body = ErrorBody)
    )
)]
pub async fn like_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InteractionResponse>, AppError> {
    add_interaction(&state, InteractionKind::Like, &id, &auth).await
}

/// unlike_poem
///
/// [Authenticated Route] Removes the caller's like, if any.
#[utoipa::path(
    delete,
    path = "/api/poems/{id}/like",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses((status = 200, description = "Removed", body = OkResponse))
)]
pub async fn unlike_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    remove_interaction(&state, InteractionKind::Like, &id, &auth).await
}

/// save_poem
///
/// [Authenticated Route] Idempotent bookmark.
#[utoipa::path(
    post,
    path = "/api/poems/{id}/save",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Recorded or ignored", body = InteractionResponse),
        (status = 404, description = "Poem not found", body = ErrorBody)
    )
)]
pub async fn save_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InteractionResponse>, AppError> {
    add_interaction(&state, InteractionKind::Save, &id, &auth).await
}

/// unsave_poem
///
/// [Authenticated Route] Removes the caller's bookmark, if any.
#[utoipa::path(
    delete,
    path = "/api/poems/{id}/save",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses((status = 200, description = "Removed", body = OkResponse))
)]
pub async fn unsave_poem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    remove_interaction(&state, InteractionKind::Save, &id, &auth).await
}

/// mark_poem_read
///
/// [Authenticated Route] Records that the caller read the poem.
#[utoipa::path(
    post,
    path = "/api/poems/{id}/read",
    params(("id" = Uuid, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Recorded or ignored", body = InteractionResponse),
        (status = 404, description = "Poem not found", body = ErrorBody)
    )
)]
pub async fn mark_poem_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InteractionResponse>, AppError> {
    add_interaction(&state, InteractionKind::Read, &id, &auth).await
}

// --- Handlers: Profiles ---

/// liked_poems
///
/// [Public Route] Poems the user liked, most recent like first.
#[utoipa::path(
    get,
    path = "/api/users/{id}/liked-poems",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Liked poems", body = PoemList))
)]
pub async fn liked_poems(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PoemList>, AppError> {
    let user_id = parse_id(&user_id)?;
    let poems = state
        .repo
        .interacted_poems(InteractionKind::Like, user_id)
        .await?;
    Ok(Json(PoemList { poems }))
}

/// saved_poems
///
/// [Public Route] Poems the user bookmarked, most recent first.
#[utoipa::path(
    get,
    path = "/api/users/{id}/saved-poems",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Saved poems", body = PoemList))
)]
pub async fn saved_poems(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PoemList>, AppError> {
    let user_id = parse_id(&user_id)?;
    let poems = state
        .repo
        .interacted_poems(InteractionKind::Save, user_id)
        .await?;
    Ok(Json(PoemList { poems }))
}

/// get_poem_interactions
///
/// [Public Route] Liked/saved/read state of one user over a page of poems, in one round trip.
#[utoipa::path(
    get,
    path = "/api/users/{id}/poem-interactions",
    params(("id" = Uuid, Path, description = "User ID"), PoemIdsParams),
    responses((status = 200, description = "Interaction state", body = PoemInteractions))
)]
pub async fn get_poem_interactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<PoemIdsParams>, QueryRejection>,
) -> Result<Json<PoemInteractions>, AppError> {
    let user_id = parse_id(&user_id)?;
    let Query(params) = query?;
    let poem_ids = interactions::parse_poem_ids(params.poem_ids.as_deref().unwrap_or_default());
    let state_for_page =
        interactions::poem_interactions(state.repo.as_ref(), user_id, &poem_ids).await?;
    Ok(Json(state_for_page))
}

/// get_poet_stats
///
/// [Public Route] Publication and audience counters for a poet.
#[utoipa::path(
    get,
    path = "/api/poets/{id}/stats",
    params(("id" = Uuid, Path, description = "Poet ID")),
    responses((status = 200, description = "Stats", body = PoetStatsEnvelope))
)]
pub async fn get_poet_stats(
    State(state): State<AppState>,
    Path(poet_id): Path<String>,
) -> Result<Json<PoetStatsEnvelope>, AppError> {
    let poet_id = parse_id(&poet_id)?;
    let stats = state.repo.poet_stats(poet_id).await?;
    Ok(Json(PoetStatsEnvelope { stats }))
}
