use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use poetry_journal::{
    AppState, MockHasher,
    auth::{AdminKey, AuthUser},
    config::AppConfig,
    error::AppError,
    handlers::{self, GalleryFilterParams, PoemFilter, PoemIdsParams},
    models::{
        GalleryRequest, InteractionKind, LoginRequest, Poem, PoemRequest, RegisterRequest, Role,
        User,
    },
    repository::{InMemoryRepository, Repository},
};
use std::sync::Arc;
use uuid::Uuid;

// --- TEST UTILITIES ---

const PASSWORD: &str = "Secret123";

fn create_test_state() -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        hasher: Arc::new(MockHasher::new()),
        config: AppConfig::default(),
    };
    (state, repo)
}

async fn register(state: &AppState, email: &str, role: &str) -> User {
    let (status, Json(body)) = handlers::register_user(
        State(state.clone()),
        Ok(Json(RegisterRequest {
            name: Some("Ana".to_string()),
            email: Some(email.to_string()),
            password: Some(PASSWORD.to_string()),
            role: Some(role.to_string()),
        })),
    )
    .await
    .expect("registration should succeed");

    assert_eq!(status, StatusCode::CREATED);
    assert!(!body.token.is_empty());
    body.user
}

fn as_auth(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

fn poem_request(title: &str, gallery_id: Option<Uuid>) -> PoemRequest {
    PoemRequest {
        title: Some(title.to_string()),
        content: Some("Shall I compare thee".to_string()),
        gallery_id,
    }
}

async fn publish(state: &AppState, author: &User, title: &str, gallery_id: Option<Uuid>) -> Poem {
    let (status, Json(body)) = handlers::create_poem(
        as_auth(author),
        State(state.clone()),
        Ok(Json(poem_request(title, gallery_id))),
    )
    .await
    .expect("poem creation should succeed");
    assert_eq!(status, StatusCode::CREATED);
    body.poem
}

async fn new_gallery(state: &AppState, owner: &User, name: &str) -> Uuid {
    let (_, Json(body)) = handlers::create_gallery(
        as_auth(owner),
        State(state.clone()),
        Ok(Json(GalleryRequest {
            name: Some(name.to_string()),
        })),
    )
    .await
    .expect("gallery creation should succeed");
    body.gallery.id
}

fn status_of(err: AppError) -> StatusCode {
    err.into_response().status()
}

// --- ACCOUNTS ---

#[tokio::test]
async fn test_register_then_login_with_matching_role() {
    let (state, _) = create_test_state();
    let user = register(&state, "Ana@Example.com ", "poet").await;
    assert_eq!(user.email, "ana@example.com");
    assert_eq!(user.role, Role::Poet);

    let Json(session) = handlers::login_user(
        State(state),
        Ok(Json(LoginRequest {
            email: Some("ANA@example.com".to_string()),
            password: Some(PASSWORD.to_string()),
            role: Some("poet".to_string()),
        })),
    )
    .await
    .expect("login should succeed");

    assert_eq!(session.user.id, user.id);
}

#[tokio::test]
async fn test_register_rejects_duplicate_email_case_insensitively() {
    let (state, _) = create_test_state();
    register(&state, "ana@example.com", "poet").await;

    let result = handlers::register_user(
        State(state),
        Ok(Json(RegisterRequest {
            name: Some("Other".to_string()),
            email: Some("ANA@EXAMPLE.COM".to_string()),
            password: Some(PASSWORD.to_string()),
            role: Some("reader".to_string()),
        })),
    )
    .await;

    assert_eq!(status_of(result.unwrap_err()), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_unknown_role() {
    let (state, _) = create_test_state();

    let weak = handlers::register_user(
        State(state.clone()),
        Ok(Json(RegisterRequest {
            name: Some("Ana".to_string()),
            email: Some("ana@example.com".to_string()),
            password: Some("password".to_string()),
            role: Some("poet".to_string()),
        })),
    )
    .await;
    assert!(matches!(weak.unwrap_err(), AppError::WeakPassword));

    let bad_role = handlers::register_user(
        State(state),
        Ok(Json(RegisterRequest {
            name: Some("Ana".to_string()),
            email: Some("ana@example.com".to_string()),
            password: Some(PASSWORD.to_string()),
            role: Some("editor".to_string()),
        })),
    )
    .await;
    assert!(matches!(bad_role.unwrap_err(), AppError::InvalidRole));
}

#[tokio::test]
async fn test_login_distinguishes_credentials_from_role_mismatch() {
    let (state, _) = create_test_state();
    register(&state, "reader@example.com", "reader").await;

    let attempt = |password: &str, role: Option<&str>| LoginRequest {
        email: Some("reader@example.com".to_string()),
        password: Some(password.to_string()),
        role: role.map(str::to_string),
    };

    let wrong_password =
        handlers::login_user(State(state.clone()), Ok(Json(attempt("Wrong1234", None)))).await;
    assert_eq!(status_of(wrong_password.unwrap_err()), StatusCode::UNAUTHORIZED);

    let wrong_role =
        handlers::login_user(State(state.clone()), Ok(Json(attempt(PASSWORD, Some("poet"))))).await;
    assert_eq!(status_of(wrong_role.unwrap_err()), StatusCode::FORBIDDEN);

    let unknown = handlers::login_user(
        State(state),
        Ok(Json(LoginRequest {
            email: Some("nobody@example.com".to_string()),
            password: Some(PASSWORD.to_string()),
            role: None,
        })),
    )
    .await;
    assert_eq!(status_of(unknown.unwrap_err()), StatusCode::UNAUTHORIZED);
}

// --- POEMS & OWNERSHIP ---

#[tokio::test]
async fn test_reader_cannot_publish() {
    let (state, _) = create_test_state();
    let reader = register(&state, "reader@example.com", "reader").await;

    let result = handlers::create_poem(
        as_auth(&reader),
        State(state),
        Ok(Json(poem_request("Ode", None))),
    )
    .await;

    assert_eq!(status_of(result.unwrap_err()), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_poem_requires_title_and_content() {
    let (state, _) = create_test_state();
    let poet = register(&state, "poet@example.com", "poet").await;

    let result = handlers::create_poem(
        as_auth(&poet),
        State(state),
        Ok(Json(PoemRequest {
            title: Some("   ".to_string()),
            content: Some("text".to_string()),
            gallery_id: None,
        })),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Incomplete data.");
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_by_non_owner_is_not_found_and_leaves_poem_untouched() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let intruder = register(&state, "intruder@example.com", "poet").await;
    let poem = publish(&state, &author, "Original", None).await;

    let result = handlers::update_poem(
        as_auth(&intruder),
        State(state),
        Path(poem.id.to_string()),
        Ok(Json(poem_request("Hijacked", None))),
    )
    .await;

    assert_eq!(status_of(result.unwrap_err()), StatusCode::NOT_FOUND);
    let stored = repo.get_poem(poem.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Original");
}

#[tokio::test]
async fn test_update_missing_poem_is_indistinguishable_from_not_owned() {
    let (state, _) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;

    let result = handlers::update_poem(
        as_auth(&author),
        State(state),
        Path(Uuid::new_v4().to_string()),
        Ok(Json(poem_request("Ghost", None))),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Poem not found.");
}

#[tokio::test]
async fn test_owner_can_update_and_unassign_gallery() {
    let (state, _) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let gallery_id = new_gallery(&state, &author, "Sonnets").await;
    let poem = publish(&state, &author, "Draft", Some(gallery_id)).await;
    assert_eq!(poem.gallery_id, Some(gallery_id));

    let Json(updated) = handlers::update_poem(
        as_auth(&author),
        State(state),
        Path(poem.id.to_string()),
        Ok(Json(poem_request("Final", None))),
    )
    .await
    .expect("owner update should succeed");

    assert_eq!(updated.poem.title, "Final");
    assert_eq!(updated.poem.gallery_id, None);
}

#[tokio::test]
async fn test_cannot_file_poem_into_someone_elses_gallery() {
    let (state, _) = create_test_state();
    let owner = register(&state, "owner@example.com", "poet").await;
    let other = register(&state, "other@example.com", "poet").await;
    let gallery_id = new_gallery(&state, &owner, "Private").await;

    let result = handlers::create_poem(
        as_auth(&other),
        State(state),
        Ok(Json(poem_request("Sneaky", Some(gallery_id)))),
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), handlers::GALLERY_NOT_FOUND);
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_poem_cascades_interactions() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let poem = publish(&state, &author, "Brief", None).await;

    handlers::like_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
        .await
        .unwrap();
    handlers::mark_poem_read(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
        .await
        .unwrap();
    assert_eq!(repo.interaction_count(InteractionKind::Like, poem.id).await, 1);

    // Not the owner: nothing happens.
    let denied =
        handlers::delete_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
            .await;
    assert_eq!(status_of(denied.unwrap_err()), StatusCode::NOT_FOUND);
    assert_eq!(repo.interaction_count(InteractionKind::Read, poem.id).await, 1);

    let Json(ok) =
        handlers::delete_poem(as_auth(&author), State(state), Path(poem.id.to_string()))
            .await
            .unwrap();
    assert!(ok.ok);
    assert!(repo.get_poem(poem.id).await.unwrap().is_none());
    assert_eq!(repo.interaction_count(InteractionKind::Like, poem.id).await, 0);
    assert_eq!(repo.interaction_count(InteractionKind::Read, poem.id).await, 0);
}

#[tokio::test]
async fn test_admin_delete_bypasses_ownership() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let poem = publish(&state, &author, "Removed", None).await;

    let Json(ok) =
        handlers::admin_delete_poem(AdminKey, State(state.clone()), Path(poem.id.to_string()))
            .await
            .unwrap();
    assert!(ok.ok);
    assert!(repo.get_poem(poem.id).await.unwrap().is_none());

    let again =
        handlers::admin_delete_poem(AdminKey, State(state), Path(poem.id.to_string())).await;
    assert_eq!(status_of(again.unwrap_err()), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_id_is_a_bad_request() {
    let (state, _) = create_test_state();
    let result = handlers::get_poem(State(state), Path("not-a-uuid".to_string())).await;
    assert_eq!(status_of(result.unwrap_err()), StatusCode::BAD_REQUEST);
}

// --- INTERACTIONS ---

#[tokio::test]
async fn test_like_is_idempotent() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let poem = publish(&state, &author, "Twice", None).await;

    for _ in 0..2 {
        let Json(resp) =
            handlers::like_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
                .await
                .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.ignored, None);
    }

    assert_eq!(repo.interaction_count(InteractionKind::Like, poem.id).await, 1);
}

#[tokio::test]
async fn test_self_interaction_is_ignored_and_not_stored() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let poem = publish(&state, &author, "Mine", None).await;

    let Json(resp) =
        handlers::save_poem(as_auth(&author), State(state), Path(poem.id.to_string()))
            .await
            .unwrap();

    assert!(resp.ok);
    assert_eq!(resp.ignored, Some(true));
    assert_eq!(repo.interaction_count(InteractionKind::Save, poem.id).await, 0);
}

#[tokio::test]
async fn test_reading_own_poem_is_ignored_and_not_stored() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let poem = publish(&state, &author, "Mine Too", None).await;

    let Json(resp) =
        handlers::mark_poem_read(as_auth(&author), State(state), Path(poem.id.to_string()))
            .await
            .unwrap();

    assert!(resp.ok);
    assert_eq!(resp.ignored, Some(true));
    assert_eq!(repo.interaction_count(InteractionKind::Read, poem.id).await, 0);
}

#[tokio::test]
async fn test_interacting_with_missing_poem_is_not_found() {
    let (state, _) = create_test_state();
    let reader = register(&state, "reader@example.com", "reader").await;

    let result =
        handlers::like_poem(as_auth(&reader), State(state), Path(Uuid::new_v4().to_string())).await;
    assert_eq!(status_of(result.unwrap_err()), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_removing_absent_interaction_succeeds() {
    let (state, repo) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let poem = publish(&state, &author, "Unliked", None).await;

    let Json(ok) =
        handlers::unlike_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
            .await
            .unwrap();
    assert!(ok.ok);

    handlers::save_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
        .await
        .unwrap();
    handlers::unsave_poem(as_auth(&reader), State(state), Path(poem.id.to_string()))
        .await
        .unwrap();
    assert_eq!(repo.interaction_count(InteractionKind::Save, poem.id).await, 0);
}

#[tokio::test]
async fn test_poem_interactions_are_restricted_to_requested_ids() {
    let (state, _) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let first = publish(&state, &author, "First", None).await;
    let second = publish(&state, &author, "Second", None).await;
    let third = publish(&state, &author, "Third", None).await;

    for poem in [&first, &second, &third] {
        handlers::like_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
            .await
            .unwrap();
    }
    handlers::save_poem(as_auth(&reader), State(state.clone()), Path(second.id.to_string()))
        .await
        .unwrap();

    let Json(page) = handlers::get_poem_interactions(
        State(state.clone()),
        Path(reader.id.to_string()),
        Ok(Query(PoemIdsParams {
            poem_ids: Some(format!("{},{},junk", second.id, first.id)),
        })),
    )
    .await
    .unwrap();

    assert_eq!(page.liked, vec![second.id, first.id]);
    assert_eq!(page.saved, vec![second.id]);
    assert!(page.read.is_empty());

    let Json(empty) = handlers::get_poem_interactions(
        State(state),
        Path(reader.id.to_string()),
        Ok(Query(PoemIdsParams::default())),
    )
    .await
    .unwrap();
    assert!(empty.liked.is_empty() && empty.saved.is_empty() && empty.read.is_empty());
}

#[tokio::test]
async fn test_liked_and_saved_lists_newest_first() {
    let (state, _) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let older = publish(&state, &author, "Older", None).await;
    let newer = publish(&state, &author, "Newer", None).await;

    handlers::like_poem(as_auth(&reader), State(state.clone()), Path(newer.id.to_string()))
        .await
        .unwrap();
    handlers::like_poem(as_auth(&reader), State(state.clone()), Path(older.id.to_string()))
        .await
        .unwrap();

    let Json(liked) = handlers::liked_poems(State(state.clone()), Path(reader.id.to_string()))
        .await
        .unwrap();
    let ids: Vec<Uuid> = liked.poems.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![older.id, newer.id]);

    let Json(saved) = handlers::saved_poems(State(state), Path(reader.id.to_string()))
        .await
        .unwrap();
    assert!(saved.poems.is_empty());
}

#[tokio::test]
async fn test_poet_stats_counts_audience() {
    let (state, _) = create_test_state();
    let author = register(&state, "author@example.com", "poet").await;
    let reader = register(&state, "reader@example.com", "reader").await;
    let other = register(&state, "other@example.com", "reader").await;
    let poem = publish(&state, &author, "Read Me", None).await;
    publish(&state, &author, "Unread", None).await;

    for user in [&reader, &other] {
        handlers::mark_poem_read(as_auth(user), State(state.clone()), Path(poem.id.to_string()))
            .await
            .unwrap();
    }
    handlers::like_poem(as_auth(&reader), State(state.clone()), Path(poem.id.to_string()))
        .await
        .unwrap();

    let Json(body) = handlers::get_poet_stats(State(state), Path(author.id.to_string()))
        .await
        .unwrap();

    assert_eq!(body.stats.poem_count, 2);
    assert_eq!(body.stats.reads, 2);
    assert_eq!(body.stats.readers, 2);
    assert_eq!(body.stats.likes, 1);
    assert_eq!(body.stats.saves, 0);
    assert!(body.stats.last_published_at.is_some());
}

// --- GALLERIES & VISIBILITY ---

#[tokio::test]
async fn test_reserved_gallery_is_hidden_but_addressable() {
    let (state, _) = create_test_state();
    let poet = register(&state, "poet@example.com", "poet").await;
    let sonnets = new_gallery(&state, &poet, "Sonnets").await;
    let general = new_gallery(&state, &poet, " General ").await;

    publish(&state, &poet, "In Sonnets", Some(sonnets)).await;
    let legacy = publish(&state, &poet, "In General", Some(general)).await;
    let loose = publish(&state, &poet, "Loose", None).await;

    let Json(listing) = handlers::list_galleries(
        State(state.clone()),
        Ok(Query(GalleryFilterParams {
            author_id: Some(poet.id.to_string()),
        })),
    )
    .await
    .unwrap();

    assert_eq!(listing.galleries.len(), 1);
    assert_eq!(listing.galleries[0].id, sonnets);
    assert_eq!(listing.galleries[0].poem_count, 1);
    assert_eq!(listing.unassigned_poem_count, 2);

    let Json(found) = handlers::get_gallery(State(state.clone()), Path(general.to_string()))
        .await
        .expect("reserved gallery stays addressable");
    assert_eq!(found.gallery.id, general);

    let Json(unassigned) = handlers::list_poems(
        State(state.clone()),
        Ok(Query(PoemFilter {
            author_id: Some(poet.id.to_string()),
            gallery: Some("none".to_string()),
        })),
    )
    .await
    .unwrap();
    let mut ids: Vec<Uuid> = unassigned.poems.iter().map(|p| p.id).collect();
    ids.sort();
    let mut expected = vec![legacy.id, loose.id];
    expected.sort();
    assert_eq!(ids, expected);

    let Json(direct) = handlers::list_poems(
        State(state.clone()),
        Ok(Query(PoemFilter {
            author_id: None,
            gallery: Some(general.to_string()),
        })),
    )
    .await
    .unwrap();
    assert_eq!(direct.poems.len(), 1);
    assert_eq!(direct.poems[0].id, legacy.id);

    // Still mutable by id: rename, then delete.
    let Json(renamed) = handlers::rename_gallery(
        as_auth(&poet),
        State(state.clone()),
        Path(general.to_string()),
        Ok(Json(GalleryRequest {
            name: Some("GENERAL".to_string()),
        })),
    )
    .await
    .expect("reserved gallery can be renamed by its owner");
    assert_eq!(renamed.gallery.id, general);
    assert_eq!(renamed.gallery.name, "GENERAL");

    let Json(deleted) =
        handlers::delete_gallery(as_auth(&poet), State(state.clone()), Path(general.to_string()))
            .await
            .expect("reserved gallery can be deleted by its owner");
    assert!(deleted.ok);

    let Json(orphan) = handlers::get_poem(State(state), Path(legacy.id.to_string()))
        .await
        .unwrap();
    assert_eq!(orphan.poem.gallery_id, None);
}

#[tokio::test]
async fn test_duplicate_gallery_name_conflicts() {
    let (state, _) = create_test_state();
    let poet = register(&state, "poet@example.com", "poet").await;
    new_gallery(&state, &poet, "Haiku").await;

    let result = handlers::create_gallery(
        as_auth(&poet),
        State(state),
        Ok(Json(GalleryRequest {
            name: Some("Haiku".to_string()),
        })),
    )
    .await;
    assert_eq!(status_of(result.unwrap_err()), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rename_and_delete_gallery_are_owner_only() {
    let (state, repo) = create_test_state();
    let owner = register(&state, "owner@example.com", "poet").await;
    let other = register(&state, "other@example.com", "poet").await;
    let gallery_id = new_gallery(&state, &owner, "Elegies").await;
    let poem = publish(&state, &owner, "Lament", Some(gallery_id)).await;

    let rename = |user: &User, name: &str| {
        handlers::rename_gallery(
            as_auth(user),
            State(state.clone()),
            Path(gallery_id.to_string()),
            Ok(Json(GalleryRequest {
                name: Some(name.to_string()),
            })),
        )
    };

    let denied = rename(&other, "Mine now").await;
    assert_eq!(status_of(denied.unwrap_err()), StatusCode::NOT_FOUND);

    let Json(renamed) = rename(&owner, "Odes").await.unwrap();
    assert_eq!(renamed.gallery.name, "Odes");

    let denied = handlers::delete_gallery(
        as_auth(&other),
        State(state.clone()),
        Path(gallery_id.to_string()),
    )
    .await;
    assert_eq!(status_of(denied.unwrap_err()), StatusCode::NOT_FOUND);

    handlers::delete_gallery(as_auth(&owner), State(state), Path(gallery_id.to_string()))
        .await
        .unwrap();

    let orphan = repo.get_poem(poem.id).await.unwrap().unwrap();
    assert_eq!(orphan.gallery_id, None);
}

#[tokio::test]
async fn test_reader_cannot_create_gallery() {
    let (state, _) = create_test_state();
    let reader = register(&state, "reader@example.com", "reader").await;

    let result = handlers::create_gallery(
        as_auth(&reader),
        State(state),
        Ok(Json(GalleryRequest {
            name: Some("Favourites".to_string()),
        })),
    )
    .await;
    assert!(matches!(result.unwrap_err(), AppError::Forbidden));
}

// --- HEALTH ---

#[tokio::test]
async fn test_health_reports_storage_failure() {
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new_failing()),
        hasher: Arc::new(MockHasher::new()),
        config: AppConfig::default(),
    };

    let (status, Json(body)) = handlers::health(State(state)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.ok);
}
