use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Gallery, InteractionKind, NewPoem, NewUser, Poem, PoemChanges, PoetStats, User,
        UserRecord,
    },
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::{PostgresRepository, connect_with_retry};

/// Repository Trait
///
/// The storage collaborator. Handlers and the policy/interaction layers only ever see this
/// trait, so the whole request path runs against `InMemoryRepository` in tests.
///
/// Ownership-guarded mutations take the asserted owner id and apply as a single conditional
/// statement (`... WHERE id = $1 AND author_id = $2`). Zero matched rows is reported as
/// `None`/`false` without saying whether the row was absent or owned by someone else.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;

    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// Looks up by an already normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    // --- Galleries ---
    async fn list_galleries(&self, author_id: Option<Uuid>) -> Result<Vec<Gallery>, AppError>;
    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, AppError>;
    /// Fails with `Conflict` when the owner already has a gallery of that name.
    async fn create_gallery(&self, author_id: Uuid, name: &str) -> Result<Gallery, AppError>;
    // Owner-Only.
    async fn rename_gallery(
        &self,
        id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Gallery>, AppError>;
    // Owner-Only. Poems of the gallery survive with `gallery_id` set to null.
    async fn delete_gallery(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError>;

    // --- Poems ---
    /// Newest first.
    async fn list_poems(&self, author_id: Option<Uuid>) -> Result<Vec<Poem>, AppError>;
    async fn get_poem(&self, id: Uuid) -> Result<Option<Poem>, AppError>;
    async fn create_poem(&self, poem: NewPoem) -> Result<Poem, AppError>;
    // Owner-Only.
    async fn update_poem(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PoemChanges,
    ) -> Result<Option<Poem>, AppError>;
    // Owner-Only. Interaction rows of the poem are removed with it.
    async fn delete_poem(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError>;
    /// Administrative delete by id alone. Only reachable behind the admin key.
    async fn delete_poem_admin(&self, id: Uuid) -> Result<bool, AppError>;
    /// Number of poems without an author (curated seed content and orphans).
    async fn count_unowned_poems(&self) -> Result<i64, AppError>;

    // --- Interactions ---
    /// Idempotent: returns `true` only if a new row was written.
    async fn insert_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;
    /// Removing an absent pair is not an error; returns whether a row was removed.
    async fn delete_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;
    /// The subset of `poem_ids` the user has a `kind` record for.
    async fn interacted_poem_ids(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
        poem_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError>;
    /// Poems the user has a `kind` record for, most recent interaction first.
    async fn interacted_poems(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
    ) -> Result<Vec<Poem>, AppError>;
    async fn poet_stats(&self, poet_id: Uuid) -> Result<PoetStats, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;
