//! Interaction Deduplicator.
//!
//! Likes, saves and reads are at most one row per (poem, user) and kind. Adding one twice
//! is a no-op, removing an absent one is a no-op, and a user's interactions with their own
//! poem are accepted but never written.

use std::collections::HashSet;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{InteractionKind, PoemInteractions},
    repository::Repository,
};

pub const POEM_NOT_FOUND: &str = "Poem not found.";

/// InteractionOutcome
///
/// What an "add" call did. Only `Ignored` is visible to clients; `Recorded` and
/// `Unchanged` both answer `{ ok: true }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// A new row was written.
    Recorded,
    /// The pair already existed.
    Unchanged,
    /// The user authored the poem; nothing was written.
    Ignored,
}

impl InteractionOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, InteractionOutcome::Ignored)
    }
}

/// record
///
/// Resolves the poem's author, skips self-interaction, then inserts idempotently.
pub async fn record(
    repo: &dyn Repository,
    kind: InteractionKind,
    poem_id: Uuid,
    user_id: Uuid,
) -> Result<InteractionOutcome, AppError> {
    let poem = repo
        .get_poem(poem_id)
        .await?
        .ok_or(AppError::NotFound(POEM_NOT_FOUND))?;

    if poem.author_id == Some(user_id) {
        tracing::debug!(%poem_id, %user_id, ?kind, ignored = true, "self-interaction skipped");
        return Ok(InteractionOutcome::Ignored);
    }

    // Unique key on (poem_id, user_id): concurrent identical requests collapse to one row.
    let inserted = repo.insert_interaction(kind, poem_id, user_id).await?;
    Ok(if inserted {
        InteractionOutcome::Recorded
    } else {
        InteractionOutcome::Unchanged
    })
}

/// remove
///
/// Unconditional delete of the pair; absent pairs are fine.
pub async fn remove(
    repo: &dyn Repository,
    kind: InteractionKind,
    poem_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    let removed = repo.delete_interaction(kind, poem_id, user_id).await?;
    tracing::debug!(%poem_id, %user_id, ?kind, removed, "interaction removed");
    Ok(())
}

/// Parses a comma-separated id list, skipping anything that is not a UUID and duplicates.
pub fn parse_poem_ids(raw: &str) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    raw.split(',')
        .filter_map(|part| Uuid::parse_str(part.trim()).ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// poem_interactions
///
/// One user's liked/saved/read state over a page of poems. Each list is restricted to
/// `poem_ids` and keeps their order. An empty page never reaches storage.
pub async fn poem_interactions(
    repo: &dyn Repository,
    user_id: Uuid,
    poem_ids: &[Uuid],
) -> Result<PoemInteractions, AppError> {
    if poem_ids.is_empty() {
        return Ok(PoemInteractions::default());
    }

    let (liked, saved, read) = tokio::try_join!(
        repo.interacted_poem_ids(InteractionKind::Like, user_id, poem_ids),
        repo.interacted_poem_ids(InteractionKind::Save, user_id, poem_ids),
        repo.interacted_poem_ids(InteractionKind::Read, user_id, poem_ids),
    )?;

    let in_request_order = |found: Vec<Uuid>| -> Vec<Uuid> {
        let found: HashSet<Uuid> = found.into_iter().collect();
        poem_ids.iter().copied().filter(|id| found.contains(id)).collect()
    };

    Ok(PoemInteractions {
        liked: in_request_order(liked),
        saved: in_request_order(saved),
        read: in_request_order(read),
    })
}
