use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::AppError,
    models::{
        Gallery, InteractionKind, NewPoem, NewUser, Poem, PoemChanges, PoetStats, User,
        UserRecord,
    },
};

#[derive(Debug, Clone)]
struct InteractionRow {
    kind: InteractionKind,
    poem_id: Uuid,
    user_id: Uuid,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    galleries: Vec<Gallery>,
    // Insertion order; listings walk it backwards to get newest first.
    poems: Vec<Poem>,
    interactions: Vec<InteractionRow>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory, used to run handlers and the
/// policy/interaction layers without a live database. It mirrors the schema's rules:
/// unique email, unique (author, gallery name), unique interaction pairs, cascade of
/// interactions on poem delete, and `gallery_id` set to null on gallery delete.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    /// When true, every operation fails as if the database were unreachable.
    should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of stored rows of one kind for a poem, across all users.
    pub async fn interaction_count(&self, kind: InteractionKind, poem_id: Uuid) -> usize {
        self.tables
            .read()
            .await
            .interactions
            .iter()
            .filter(|row| row.kind == kind && row.poem_id == poem_id)
            .count()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Storage("in-memory repository set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id)
            .and_then(UserRecord::to_user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already in use."));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            created_at: Utc::now(),
        };
        let created = record
            .to_user()
            .ok_or_else(|| AppError::Storage(format!("unknown role '{}'", record.role)))?;
        tables.users.push(record);
        Ok(created)
    }

    async fn list_galleries(&self, author_id: Option<Uuid>) -> Result<Vec<Gallery>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .galleries
            .iter()
            .rev()
            .filter(|g| author_id.is_none_or(|id| g.author_id == id))
            .cloned()
            .collect())
    }

    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.galleries.iter().find(|g| g.id == id).cloned())
    }

    async fn create_gallery(&self, author_id: Uuid, name: &str) -> Result<Gallery, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == author_id) {
            return Err(AppError::NotFound("Referenced resource not found."));
        }
        if tables
            .galleries
            .iter()
            .any(|g| g.author_id == author_id && g.name == name)
        {
            return Err(AppError::Conflict("Gallery already exists."));
        }

        let gallery = Gallery {
            id: Uuid::new_v4(),
            author_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.galleries.push(gallery.clone());
        Ok(gallery)
    }

    async fn rename_gallery(
        &self,
        id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Gallery>, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(index) = tables
            .galleries
            .iter()
            .position(|g| g.id == id && g.author_id == owner_id)
        else {
            return Ok(None);
        };
        if tables
            .galleries
            .iter()
            .any(|g| g.id != id && g.author_id == owner_id && g.name == name)
        {
            return Err(AppError::Conflict("Gallery already exists."));
        }

        tables.galleries[index].name = name.to_string();
        Ok(Some(tables.galleries[index].clone()))
    }

    async fn delete_gallery(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.galleries.len();
        tables
            .galleries
            .retain(|g| !(g.id == id && g.author_id == owner_id));
        if tables.galleries.len() == before {
            return Ok(false);
        }

        for poem in tables.poems.iter_mut() {
            if poem.gallery_id == Some(id) {
                poem.gallery_id = None;
            }
        }
        Ok(true)
    }

    async fn list_poems(&self, author_id: Option<Uuid>) -> Result<Vec<Poem>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .poems
            .iter()
            .rev()
            .filter(|p| author_id.is_none_or(|id| p.author_id == Some(id)))
            .cloned()
            .collect())
    }

    async fn get_poem(&self, id: Uuid) -> Result<Option<Poem>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.poems.iter().find(|p| p.id == id).cloned())
    }

    async fn create_poem(&self, poem: NewPoem) -> Result<Poem, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(gallery_id) = poem.gallery_id {
            if !tables.galleries.iter().any(|g| g.id == gallery_id) {
                return Err(AppError::NotFound("Referenced resource not found."));
            }
        }

        let created = Poem {
            id: Uuid::new_v4(),
            author_id: poem.author_id,
            gallery_id: poem.gallery_id,
            title: poem.title,
            content: poem.content,
            created_at: Utc::now(),
        };
        tables.poems.push(created.clone());
        Ok(created)
    }

    async fn update_poem(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PoemChanges,
    ) -> Result<Option<Poem>, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(poem) = tables
            .poems
            .iter_mut()
            .find(|p| p.id == id && p.author_id == Some(owner_id))
        else {
            return Ok(None);
        };

        poem.title = changes.title;
        poem.content = changes.content;
        poem.gallery_id = changes.gallery_id;
        Ok(Some(poem.clone()))
    }

    async fn delete_poem(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.poems.len();
        tables
            .poems
            .retain(|p| !(p.id == id && p.author_id == Some(owner_id)));
        let deleted = tables.poems.len() < before;
        if deleted {
            tables.interactions.retain(|row| row.poem_id != id);
        }
        Ok(deleted)
    }

    async fn delete_poem_admin(&self, id: Uuid) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.poems.len();
        tables.poems.retain(|p| p.id != id);
        let deleted = tables.poems.len() < before;
        if deleted {
            tables.interactions.retain(|row| row.poem_id != id);
        }
        Ok(deleted)
    }

    async fn count_unowned_poems(&self) -> Result<i64, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.poems.iter().filter(|p| p.author_id.is_none()).count() as i64)
    }

    async fn insert_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if !tables.poems.iter().any(|p| p.id == poem_id)
            || !tables.users.iter().any(|u| u.id == user_id)
        {
            return Err(AppError::NotFound("Referenced resource not found."));
        }
        let exists = tables
            .interactions
            .iter()
            .any(|row| row.kind == kind && row.poem_id == poem_id && row.user_id == user_id);
        if exists {
            return Ok(false);
        }

        tables.interactions.push(InteractionRow {
            kind,
            poem_id,
            user_id,
        });
        Ok(true)
    }

    async fn delete_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.interactions.len();
        tables
            .interactions
            .retain(|row| !(row.kind == kind && row.poem_id == poem_id && row.user_id == user_id));
        Ok(tables.interactions.len() < before)
    }

    async fn interacted_poem_ids(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
        poem_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        self.check()?;
        let wanted: HashSet<&Uuid> = poem_ids.iter().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .interactions
            .iter()
            .filter(|row| row.kind == kind && row.user_id == user_id && wanted.contains(&row.poem_id))
            .map(|row| row.poem_id)
            .collect())
    }

    async fn interacted_poems(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
    ) -> Result<Vec<Poem>, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .interactions
            .iter()
            .rev()
            .filter(|row| row.kind == kind && row.user_id == user_id)
            .filter_map(|row| tables.poems.iter().find(|p| p.id == row.poem_id).cloned())
            .collect())
    }

    async fn poet_stats(&self, poet_id: Uuid) -> Result<PoetStats, AppError> {
        self.check()?;
        let tables = self.tables.read().await;
        let authored: Vec<&Poem> = tables
            .poems
            .iter()
            .filter(|p| p.author_id == Some(poet_id))
            .collect();
        let poem_ids: HashSet<Uuid> = authored.iter().map(|p| p.id).collect();

        let count = |kind: InteractionKind| {
            tables
                .interactions
                .iter()
                .filter(|row| row.kind == kind && poem_ids.contains(&row.poem_id))
                .count() as i64
        };
        let readers: HashSet<Uuid> = tables
            .interactions
            .iter()
            .filter(|row| row.kind == InteractionKind::Read && poem_ids.contains(&row.poem_id))
            .map(|row| row.user_id)
            .collect();

        Ok(PoetStats {
            poem_count: authored.len() as i64,
            reads: count(InteractionKind::Read),
            readers: readers.len() as i64,
            likes: count(InteractionKind::Like),
            saves: count(InteractionKind::Save),
            last_published_at: authored.iter().map(|p| p.created_at).max(),
        })
    }
}
