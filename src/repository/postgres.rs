use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use super::Repository;
use crate::{
    config::AppConfig,
    error::AppError,
    models::{
        Gallery, InteractionKind, NewPoem, NewUser, Poem, PoemChanges, PoetStats, User,
        UserRecord,
    },
};

const POEM_COLUMNS: &str = "id, author_id, gallery_id, title, content, created_at";
const GALLERY_COLUMNS: &str = "id, author_id, name, created_at";

/// Logs the failing operation before converting the driver error.
fn storage(op: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("{} error: {:?}", op, e);
        AppError::from(e)
    }
}

/// connect_with_retry
///
/// Opens the connection pool, retrying up to `db_connect_retries` times with a fixed delay.
/// The database container is often still starting when the API boots.
pub async fn connect_with_retry(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    let max_attempts = config.db_connect_retries.max(1);
    let delay = Duration::from_millis(config.db_connect_delay_ms);
    let mut attempt = 1;

    loop {
        let result = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.db_url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(attempt, "connected to Postgres");
                return Ok(pool);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max = max_attempts,
                    error = %e,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, max = max_attempts, "database connection failed");
                return Err(e);
            }
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Uniqueness of emails, gallery names and interaction pairs is enforced by the schema's
/// unique constraints, so concurrent writers race safely to a single row.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage("ping"))?;
        Ok(())
    }

    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("get_user"))?;

        Ok(record.and_then(|r| r.to_user()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("find_user_by_email"))
    }

    /// create_user
    ///
    /// A concurrent registration that slipped past the pre-check still lands on the
    /// `users.email` unique constraint and comes back as `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::conflict_or("Email already in use."))?;

        record
            .to_user()
            .ok_or_else(|| AppError::Storage(format!("unknown role '{}'", record.role)))
    }

    // --- GALLERIES ---

    async fn list_galleries(&self, author_id: Option<Uuid>) -> Result<Vec<Gallery>, AppError> {
        let rows = match author_id {
            Some(author_id) => {
                let sql = format!(
                    "SELECT {GALLERY_COLUMNS} FROM galleries WHERE author_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Gallery>(&sql)
                    .bind(author_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {GALLERY_COLUMNS} FROM galleries ORDER BY created_at DESC");
                sqlx::query_as::<_, Gallery>(&sql).fetch_all(&self.pool).await
            }
        };

        rows.map_err(storage("list_galleries"))
    }

    async fn get_gallery(&self, id: Uuid) -> Result<Option<Gallery>, AppError> {
        sqlx::query_as::<_, Gallery>(&format!(
            "SELECT {GALLERY_COLUMNS} FROM galleries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("get_gallery"))
    }

    async fn create_gallery(&self, author_id: Uuid, name: &str) -> Result<Gallery, AppError> {
        sqlx::query_as::<_, Gallery>(&format!(
            "INSERT INTO galleries (id, author_id, name) VALUES ($1, $2, $3) RETURNING {GALLERY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::conflict_or("Gallery already exists."))
    }

    async fn rename_gallery(
        &self,
        id: Uuid,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Gallery>, AppError> {
        sqlx::query_as::<_, Gallery>(&format!(
            "UPDATE galleries SET name = $3 WHERE id = $1 AND author_id = $2 RETURNING {GALLERY_COLUMNS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::conflict_or("Gallery already exists."))
    }

    async fn delete_gallery(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM galleries WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(storage("delete_gallery"))?;
        Ok(result.rows_affected() > 0)
    }

    // --- POEMS ---

    async fn list_poems(&self, author_id: Option<Uuid>) -> Result<Vec<Poem>, AppError> {
        let rows = match author_id {
            Some(author_id) => {
                let sql = format!(
                    "SELECT {POEM_COLUMNS} FROM poems WHERE author_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query_as::<_, Poem>(&sql)
                    .bind(author_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {POEM_COLUMNS} FROM poems ORDER BY created_at DESC");
                sqlx::query_as::<_, Poem>(&sql).fetch_all(&self.pool).await
            }
        };

        rows.map_err(storage("list_poems"))
    }

    async fn get_poem(&self, id: Uuid) -> Result<Option<Poem>, AppError> {
        sqlx::query_as::<_, Poem>(&format!("SELECT {POEM_COLUMNS} FROM poems WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get_poem"))
    }

    async fn create_poem(&self, poem: NewPoem) -> Result<Poem, AppError> {
        sqlx::query_as::<_, Poem>(&format!(
            r#"
            INSERT INTO poems (id, author_id, gallery_id, title, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {POEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(poem.author_id)
        .bind(poem.gallery_id)
        .bind(&poem.title)
        .bind(&poem.content)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("create_poem"))
    }

    /// update_poem
    ///
    /// Owner-Only. The ownership check and the write are the same statement.
    async fn update_poem(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: PoemChanges,
    ) -> Result<Option<Poem>, AppError> {
        sqlx::query_as::<_, Poem>(&format!(
            r#"
            UPDATE poems
            SET title = $3, content = $4, gallery_id = $5
            WHERE id = $1 AND author_id = $2
            RETURNING {POEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner_id)
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(changes.gallery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("update_poem"))
    }

    async fn delete_poem(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM poems WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(storage("delete_poem"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_poem_admin(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM poems WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("delete_poem_admin"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_unowned_poems(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM poems WHERE author_id IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(storage("count_unowned_poems"))
    }

    // --- INTERACTIONS ---

    /// insert_interaction
    ///
    /// `ON CONFLICT DO NOTHING` on the (poem_id, user_id) key makes the insert idempotent.
    async fn insert_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "INSERT INTO {} (poem_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(poem_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage("insert_interaction"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_interaction(
        &self,
        kind: InteractionKind,
        poem_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE poem_id = $1 AND user_id = $2",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(poem_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage("delete_interaction"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn interacted_poem_ids(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
        poem_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        let sql = format!(
            "SELECT poem_id FROM {} WHERE user_id = $1 AND poem_id = ANY($2)",
            kind.table()
        );
        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(user_id)
            .bind(poem_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage("interacted_poem_ids"))
    }

    async fn interacted_poems(
        &self,
        kind: InteractionKind,
        user_id: Uuid,
    ) -> Result<Vec<Poem>, AppError> {
        let sql = format!(
            r#"
            SELECT p.id, p.author_id, p.gallery_id, p.title, p.content, p.created_at
            FROM {} i
            JOIN poems p ON p.id = i.poem_id
            WHERE i.user_id = $1
            ORDER BY i.created_at DESC
            "#,
            kind.table()
        );
        sqlx::query_as::<_, Poem>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage("interacted_poems"))
    }

    /// poet_stats
    ///
    /// Compiles all counters for a poet's profile in a single round trip.
    async fn poet_stats(&self, poet_id: Uuid) -> Result<PoetStats, AppError> {
        sqlx::query_as::<_, PoetStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM poems WHERE author_id = $1) AS poem_count,
                (SELECT COUNT(*) FROM poem_reads r JOIN poems p ON p.id = r.poem_id
                    WHERE p.author_id = $1) AS reads,
                (SELECT COUNT(DISTINCT r.user_id) FROM poem_reads r JOIN poems p ON p.id = r.poem_id
                    WHERE p.author_id = $1) AS readers,
                (SELECT COUNT(*) FROM poem_likes l JOIN poems p ON p.id = l.poem_id
                    WHERE p.author_id = $1) AS likes,
                (SELECT COUNT(*) FROM poem_saves s JOIN poems p ON p.id = s.poem_id
                    WHERE p.author_id = $1) AS saves,
                (SELECT MAX(created_at) FROM poems WHERE author_id = $1) AS last_published_at
            "#,
        )
        .bind(poet_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("poet_stats"))
    }
}
