use serde::Deserialize;

use crate::{error::AppError, models::NewPoem, repository::Repository};

const CURATED_POEMS_JSON: &str = include_str!("../seed/curated_poems.json");

#[derive(Debug, Deserialize)]
struct CuratedPoem {
    title: String,
    content: String,
}

/// Curated poems shipped with the binary. They are inserted without an author.
fn curated_poems() -> Result<Vec<NewPoem>, AppError> {
    let poems: Vec<CuratedPoem> = serde_json::from_str(CURATED_POEMS_JSON)
        .map_err(|e| AppError::Storage(format!("invalid curated poem data: {e}")))?;

    Ok(poems
        .into_iter()
        .map(|p| NewPoem {
            author_id: None,
            gallery_id: None,
            title: p.title,
            content: p.content,
        })
        .collect())
}

/// seed_curated_poems
///
/// Inserts the curated set once: skipped whenever any unowned poem already exists.
/// Returns the number of poems inserted.
pub async fn seed_curated_poems(repo: &dyn Repository) -> Result<usize, AppError> {
    if repo.count_unowned_poems().await? > 0 {
        tracing::debug!("curated poems already present, skipping seed");
        return Ok(0);
    }

    let poems = curated_poems()?;
    let total = poems.len();
    for poem in poems {
        repo.create_poem(poem).await?;
    }

    tracing::info!(count = total, "seeded curated poems");
    Ok(total)
}
