//! Visibility Filter.
//!
//! A gallery named "general" (any case, surrounding whitespace ignored) is a legacy default
//! bucket. It is left out of every listing and its poems are shown under the synthetic
//! "no gallery" view, but it stays addressable by id for normal CRUD.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Gallery, GalleryList, GallerySummary, Poem},
};

pub const RESERVED_GALLERY_NAME: &str = "general";

/// Query value selecting the synthetic "no gallery" view.
pub const UNASSIGNED_FILTER: &str = "none";

pub fn is_hidden_gallery_name(name: &str) -> bool {
    name.trim().to_lowercase() == RESERVED_GALLERY_NAME
}

/// Splits galleries into `(visible, hidden)`, preserving order.
pub fn partition_galleries(galleries: Vec<Gallery>) -> (Vec<Gallery>, Vec<Gallery>) {
    galleries
        .into_iter()
        .partition(|g| !is_hidden_gallery_name(&g.name))
}

pub fn hidden_gallery_ids(galleries: &[Gallery]) -> HashSet<Uuid> {
    galleries
        .iter()
        .filter(|g| is_hidden_gallery_name(&g.name))
        .map(|g| g.id)
        .collect()
}

/// A poem with no gallery, or whose gallery is hidden, belongs to the "no gallery" view.
pub fn is_unassigned(poem: &Poem, hidden_ids: &HashSet<Uuid>) -> bool {
    match poem.gallery_id {
        None => true,
        Some(id) => hidden_ids.contains(&id),
    }
}

/// GalleryFilter
///
/// How a poem listing is narrowed by gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryFilter {
    All,
    Unassigned,
    /// A specific gallery, hidden or not.
    Gallery(Uuid),
}

impl GalleryFilter {
    /// Parses the `gallery` query value: absent/blank, `none`, or a gallery id.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(GalleryFilter::All),
            Some(value) if value.eq_ignore_ascii_case(UNASSIGNED_FILTER) => {
                Ok(GalleryFilter::Unassigned)
            }
            Some(value) => Uuid::parse_str(value)
                .map(GalleryFilter::Gallery)
                .map_err(|_| AppError::Validation("Invalid gallery filter.".to_string())),
        }
    }
}

pub fn filter_poems(
    poems: Vec<Poem>,
    filter: GalleryFilter,
    hidden_ids: &HashSet<Uuid>,
) -> Vec<Poem> {
    match filter {
        GalleryFilter::All => poems,
        GalleryFilter::Unassigned => poems
            .into_iter()
            .filter(|p| is_unassigned(p, hidden_ids))
            .collect(),
        GalleryFilter::Gallery(id) => poems
            .into_iter()
            .filter(|p| p.gallery_id == Some(id))
            .collect(),
    }
}

/// Builds the listing: visible galleries with their poem counts, plus the size of the
/// "no gallery" view.
pub fn gallery_listing(galleries: Vec<Gallery>, poems: &[Poem]) -> GalleryList {
    let hidden_ids = hidden_gallery_ids(&galleries);
    let (visible, _hidden) = partition_galleries(galleries);

    let mut counts: HashMap<Uuid, i64> = HashMap::new();
    let mut unassigned_poem_count = 0;
    for poem in poems {
        if is_unassigned(poem, &hidden_ids) {
            unassigned_poem_count += 1;
        } else if let Some(id) = poem.gallery_id {
            *counts.entry(id).or_default() += 1;
        }
    }

    let galleries = visible
        .into_iter()
        .map(|g| GallerySummary {
            poem_count: counts.get(&g.id).copied().unwrap_or(0),
            id: g.id,
            author_id: g.author_id,
            name: g.name,
            created_at: g.created_at,
        })
        .collect();

    GalleryList {
        galleries,
        unassigned_poem_count,
    }
}
