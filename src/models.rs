use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The two account kinds. Poets author poems and galleries; readers like, save and read them.
/// Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Poet,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Poet => "poet",
            Role::Reader => "reader",
        }
    }
}

/// UserRecord
///
/// Raw row of the `users` table, including the password hash.
/// Never serialized to clients; converted into `User` before leaving the repository boundary.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    // Always stored trimmed and lowercased.
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Strips the password hash. Returns `None` if the stored role is not a known one.
    pub fn to_user(&self) -> Option<User> {
        let role = match self.role.as_str() {
            "poet" => Role::Poet,
            "reader" => Role::Reader,
            _ => return None,
        };
        Some(User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role,
        })
    }
}

/// User
///
/// The public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// NewUser
///
/// A validated registration, ready for insertion. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Gallery
///
/// An owner-scoped, named grouping of poems (`galleries` table).
/// Names are unique per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Gallery {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Poem
///
/// A row of the `poems` table. `author_id` is null for curated seed content and for poems
/// whose author was removed; `gallery_id` is null for ungalleried poems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Poem {
    pub id: Uuid,
    pub author_id: Option<Uuid>,
    pub gallery_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewPoem
///
/// Insert payload for a poem. `author_id: None` is reserved for curated seed content.
#[derive(Debug, Clone)]
pub struct NewPoem {
    pub author_id: Option<Uuid>,
    pub gallery_id: Option<Uuid>,
    pub title: String,
    pub content: String,
}

/// PoemChanges
///
/// Full replacement of the editable poem fields. A `None` gallery unassigns the poem.
#[derive(Debug, Clone)]
pub struct PoemChanges {
    pub title: String,
    pub content: String,
    pub gallery_id: Option<Uuid>,
}

/// InteractionKind
///
/// The three independent (poem, user) join tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Like,
    Save,
    Read,
}

impl InteractionKind {
    pub fn table(&self) -> &'static str {
        match self {
            InteractionKind::Like => "poem_likes",
            InteractionKind::Save => "poem_saves",
            InteractionKind::Read => "poem_reads",
        }
    }
}

/// PoetStats
///
/// Aggregate counters for a poet's profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PoetStats {
    pub poem_count: i64,
    pub reads: i64,
    // Distinct users with at least one read.
    pub readers: i64,
    pub likes: i64,
    pub saves: i64,
    pub last_published_at: Option<DateTime<Utc>>,
}

// --- Request Payloads (Input Schemas) ---
//
// Every field is optional so that a missing value becomes a policy rejection
// ("Incomplete data.") rather than a deserialization failure.

/// RegisterRequest
///
/// Input payload for POST /api/register.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[schema(example = "poet")]
    pub role: Option<String>,
}

/// LoginRequest
///
/// Input payload for POST /api/login. When `role` is given it must match the stored role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// GalleryRequest
///
/// Input payload for creating or renaming a gallery.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GalleryRequest {
    pub name: Option<String>,
}

/// PoemRequest
///
/// Input payload for creating or replacing a poem.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoemRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_id: Option<Uuid>,
}

// --- Response Envelopes (Output Schemas) ---

/// AuthResponse
///
/// Returned by register and login: the account plus a bearer token for later requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PoemEnvelope {
    pub poem: Poem,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PoemList {
    pub poems: Vec<Poem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GalleryEnvelope {
    pub gallery: Gallery,
}

/// GallerySummary
///
/// A visible gallery as listed, with the number of poems it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GallerySummary {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub poem_count: i64,
}

/// GalleryList
///
/// Listing response. Reserved galleries are never present in `galleries`; their poems are
/// counted in `unassigned_poem_count` together with poems that have no gallery at all.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GalleryList {
    pub galleries: Vec<GallerySummary>,
    pub unassigned_poem_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OkResponse {
    pub ok: bool,
}

/// InteractionResponse
///
/// Returned by like/save/read. `ignored` is present (and true) only when the write was
/// skipped because the user authored the poem.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct InteractionResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
}

/// PoemInteractions
///
/// Interaction state of one user over a page of poems, restricted to the requested ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PoemInteractions {
    pub liked: Vec<Uuid>,
    pub saved: Vec<Uuid>,
    pub read: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PoetStatsEnvelope {
    pub stats: PoetStats,
}
