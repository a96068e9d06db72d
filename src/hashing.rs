use async_trait::async_trait;
use std::sync::Arc;

use crate::error::AppError;

/// Work factor used for every stored password.
pub const BCRYPT_COST: u32 = 10;

// 1. PasswordHasher Contract
/// PasswordHasher
///
/// The one-way hashing collaborator. Registration hashes the raw password before it is
/// persisted; login compares a candidate against the stored hash. Swappable so that tests
/// do not pay the bcrypt cost.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, AppError>;

    /// Returns `Ok(false)` on a mismatch; `Err` only when the comparison itself fails.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError>;
}

// 2. The Real Implementation
/// BcryptHasher
///
/// bcrypt with a fixed cost. Hashing is CPU-bound, so it runs on the blocking pool
/// instead of stalling the async workers.
#[derive(Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self { cost: BCRYPT_COST }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| AppError::Hashing)?
            .map_err(|e| {
                tracing::error!("bcrypt hash error: {:?}", e);
                AppError::Hashing
            })
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|_| AppError::Hashing)?
            .map_err(|e| {
                tracing::error!("bcrypt verify error: {:?}", e);
                AppError::Hashing
            })
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockHasher
///
/// Deterministic, reversible stand-in used by the test suites. Not for production use.
#[derive(Clone, Default)]
pub struct MockHasher;

impl MockHasher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PasswordHasher for MockHasher {
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        Ok(format!("mock${}", password))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        Ok(hash.strip_prefix("mock$") == Some(password))
    }
}

/// HasherState
///
/// The concrete type used to share the hashing collaborator across the application state.
pub type HasherState = Arc<dyn PasswordHasher>;
