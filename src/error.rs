use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// ErrorBody
///
/// The failure envelope every endpoint answers with: `{ "error": "<message>" }`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// AppError
///
/// The single error taxonomy shared by the policy layer, the repository and the handlers.
/// Ownership failures and absent rows both surface as `NotFound`, so callers cannot tell
/// "wrong id" from "not yours".
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Password must be at least 8 characters and contain a lowercase letter, an uppercase letter and a digit.")]
    WeakPassword,

    #[error("Invalid role.")]
    InvalidRole,

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Authentication required.")]
    Unauthorized,

    #[error("Role does not match this account.")]
    RoleMismatch,

    #[error("Forbidden.")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Password hashing failed.")]
    Hashing,

    #[error("Session token could not be issued.")]
    TokenIssue,
}

impl AppError {
    pub fn incomplete() -> Self {
        AppError::Validation("Incomplete data.".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::WeakPassword | AppError::InvalidRole => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RoleMismatch | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Hashing | AppError::TokenIssue => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a unique-constraint violation to `Conflict(message)`, everything else through `From`.
    pub fn conflict_or(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |err| {
            let unique = err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if unique {
                AppError::Conflict(message)
            } else {
                AppError::from(err)
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict("Resource already exists.");
            }
            if db_err.is_foreign_key_violation() {
                return AppError::NotFound("Referenced resource not found.");
            }
        }
        AppError::Storage(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage detail stays in the logs; the client only sees a generic message.
        let message = match &self {
            AppError::Storage(detail) => {
                tracing::error!(error = %detail, "storage failure");
                "Internal server error.".to_string()
            }
            AppError::Hashing => {
                tracing::error!("password hashing failure");
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
