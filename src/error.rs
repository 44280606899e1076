use crate::publish::Validation;
use rusqlite::{ffi, ErrorCode};
use thiserror::Error;

/// Failure kinds for every core operation. Expected rejections are values of
/// this type; only `Store` represents an unexpected fault.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Semantically invalid input. `problems` lists every rule that failed
    /// when more than one check ran.
    #[error("{message}")]
    BadRequest {
        message: String,
        problems: Vec<String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot publish test until validation passes")]
    ValidationFailure(Validation),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            problems: Vec::new(),
        }
    }

    pub fn invalid_content(problems: Vec<String>) -> Self {
        Self::BadRequest {
            message: "Question content is invalid.".to_string(),
            problems,
        }
    }

    /// Wire code for the IPC envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest { .. } => "bad_params",
            Self::Conflict(_) => "conflict",
            Self::ValidationFailure(_) => "validation_failed",
            Self::Store(_) => "db_query_failed",
        }
    }
}

/// True only for UNIQUE and PRIMARY KEY collisions; foreign key, NOT NULL
/// and CHECK failures are ordinary store errors.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && (f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
