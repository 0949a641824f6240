use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Classified failures crossing the public boundary.
///
/// Every public operation returns a `Result` carrying one of these variants
/// instead of a bare boolean, so callers can tell an authorization refusal
/// from a missing row from a store failure. `Connectivity` wraps the driver
/// error unchanged, so the engine's native code and message stay available
/// for diagnosis.
#[derive(Debug, ThisError)]
pub enum RolodexError {
    #[error("validation error: {reason}")]
    Validation { reason: String },

    #[error("{op}: {reason}")]
    Authorization {
        op: &'static str,
        reason: &'static str,
    },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid credentials")]
    Credential,

    #[error("already exists: {what}")]
    AlreadyExists { what: String },

    #[error("database error: {0}")]
    Connectivity(#[from] SqlxError),

    #[error("database already initialised")]
    AlreadyInitialized,
}

impl RolodexError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }
}
