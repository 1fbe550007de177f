//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure the tenant graph, role engine, credential service or
/// authorization gate can produce. None of these are retried; the transport
/// layer maps them to a response using [`DomainError::kind`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field is missing or malformed.
    ///
    /// `code` is stable per field so clients can key their messages on it.
    #[error("validation failed on '{field}' ({code}): {message}")]
    Validation {
        field: &'static str,
        code: u16,
        message: String,
    },

    /// A referenced Agency/Team/User/DataSource does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("token is invalid")]
    TokenInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("account is inactive")]
    AccountInactive,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// The authorization gate denied the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A uniqueness or ownership conflict (duplicate email, rebinding an owned slot).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence or crypto failure that is not a domain outcome.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(field: &'static str, code: u16, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            code,
            message: msg.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable snake_case identifier of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "validation_error",
            DomainError::NotFound { .. } => "not_found",
            DomainError::TokenInvalid => "token_invalid",
            DomainError::TokenExpired => "token_expired",
            DomainError::AccountInactive => "account_inactive",
            DomainError::InvalidCredentials => "invalid_credentials",
            DomainError::PermissionDenied(_) => "permission_denied",
            DomainError::Conflict(_) => "conflict",
            DomainError::Internal(_) => "internal",
        }
    }

    /// Numeric code of a validation failure, if this is one.
    pub fn validation_code(&self) -> Option<u16> {
        match self {
            DomainError::Validation { code, .. } => Some(*code),
            _ => None,
        }
    }
}
