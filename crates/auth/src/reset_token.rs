//! Password-reset token primitives.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tripdesk_core::{DomainError, DomainResult};

/// Default lifetime of an issued token.
pub fn default_ttl() -> Duration {
    Duration::minutes(10)
}

/// A fresh token: 122 random bits from the OS generator.
pub fn generate() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Fails with `TokenExpired` once more than `ttl` has elapsed since issuance.
/// A token presented exactly at `sent_at + ttl` is still valid.
pub fn check_fresh(sent_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> DomainResult<()> {
    if now - sent_at > ttl {
        return Err(DomainError::TokenExpired);
    }
    Ok(())
}
