//! Password hashing using Argon2id.
//!
//! The services only see the [`PasswordHasher`] trait; the concrete primitive
//! is picked at wiring time.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};

use tripdesk_core::{DomainError, DomainResult};
use tripdesk_tenancy::PasswordHash;

/// One-way password function.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> DomainResult<PasswordHash>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    fn verify(&self, password: &str, hash: &PasswordHash) -> DomainResult<bool>;
}

impl<H: PasswordHasher + ?Sized> PasswordHasher for Arc<H> {
    fn hash(&self, password: &str) -> DomainResult<PasswordHash> {
        (**self).hash(password)
    }

    fn verify(&self, password: &str, hash: &PasswordHash) -> DomainResult<bool> {
        (**self).verify(password, hash)
    }
}

/// Argon2 memory/time cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl HashCost {
    /// Cheapest parameters argon2 accepts. Tests only.
    pub fn low() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
        }
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
        }
    }
}

#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    pepper: Option<String>,
}

impl Argon2Hasher {
    /// `pepper`, if any, is prepended to every password before hashing and
    /// verification.
    pub fn new(cost: HashCost, pepper: Option<String>) -> DomainResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
            .map_err(|e| DomainError::internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params, pepper })
    }

    fn peppered(&self, password: &str) -> String {
        match &self.pepper {
            Some(p) => format!("{p}{password}"),
            None => password.to_string(),
        }
    }
}

impl core::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> DomainResult<PasswordHash> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let phc = argon2
            .hash_password(self.peppered(password).as_bytes(), &salt)
            .map_err(|e| DomainError::internal(format!("hash error: {e}")))?;
        Ok(PasswordHash::new(phc.to_string()))
    }

    fn verify(&self, password: &str, hash: &PasswordHash) -> DomainResult<bool> {
        let parsed = argon2::PasswordHash::new(hash.as_str()).map_err(|e| {
            tracing::warn!(error = %e, "stored password hash is malformed");
            DomainError::internal(format!("invalid hash format: {e}"))
        })?;

        // Cost parameters are read back from the PHC string.
        match Argon2::default().verify_password(self.peppered(password).as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DomainError::internal(format!("verify error: {e}"))),
        }
    }
}
