//! Configuration loading for the credential lifecycle.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;

use tripdesk_auth::{Argon2Hasher, HashCost};
use tripdesk_auth::reset_token;
use tripdesk_core::DomainResult;

pub const ENV_RESET_TOKEN_TTL_SECS: &str = "TRIPDESK_RESET_TOKEN_TTL_SECS";
pub const ENV_MIN_PASSWORD_LENGTH: &str = "TRIPDESK_MIN_PASSWORD_LENGTH";
pub const ENV_PASSWORD_PEPPER: &str = "TRIPDESK_PASSWORD_PEPPER";
pub const ENV_ARGON2_MEMORY_KIB: &str = "TRIPDESK_ARGON2_MEMORY_KIB";
pub const ENV_ARGON2_ITERATIONS: &str = "TRIPDESK_ARGON2_ITERATIONS";

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub reset_token_ttl: Duration,
    pub min_password_length: usize,
    pub password_pepper: Option<String>,
    pub hash_cost: HashCost,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            reset_token_ttl: reset_token::default_ttl(),
            min_password_length: 6,
            password_pepper: None,
            hash_cost: HashCost::default(),
        }
    }
}

impl core::fmt::Debug for CredentialPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialPolicy")
            .field("reset_token_ttl", &self.reset_token_ttl)
            .field("min_password_length", &self.min_password_length)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "<redacted>"))
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

impl CredentialPolicy {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset keys keep their default; unparsable values are an error naming the key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let ttl_secs: Option<i64> = parse(&lookup, ENV_RESET_TOKEN_TTL_SECS)?;
        let reset_token_ttl = match ttl_secs {
            Some(secs) if secs <= 0 => {
                anyhow::bail!("{ENV_RESET_TOKEN_TTL_SECS} must be positive, got {secs}")
            }
            Some(secs) => Duration::try_seconds(secs)
                .with_context(|| format!("{ENV_RESET_TOKEN_TTL_SECS} is out of range: {secs}"))?,
            None => defaults.reset_token_ttl,
        };

        Ok(Self {
            reset_token_ttl,
            min_password_length: parse(&lookup, ENV_MIN_PASSWORD_LENGTH)?
                .unwrap_or(defaults.min_password_length),
            password_pepper: lookup(ENV_PASSWORD_PEPPER).filter(|p| !p.is_empty()),
            hash_cost: HashCost {
                memory_kib: parse(&lookup, ENV_ARGON2_MEMORY_KIB)?
                    .unwrap_or(defaults.hash_cost.memory_kib),
                iterations: parse(&lookup, ENV_ARGON2_ITERATIONS)?
                    .unwrap_or(defaults.hash_cost.iterations),
            },
        })
    }

    /// The Argon2 hasher configured by this policy.
    pub fn hasher(&self) -> DomainResult<Argon2Hasher> {
        Argon2Hasher::new(self.hash_cost, self.password_pepper.clone())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: {raw:?}")))
        .transpose()
}
