//! Credential lifecycle: registration, login, password reset and change.
//!
//! Reset tokens live on the user row (`password_reset_token`,
//! `password_reset_sent_at`). Issuing overwrites any outstanding token and a
//! successful reset clears both fields, so every token is single-use.

use chrono::{DateTime, Utc};
use tracing::instrument;

use tripdesk_auth::{PasswordHasher, reset_token};
use tripdesk_core::{DomainError, DomainResult, UserId};
use tripdesk_tenancy::user::validate_password;
use tripdesk_tenancy::{ConfigTemplate, Placement, Profile, User};

use crate::config::CredentialPolicy;
use crate::directory::{Directory, Tables};
use crate::services::requests::Registration;

/// Validation codes of the credential forms.
pub mod codes {
    pub const IDENTIFIER: u16 = 10;
    pub const TOKEN: u16 = 10;
    pub const NEW_PASSWORD: u16 = 11;
    pub const CURRENT_PASSWORD: u16 = 10;
}

pub struct CredentialService<D, H> {
    directory: D,
    hasher: H,
    policy: CredentialPolicy,
}

impl<D, H> CredentialService<D, H>
where
    D: Directory,
    H: PasswordHasher,
{
    pub fn new(directory: D, hasher: H, policy: CredentialPolicy) -> Self {
        Self {
            directory,
            hasher,
            policy,
        }
    }

    /// Sign up a teamless, agency-less agent.
    #[instrument(skip_all, fields(email = %request.email), err)]
    pub fn register(&self, request: Registration, now: DateTime<Utc>) -> DomainResult<User> {
        let profile = Profile::new(
            &request.email,
            request.username.as_deref(),
            &request.first_name,
            &request.last_name,
            request.phone.as_deref(),
        )?;
        validate_password(&request.password, self.policy.min_password_length)?;
        let hash = self.hasher.hash(&request.password)?;

        self.directory.transaction(|tables| {
            let user = User::new(
                UserId::new(),
                profile,
                hash,
                Placement::unattached(),
                ConfigTemplate::default(),
                now,
            );
            tables.insert_user(user.clone())?;
            tracing::info!(user_id = %user.id, "user registered");
            Ok(user)
        })
    }

    /// Check a password against the account named by `identifier`.
    ///
    /// Unknown accounts and wrong passwords are indistinguishable
    /// (`InvalidCredentials`); only a correct password reveals that an account
    /// is deactivated.
    #[instrument(skip_all, err)]
    pub fn login(&self, identifier: &str, password: &str) -> DomainResult<User> {
        let identifier = required(identifier, "identifier", codes::IDENTIFIER)?;
        let user = self
            .directory
            .read(|tables| Ok(lookup(tables, identifier).cloned()))?
            .ok_or(DomainError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(DomainError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(DomainError::AccountInactive);
        }
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(user)
    }

    /// Issue a reset token for an active account.
    ///
    /// Returns `None`, and writes nothing, when the identifier is unknown or
    /// the account is deactivated. Callers must answer both outcomes the same
    /// way.
    #[instrument(skip_all, err)]
    pub fn request_reset(&self, identifier: &str, now: DateTime<Utc>) -> DomainResult<Option<String>> {
        let identifier = identifier.trim();
        let token = reset_token::generate();
        let issued = self.directory.transaction(|tables| {
            let Some(user_id) = lookup(tables, identifier).filter(|u| u.is_active).map(|u| u.id)
            else {
                return Ok(None);
            };
            tables
                .users
                .get_mut(user_id)?
                .issue_password_reset(token.clone(), now);
            Ok(Some(user_id))
        })?;

        match issued {
            Some(user_id) => {
                tracing::info!(user_id = %user_id, "password reset token issued");
                Ok(Some(token))
            }
            None => {
                tracing::debug!("reset requested for unknown or inactive account");
                Ok(None)
            }
        }
    }

    /// Existence probe for a token. Expiry is not checked here.
    pub fn confirm_token(&self, token: &str) -> DomainResult<UserId> {
        self.directory.read(|tables| {
            tables
                .user_by_reset_token(token)
                .map(|u| u.id)
                .ok_or(DomainError::TokenInvalid)
        })
    }

    /// Consume a reset token and install `new_password`.
    #[instrument(skip_all, err)]
    pub fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let token = required(token, "token", codes::TOKEN)?;
        new_password_rule(new_password, self.policy.min_password_length)?;
        let hash = self.hasher.hash(new_password)?;

        self.directory.transaction(|tables| {
            let user_id = tables
                .user_by_reset_token(token)
                .map(|u| u.id)
                .ok_or(DomainError::TokenInvalid)?;
            let user = tables.users.get_mut(user_id)?;
            let sent_at = user.password_reset_sent_at().ok_or(DomainError::TokenInvalid)?;
            reset_token::check_fresh(sent_at, now, self.policy.reset_token_ttl)?;
            if !user.is_active {
                return Err(DomainError::AccountInactive);
            }
            user.set_password(hash, now);
            tracing::info!(user_id = %user_id, "password reset consumed");
            Ok(())
        })
    }

    /// Change the password of an authenticated user.
    #[instrument(skip_all, fields(user_id = %user_id), err)]
    pub fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if current_password.is_empty() {
            return Err(DomainError::validation(
                "current_password",
                codes::CURRENT_PASSWORD,
                "Current password is required.",
            ));
        }
        new_password_rule(new_password, self.policy.min_password_length)?;

        let stored = self
            .directory
            .read(|tables| Ok(tables.user(user_id)?.password_hash.clone()))?;
        if !self.hasher.verify(current_password, &stored)? {
            return Err(DomainError::InvalidCredentials);
        }
        let hash = self.hasher.hash(new_password)?;

        self.directory.transaction(|tables| {
            let user = tables.users.get_mut(user_id)?;
            // Another change committed since the check above.
            if user.password_hash != stored {
                return Err(DomainError::InvalidCredentials);
            }
            user.set_password(hash, now);
            tracing::info!("password changed");
            Ok(())
        })
    }
}

/// Email if the identifier contains `@`, username otherwise.
fn lookup<'t>(tables: &'t Tables, identifier: &str) -> Option<&'t User> {
    if identifier.contains('@') {
        tables.user_by_email(identifier)
    } else {
        tables.user_by_username(identifier)
    }
}

fn required<'a>(value: &'a str, field: &'static str, code: u16) -> DomainResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(field, code, format!("{field} is required.")));
    }
    Ok(value)
}

fn new_password_rule(raw: &str, min_len: usize) -> DomainResult<()> {
    validate_password(raw, min_len).map_err(|e| match e {
        DomainError::Validation { message, .. } => {
            DomainError::validation("new_password", codes::NEW_PASSWORD, message)
        }
        other => other,
    })
}
