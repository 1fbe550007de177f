//! User: a human actor placed somewhere in the Agency/Team hierarchy.
//!
//! The role tier and the agency/team pointers are only writable through the
//! role engine ([`crate::role`]), which keeps them consistent with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DomainError, DomainResult, Entity, TeamId, UserId};

use crate::config_template::ConfigTemplate;
use crate::role::{Placement, Role};

/// Validation codes for user profile fields.
pub mod codes {
    pub const EMAIL: u16 = 11;
    pub const USERNAME: u16 = 12;
    pub const USERNAME_LENGTH: u16 = 13;
    pub const FIRST_NAME: u16 = 14;
    pub const LAST_NAME: u16 = 15;
    pub const PASSWORD: u16 = 16;
    pub const PHONE: u16 = 17;
}

pub const MAX_USERNAME_LEN: usize = 40;

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Output of the password hashing primitive (PHC string).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Outstanding password-reset token. Absence means "no outstanding reset".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub sent_at: DateTime<Utc>,
}

impl core::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordReset")
            .field("token", &"<redacted>")
            .field("sent_at", &self.sent_at)
            .finish()
    }
}

/// Booking backend environment a user's requests are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    #[default]
    Prod,
    Preprod,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Validated identity fields of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl Profile {
    pub fn new(
        email: &str,
        username: Option<&str>,
        first_name: &str,
        last_name: &str,
        phone: Option<&str>,
    ) -> DomainResult<Self> {
        Ok(Self {
            email: validate_email(email)?,
            username: username
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(validate_username)
                .transpose()?,
            first_name: validate_name(first_name, "first_name", codes::FIRST_NAME)?,
            last_name: validate_name(last_name, "last_name", codes::LAST_NAME)?,
            phone: phone
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(validate_phone)
                .transpose()?,
        })
    }

    /// Profile of a bulk-created user, known only by email.
    pub fn from_email(email: &str) -> DomainResult<Self> {
        Ok(Self {
            email: validate_email(email)?,
            username: None,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
        })
    }
}

pub fn validate_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 254 {
        return Err(DomainError::validation(
            "email",
            codes::EMAIL,
            "Email is invalid or already taken.",
        ));
    }
    Ok(email)
}

pub fn validate_username(raw: &str) -> DomainResult<String> {
    let username = raw.trim();
    if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "username",
            codes::USERNAME,
            "Username must be alphanumeric.",
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            codes::USERNAME_LENGTH,
            format!("Username must be at most {MAX_USERNAME_LEN} characters."),
        ));
    }
    Ok(username.to_string())
}

/// Password acceptance rule applied before hashing.
pub fn validate_password(raw: &str, min_len: usize) -> DomainResult<()> {
    if raw.chars().count() < min_len {
        return Err(DomainError::validation(
            "password",
            codes::PASSWORD,
            format!("Password must be at least {min_len} characters."),
        ));
    }
    Ok(())
}

fn validate_name(raw: &str, field: &'static str, code: u16) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(DomainError::validation(field, code, format!("{field} is invalid.")));
    }
    Ok(name.to_string())
}

fn validate_phone(raw: &str) -> DomainResult<String> {
    let ok = raw.len() <= 20
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if !ok {
        return Err(DomainError::validation("phone", codes::PHONE, "phone is invalid."));
    }
    Ok(raw.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub profile: Profile,
    pub password_hash: PasswordHash,
    pub is_active: bool,
    pub search_endpoint: Endpoint,
    pub booking_endpoint: Endpoint,
    pub config: ConfigTemplate,
    pub(crate) role: Role,
    pub(crate) agency: Option<AgencyId>,
    pub(crate) team: Option<TeamId>,
    password_reset: Option<PasswordReset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        profile: Profile,
        password_hash: PasswordHash,
        placement: Placement,
        config: ConfigTemplate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            profile,
            password_hash,
            is_active: true,
            search_endpoint: Endpoint::default(),
            booking_endpoint: Endpoint::default(),
            config,
            role: placement.role(),
            agency: placement.agency(),
            team: placement.team(),
            password_reset: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn email(&self) -> &str {
        &self.profile.email
    }

    pub fn username(&self) -> Option<&str> {
        self.profile.username.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn agency(&self) -> Option<AgencyId> {
        self.agency
    }

    pub fn team(&self) -> Option<TeamId> {
        self.team
    }

    pub fn placement(&self) -> Placement {
        Placement::from_parts(self.role, self.agency, self.team)
    }

    /// Agent tier with no team: free to be added to one.
    pub fn is_available_agent(&self) -> bool {
        self.role == Role::Agent && self.team.is_none()
    }

    pub fn password_reset_token(&self) -> Option<&str> {
        self.password_reset.as_ref().map(|r| r.token.as_str())
    }

    pub fn password_reset_sent_at(&self) -> Option<DateTime<Utc>> {
        self.password_reset.as_ref().map(|r| r.sent_at)
    }

    /// Store a fresh reset token, replacing any outstanding one.
    pub fn issue_password_reset(&mut self, token: String, now: DateTime<Utc>) {
        self.password_reset = Some(PasswordReset { token, sent_at: now });
        self.updated_at = now;
    }

    /// Install a new password hash and consume any outstanding reset token.
    pub fn set_password(&mut self, hash: PasswordHash, now: DateTime<Utc>) {
        self.password_hash = hash;
        self.password_reset = None;
        self.updated_at = now;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
