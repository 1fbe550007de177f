//! Agency: the top-level tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DomainError, DomainResult, Entity, UserId};

use crate::config_template::ConfigTemplate;

/// Validation codes for agency fields.
pub mod codes {
    pub const NAME: u16 = 10;
    pub const API_USERNAME: u16 = 11;
    pub const API_PASSWORD: u16 = 12;
    pub const ADMIN: u16 = 13;
    pub const DATA_SOURCES: u16 = 14;
}

/// Booking-provider API credential pair of an agency.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl ApiCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> DomainResult<Self> {
        let username = username.into().trim().to_string();
        let password = password.into();
        if username.is_empty() || username.len() > 40 {
            return Err(DomainError::validation(
                "api_username",
                codes::API_USERNAME,
                "api_username is invalid.",
            ));
        }
        if password.is_empty() || password.len() > 40 {
            return Err(DomainError::validation(
                "api_password",
                codes::API_PASSWORD,
                "api_password is invalid.",
            ));
        }
        Ok(Self { username, password })
    }
}

impl core::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-agency feature switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyFeatures {
    pub branded_fares: bool,
    pub student_and_youth: bool,
    pub travelport_itx: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub api_credentials: ApiCredentials,
    pub features: AgencyFeatures,
    pub is_active: bool,
    /// White-label (embedded) deployment.
    pub is_iframe: bool,
    /// Must reference a user of this agency holding the agency-admin tier.
    pub admin: Option<UserId>,
    /// May be unset until the agency's settings are first edited.
    pub config: Option<ConfigTemplate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agency {
    pub fn new(
        id: AgencyId,
        name: &str,
        api_credentials: ApiCredentials,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate_name(name)?,
            api_credentials,
            features: AgencyFeatures::default(),
            is_active: true,
            is_iframe: false,
            admin: None,
            config: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = validate_name(name)?;
        Ok(())
    }

    /// Mutable template, materialising the default one on first use.
    pub fn config_mut(&mut self) -> &mut ConfigTemplate {
        self.config.get_or_insert_with(ConfigTemplate::default)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Agency {
    type Id = AgencyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(DomainError::validation(
            "agency_name",
            codes::NAME,
            "agency_name is invalid.",
        ));
    }
    Ok(name.to_string())
}
