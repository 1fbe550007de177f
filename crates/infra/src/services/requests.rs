//! Plain-data payloads accepted by the services.
//!
//! The transport layer deserializes these from its own wire format; nothing
//! here is validated until it reaches a service.

use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DataSourceId, TeamId, UserId};
use tripdesk_tenancy::{Agency, AgencyFeatures, ConfigTemplate, DataSource, Team, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub agency: AgencyId,
    pub admin: Option<UserId>,
    pub is_booking: bool,
    #[serde(default)]
    pub members: Vec<UserId>,
}

/// Full replacement of a team's name, lead and membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamUpdate {
    pub name: String,
    pub admin: Option<UserId>,
    pub is_booking: bool,
    /// Complete target membership; anyone not listed leaves the team.
    #[serde(default)]
    pub members: Vec<UserId>,
}

/// Bind a pooled slot to an agency, optionally overriding its city code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceBinding {
    pub id: DataSourceId,
    pub pcc: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub api_username: String,
    pub api_password: String,
    #[serde(default)]
    pub features: AgencyFeatures,
    #[serde(default)]
    pub is_iframe: bool,
    pub admin: Option<UserId>,
    pub config: Option<ConfigTemplate>,
    #[serde(default)]
    pub data_sources: Vec<DataSourceBinding>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyUpdate {
    pub name: String,
    pub api_username: String,
    pub api_password: String,
    #[serde(default)]
    pub features: AgencyFeatures,
    #[serde(default)]
    pub is_iframe: bool,
    pub admin: Option<UserId>,
    /// `None` leaves the agency's slots alone; `Some` replaces them (superuser only).
    pub data_sources: Option<Vec<DataSourceBinding>>,
}

macro_rules! redacted_debug {
    ($t:ident { $($field:ident),* }) => {
        impl core::fmt::Debug for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct(stringify!($t))
                    $(.field(stringify!($field), &self.$field))*
                    .field("api_password", &"<redacted>")
                    .finish()
            }
        }
    };
}

redacted_debug!(NewAgency { name, api_username, features, is_iframe, admin, config, data_sources });
redacted_debug!(AgencyUpdate { name, api_username, features, is_iframe, admin, data_sources });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataSource {
    #[serde(default)]
    pub name: String,
    pub pcc: String,
    pub provider: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password: String,
    #[serde(default = "active")]
    pub is_active: bool,
    pub team: Option<TeamId>,
    /// Honoured for superusers only; other creators place users in their own agency.
    pub agency: Option<AgencyId>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("is_active", &self.is_active)
            .field("team", &self.team)
            .field("agency", &self.agency)
            .finish_non_exhaustive()
    }
}

/// Self-service sign-up.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub password: String,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Same password and active flag for every address in the batch.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUsers {
    pub emails: Vec<String>,
    pub password: String,
    #[serde(default = "active")]
    pub is_active: bool,
    pub team: Option<TeamId>,
    pub agency: Option<AgencyId>,
}

impl core::fmt::Debug for BulkUsers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BulkUsers")
            .field("emails", &self.emails.len())
            .field("is_active", &self.is_active)
            .field("team", &self.team)
            .field("agency", &self.agency)
            .finish_non_exhaustive()
    }
}

fn active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    /// Move an agent-tier user to another team.
    pub team: Option<TeamId>,
}

/// Self-service "basic info" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub currency: String,
    pub date_format: String,
}

/// Team/Agency "general info" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralInfo {
    pub name: String,
    pub currency: String,
    pub date_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Tenant {
    Agency(AgencyId),
    Team(TeamId),
}

// ─────────────────────────────────────────────────────────────────────────────
// Read models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamDetail {
    pub id: TeamId,
    pub name: String,
    pub agency: Option<AgencyId>,
    pub is_active: bool,
    pub is_booking: bool,
    pub admin: Option<UserId>,
    pub members: Vec<UserId>,
}

/// Public view of a user (no credential material).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: tripdesk_tenancy::Role,
    pub agency: Option<AgencyId>,
    pub team: Option<TeamId>,
    pub is_active: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email().to_string(),
            username: user.username().map(str::to_string),
            first_name: user.profile.first_name.clone(),
            last_name: user.profile.last_name.clone(),
            role: user.role(),
            agency: user.agency(),
            team: user.team(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub id: TeamId,
    pub name: String,
    pub agency: Option<AgencyId>,
    pub is_active: bool,
    pub is_booking: bool,
    pub admin: Option<UserId>,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            agency: team.agency,
            is_active: team.is_active,
            is_booking: team.is_booking,
            admin: team.admin,
        }
    }
}

/// Agency row without its provider credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencySummary {
    pub id: AgencyId,
    pub name: String,
    pub features: AgencyFeatures,
    pub is_active: bool,
    pub is_iframe: bool,
    pub admin: Option<UserId>,
}

impl From<&Agency> for AgencySummary {
    fn from(agency: &Agency) -> Self {
        Self {
            id: agency.id,
            name: agency.name.clone(),
            features: agency.features,
            is_active: agency.is_active,
            is_iframe: agency.is_iframe,
            admin: agency.admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceSummary {
    pub id: DataSourceId,
    pub name: String,
    pub pcc: String,
    pub provider: String,
    pub active: bool,
    pub agency: Option<AgencyId>,
}

impl From<&DataSource> for DataSourceSummary {
    fn from(source: &DataSource) -> Self {
        Self {
            id: source.id,
            name: source.name.clone(),
            pcc: source.pcc.clone(),
            provider: source.provider.to_string(),
            active: source.active,
            agency: source.agency,
        }
    }
}

/// Agency row with the slots bound to it and its head count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyDetail {
    #[serde(flatten)]
    pub agency: AgencySummary,
    pub api_username: String,
    pub users: usize,
    pub data_sources: Vec<DataSourceSummary>,
}

/// A user as seen by `actor`. Settings are only filled in on the user's own
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserSummary,
    pub settings: Option<BasicInfo>,
}

impl From<&User> for BasicInfo {
    fn from(user: &User) -> Self {
        Self {
            email: user.email().to_string(),
            first_name: user.profile.first_name.clone(),
            last_name: user.profile.last_name.clone(),
            phone: user.profile.phone.clone(),
            currency: user.config.currency.as_str().to_string(),
            date_format: user.config.date_format.as_str().to_string(),
        }
    }
}

impl GeneralInfo {
    pub(crate) fn new(name: &str, config: &ConfigTemplate) -> Self {
        Self {
            name: name.to_string(),
            currency: config.currency.as_str().to_string(),
            date_format: config.date_format.as_str().to_string(),
        }
    }
}
