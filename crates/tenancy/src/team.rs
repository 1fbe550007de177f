//! Team: mid-level tenant owned by one agency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DomainError, DomainResult, Entity, TeamId, UserId};

use crate::config_template::ConfigTemplate;

/// Validation codes for team fields.
pub mod codes {
    pub const NAME: u16 = 10;
    pub const ADMIN: u16 = 11;
    pub const MEMBER: u16 = 12;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// `None` once the owning agency has been deleted (orphaned team).
    pub agency: Option<AgencyId>,
    pub is_active: bool,
    pub is_booking: bool,
    /// The team lead. Must hold the team-lead tier for this team.
    pub admin: Option<UserId>,
    pub config: ConfigTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// A new team under `agency`, with a snapshot of the agency's template.
    pub fn new(
        id: TeamId,
        name: &str,
        agency: AgencyId,
        agency_config: Option<&ConfigTemplate>,
        is_booking: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: validate_name(name)?,
            agency: Some(agency),
            is_active: true,
            is_booking,
            admin: None,
            config: ConfigTemplate::fork_or_default(agency_config),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = validate_name(name)?;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Team {
    type Id = TeamId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(DomainError::validation(
            "team_name",
            codes::NAME,
            "team_name is invalid.",
        ));
    }
    Ok(name.to_string())
}
