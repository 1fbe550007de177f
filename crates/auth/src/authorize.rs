use serde::Serialize;

use tripdesk_core::{AgencyId, DomainError, DomainResult, TeamId, UserId};
use tripdesk_tenancy::{Agency, Role, Team, User};

use crate::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Agency,
    Team,
    User,
    DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    List,
    Create,
    Update,
    Delete,
    Archive,
    /// Read-only listing of records free to join an explicit parent.
    ListAvailable,
    ViewSettings,
    EditSettings,
}

impl Action {
    fn is_self_service(&self) -> bool {
        matches!(
            self,
            Action::Read | Action::Update | Action::ViewSettings | Action::EditSettings
        )
    }
}

/// A resource together with its owner chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Target {
    pub kind: ResourceKind,
    pub agency: Option<AgencyId>,
    pub team: Option<TeamId>,
    /// Set for `User` targets only.
    pub user: Option<UserId>,
}

impl Target {
    /// A not-yet-existing resource (or a listing) under an explicit parent.
    pub fn scope(kind: ResourceKind, agency: Option<AgencyId>, team: Option<TeamId>) -> Self {
        Self {
            kind,
            agency,
            team,
            user: None,
        }
    }

    pub fn agency(agency: &Agency) -> Self {
        Self::scope(ResourceKind::Agency, Some(agency.id), None)
    }

    pub fn agency_id(id: AgencyId) -> Self {
        Self::scope(ResourceKind::Agency, Some(id), None)
    }

    pub fn team(team: &Team) -> Self {
        Self::scope(ResourceKind::Team, team.agency, Some(team.id))
    }

    pub fn user(user: &User) -> Self {
        Self {
            kind: ResourceKind::User,
            agency: user.agency(),
            team: user.team(),
            user: Some(user.id),
        }
    }
}

/// The rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Superuser,
    ListAvailable,
    SameAgency,
    SameTeam,
    OwnRecord,
    NoMatch,
}

/// Explanation of an authorization decision, for audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub rule: Rule,
    pub reason: String,
}

impl Decision {
    fn allow(rule: Rule, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            rule,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            rule: Rule::NoMatch,
            reason: reason.into(),
        }
    }
}

/// Evaluate the rules in tier order; the first match wins.
///
/// - No IO
/// - No panics
pub fn explain(actor: &Actor, action: Action, target: &Target) -> Decision {
    if actor.is_superuser() {
        return Decision::allow(Rule::Superuser, "superuser may do everything");
    }

    if action == Action::ListAvailable && (target.agency.is_some() || target.team.is_some()) {
        return Decision::allow(
            Rule::ListAvailable,
            "listing available records under an explicit parent is open to every tier",
        );
    }

    let own_record = target.kind == ResourceKind::User
        && target.user == Some(actor.user_id)
        && action.is_self_service();

    match actor.role {
        Role::Superuser => Decision::allow(Rule::Superuser, "superuser may do everything"),
        Role::AgencyAdmin => match actor.agency {
            Some(agency) if target.agency == Some(agency) => {
                Decision::allow(Rule::SameAgency, format!("target belongs to agency {agency}"))
            }
            _ if own_record => Decision::allow(Rule::OwnRecord, "own user record"),
            _ => Decision::deny(format!(
                "agency admin of {:?} cannot {action:?} a {:?} owned by agency {:?}",
                actor.agency, target.kind, target.agency
            )),
        },
        Role::TeamLead { team } => {
            if target.team == Some(team) {
                Decision::allow(Rule::SameTeam, format!("target belongs to team {team}"))
            } else if own_record {
                Decision::allow(Rule::OwnRecord, "own user record")
            } else {
                Decision::deny(format!(
                    "team lead of {team} cannot {action:?} a {:?} owned by team {:?}",
                    target.kind, target.team
                ))
            }
        }
        Role::Agent => {
            if own_record {
                Decision::allow(Rule::OwnRecord, "own user record")
            } else {
                Decision::deny(format!(
                    "agents may only read or update their own record, not {action:?} a {:?}",
                    target.kind
                ))
            }
        }
    }
}

/// Gate an operation, mapping a deny to `PermissionDenied`.
pub fn authorize(actor: &Actor, action: Action, target: &Target) -> DomainResult<()> {
    let decision = explain(actor, action, target);
    if decision.allowed {
        Ok(())
    } else {
        Err(DomainError::permission_denied(decision.reason))
    }
}
