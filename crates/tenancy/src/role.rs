//! Role engine.
//!
//! A user holds exactly one [`Role`]. Every promotion, demotion and
//! attach/detach of the agency/team pointers goes through the functions in
//! this module so the following stay true after each transition:
//!
//! - `TeamLead { team }` implies the user's team pointer is `Some(team)`.
//! - `AgencyAdmin` implies an agency pointer and no team pointer.
//! - A team pointer implies the user's agency equals that team's agency.
//!
//! Transitions do not check that the target team/agency still exists; callers
//! resolve references first and surface `NotFound` themselves.

use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, DomainError, DomainResult, TeamId, UserId};

use crate::team::{self, Team};
use crate::user::User;

/// Role tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum Role {
    Superuser,
    AgencyAdmin,
    TeamLead { team: TeamId },
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superuser => "superuser",
            Role::AgencyAdmin => "agency_admin",
            Role::TeamLead { .. } => "team_lead",
            Role::Agent => "agent",
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, Role::Superuser)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a user sits in the hierarchy: tier plus agency/team pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    role: Role,
    agency: Option<AgencyId>,
    team: Option<TeamId>,
}

impl Placement {
    /// Agent with no agency and no team (self-registration).
    pub fn unattached() -> Self {
        Self {
            role: Role::Agent,
            agency: None,
            team: None,
        }
    }

    /// Platform operator. Only used to bootstrap the first account.
    pub fn superuser() -> Self {
        Self {
            role: Role::Superuser,
            agency: None,
            team: None,
        }
    }

    pub(crate) fn from_parts(role: Role, agency: Option<AgencyId>, team: Option<TeamId>) -> Self {
        Self { role, agency, team }
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

    /// Whether the tier agrees with the pointers.
    pub fn is_consistent(&self) -> bool {
        match self.role {
            Role::TeamLead { team } => self.team == Some(team),
            Role::AgencyAdmin => self.agency.is_some() && self.team.is_none(),
            Role::Superuser | Role::Agent => true,
        }
    }
}

/// Before/after record of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    pub user: UserId,
    pub from: Placement,
    pub to: Placement,
}

impl RoleChange {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// The team this user led before the transition, if it was given up.
    pub fn vacated_team(&self) -> Option<TeamId> {
        match (self.from.role, self.to.role) {
            (Role::TeamLead { team: old }, Role::TeamLead { team: new }) if old == new => None,
            (Role::TeamLead { team }, _) => Some(team),
            _ => None,
        }
    }

    /// The agency this user administered before the transition, if it was given up.
    pub fn vacated_agency(&self) -> Option<AgencyId> {
        match (self.from.role, self.to.role) {
            (Role::AgencyAdmin, Role::AgencyAdmin) if self.from.agency == self.to.agency => None,
            (Role::AgencyAdmin, _) => self.from.agency,
            _ => None,
        }
    }
}

fn apply(user: &mut User, to: Placement) -> RoleChange {
    let from = user.placement();
    user.role = to.role;
    user.agency = to.agency;
    user.team = to.team;
    let change = RoleChange {
        user: user.id,
        from,
        to,
    };
    if change.changed() {
        tracing::info!(
            user_id = %user.id,
            from = %from.role,
            to = %to.role,
            agency = ?to.agency,
            team = ?to.team,
            "role transition"
        );
    }
    change
}

fn reject_superuser(user: &User, field: &'static str, code: u16) -> DomainResult<()> {
    if user.role.is_superuser() {
        return Err(DomainError::validation(
            field,
            code,
            format!("user {} is a superuser and cannot change tier", user.id),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Team tier
// ─────────────────────────────────────────────────────────────────────────────

/// Make `user` the lead of `team`. The user's agency follows the team's.
///
/// A superuser or agency admin cannot be made a team lead.
pub fn promote_to_team_lead(user: &mut User, team: &Team) -> DomainResult<RoleChange> {
    reject_superuser(user, "admin", team::codes::ADMIN)?;
    if user.role == Role::AgencyAdmin {
        return Err(DomainError::validation(
            "admin",
            team::codes::ADMIN,
            format!("user {} is an agency admin", user.id),
        ));
    }
    Ok(apply(
        user,
        Placement::from_parts(Role::TeamLead { team: team.id }, team.agency, Some(team.id)),
    ))
}

/// Team lead back to agent, detached from the team. Agency is kept.
///
/// No-op for users that are not team leads.
pub fn demote_from_team_lead(user: &mut User) -> RoleChange {
    match user.role {
        Role::TeamLead { .. } => apply(user, Placement::from_parts(Role::Agent, user.agency, None)),
        _ => apply(user, user.placement()),
    }
}

/// Attach an agent to `team` as a member.
pub fn attach_to_team(user: &mut User, team: &Team) -> DomainResult<RoleChange> {
    if user.role != Role::Agent {
        return Err(DomainError::validation(
            "member_ids",
            team::codes::MEMBER,
            format!("user {} is a {} and cannot be a team member", user.id, user.role),
        ));
    }
    Ok(apply(
        user,
        Placement::from_parts(Role::Agent, team.agency, Some(team.id)),
    ))
}

/// Clear the user's team pointer, demoting a lead to agent.
pub fn detach_from_team(user: &mut User) -> RoleChange {
    match user.role {
        Role::TeamLead { .. } => demote_from_team_lead(user),
        role => apply(user, Placement::from_parts(role, user.agency, None)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agency tier
// ─────────────────────────────────────────────────────────────────────────────

/// Make `user` the admin of `agency`. Any team pointer is cleared.
pub fn promote_to_agency_admin(user: &mut User, agency: AgencyId) -> DomainResult<RoleChange> {
    reject_superuser(user, "admin", team::codes::ADMIN)?;
    Ok(apply(
        user,
        Placement::from_parts(Role::AgencyAdmin, Some(agency), None),
    ))
}

/// Agency admin back to agent with no agency. No-op for other tiers.
pub fn demote_from_agency_admin(user: &mut User) -> RoleChange {
    match user.role {
        Role::AgencyAdmin => apply(user, Placement::unattached()),
        _ => apply(user, user.placement()),
    }
}

/// Clear the user's agency pointer after the agency row is removed.
///
/// The user's team, if any, is orphaned by the same operation, so the team
/// pointer is kept (both agencies are now `None`).
pub fn detach_from_agency(user: &mut User) -> RoleChange {
    match user.role {
        Role::AgencyAdmin => demote_from_agency_admin(user),
        role => apply(user, Placement::from_parts(role, None, user.team)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// New users
// ─────────────────────────────────────────────────────────────────────────────

/// Placement of a user created by an actor holding `creator_role` in
/// `creator_agency`.
///
/// With an explicit `team` the user joins it as a member. Otherwise the user
/// inherits the creator's agency (and team, when created by a team lead); a
/// superuser may name the agency directly.
pub fn place_new_user(
    creator_role: Role,
    creator_agency: Option<AgencyId>,
    team: Option<&Team>,
    agency: Option<AgencyId>,
) -> DomainResult<Placement> {
    if creator_role == Role::Agent {
        return Err(DomainError::permission_denied("agents cannot create users"));
    }
    if let Some(team) = team {
        return Ok(Placement::from_parts(Role::Agent, team.agency, Some(team.id)));
    }
    Ok(match creator_role {
        Role::Superuser => Placement::from_parts(Role::Agent, agency, None),
        Role::TeamLead { team } => Placement::from_parts(Role::Agent, creator_agency, Some(team)),
        Role::AgencyAdmin | Role::Agent => Placement::from_parts(Role::Agent, creator_agency, None),
    })
}
