//! Admin assignment and membership replacement shared by team and agency
//! writes. Everything here runs inside a caller's transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use tripdesk_auth::{Action, Actor, Target, authorize};
use tripdesk_core::{AgencyId, DomainError, DomainResult, TeamId, UserId};
use tripdesk_tenancy::role::{self, RoleChange};
use tripdesk_tenancy::{Role, Team, User, agency, team};

use crate::directory::Tables;

/// Users touched by one transaction, with their rows as they were before it.
///
/// Only users whose row actually differs at the end get a new `updated_at`.
#[derive(Debug, Default)]
pub(crate) struct UserEdits {
    before: BTreeMap<UserId, User>,
}

impl UserEdits {
    pub(crate) fn user_mut<'t>(
        &mut self,
        tables: &'t mut Tables,
        id: UserId,
    ) -> DomainResult<&'t mut User> {
        let user = tables.users.get_mut(id)?;
        self.before.entry(id).or_insert_with(|| user.clone());
        Ok(user)
    }

    /// Stamp changed rows; returns their ids.
    pub(crate) fn finish(self, tables: &mut Tables, now: DateTime<Utc>) -> Vec<UserId> {
        let mut changed = Vec::new();
        for (id, before) in self.before {
            if let Ok(user) = tables.users.get_mut(id)
                && *user != before
            {
                user.touch(now);
                changed.push(id);
            }
        }
        changed
    }
}

fn clear_vacated_team(tables: &mut Tables, change: &RoleChange, keep: Option<TeamId>, now: DateTime<Utc>) {
    let Some(vacated) = change.vacated_team() else {
        return;
    };
    if Some(vacated) == keep {
        return;
    }
    if let Ok(team) = tables.teams.get_mut(vacated)
        && team.admin == Some(change.user)
    {
        team.admin = None;
        team.touch(now);
    }
}

/// A user may be pulled into `team` by `actor` when they are a teamless agent
/// of the team's agency, or when the actor may update them directly.
fn gate_incoming(actor: &Actor, team: &Team, user: &User) -> DomainResult<()> {
    if team.agency.is_some() && user.agency() == team.agency && user.is_available_agent() {
        return Ok(());
    }
    authorize(actor, Action::Update, &Target::user(user))
}

// ─────────────────────────────────────────────────────────────────────────────
// Team tier
// ─────────────────────────────────────────────────────────────────────────────

/// Demote the team's recorded lead, if it still leads this team.
pub(crate) fn release_team_lead(
    tables: &mut Tables,
    edits: &mut UserEdits,
    team_id: TeamId,
    lead: UserId,
) -> DomainResult<()> {
    let user = edits.user_mut(tables, lead)?;
    if user.role() == (Role::TeamLead { team: team_id }) {
        role::demote_from_team_lead(user);
    }
    Ok(())
}

/// Promote `candidate` to lead `team`. The candidate must already belong to
/// the team's agency.
pub(crate) fn assign_team_lead(
    tables: &mut Tables,
    edits: &mut UserEdits,
    actor: &Actor,
    team: &Team,
    candidate: UserId,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let user = edits.user_mut(tables, candidate)?;
    gate_incoming(actor, team, user)?;
    if user.agency() != team.agency {
        return Err(DomainError::validation(
            "admin",
            team::codes::ADMIN,
            format!("user {candidate} does not belong to the team's agency"),
        ));
    }
    let change = role::promote_to_team_lead(user, team)?;
    clear_vacated_team(tables, &change, Some(team.id), now);
    Ok(())
}

/// Full-replace membership: every current member is detached, then exactly
/// `members` are attached. `skip` (the incoming lead) is left to
/// [`assign_team_lead`].
pub(crate) fn replace_members(
    tables: &mut Tables,
    edits: &mut UserEdits,
    actor: &Actor,
    team: &Team,
    members: &[UserId],
    skip: Option<UserId>,
) -> DomainResult<()> {
    for id in tables.team_member_ids(team.id) {
        role::detach_from_team(edits.user_mut(tables, id)?);
    }

    for &id in members {
        if Some(id) == skip {
            continue;
        }
        let user = edits.user_mut(tables, id)?;
        if user.agency().is_some() && user.agency() != team.agency {
            return Err(DomainError::validation(
                "member_ids",
                team::codes::MEMBER,
                format!("user {id} belongs to another agency"),
            ));
        }
        gate_incoming(actor, team, user)?;
        role::attach_to_team(user, team)?;
    }

    tracing::info!(
        team_id = %team.id,
        members = members.len(),
        "team membership replaced"
    );
    Ok(())
}

/// Detach every user from a team that is about to disappear.
pub(crate) fn disband_team(
    tables: &mut Tables,
    edits: &mut UserEdits,
    team_id: TeamId,
) -> DomainResult<()> {
    for id in tables.users.ids_where(|u| u.team() == Some(team_id)) {
        role::detach_from_team(edits.user_mut(tables, id)?);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Agency tier
// ─────────────────────────────────────────────────────────────────────────────

/// Demote the agency's recorded admin, if it still administers this agency.
pub(crate) fn release_agency_admin(
    tables: &mut Tables,
    edits: &mut UserEdits,
    agency_id: AgencyId,
    admin: UserId,
) -> DomainResult<()> {
    let user = edits.user_mut(tables, admin)?;
    if user.role() == Role::AgencyAdmin && user.agency() == Some(agency_id) {
        role::demote_from_agency_admin(user);
    }
    Ok(())
}

/// Promote `candidate` to administer `agency_id`. The candidate must be
/// unattached or already in that agency, and open to updates by `actor`.
pub(crate) fn assign_agency_admin(
    tables: &mut Tables,
    edits: &mut UserEdits,
    actor: &Actor,
    agency_id: AgencyId,
    candidate: UserId,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let user = edits.user_mut(tables, candidate)?;
    if user.agency().is_some_and(|a| a != agency_id) {
        return Err(DomainError::validation(
            "admin",
            agency::codes::ADMIN,
            format!("user {candidate} belongs to another agency"),
        ));
    }
    authorize(actor, Action::Update, &Target::user(user))?;
    let change = role::promote_to_agency_admin(user, agency_id)?;
    clear_vacated_team(tables, &change, None, now);
    Ok(())
}
