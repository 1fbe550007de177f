//! Tenant graph service: CRUD over agencies, teams, users and data sources.
//!
//! Every mutation is gated by the authorization gate, then runs as a single
//! directory transaction, so a failure at any step (unknown member id,
//! conflicting slot, ...) leaves the previous state untouched.

use chrono::{DateTime, Utc};
use tracing::instrument;

use tripdesk_auth::{Action, Actor, PasswordHasher, ResourceKind, Target, authorize};
use tripdesk_core::{AgencyId, DataSourceId, DomainError, DomainResult, TeamId, UserId};
use tripdesk_tenancy::role;
use tripdesk_tenancy::user::{validate_email, validate_password};
use tripdesk_tenancy::{
    Agency, ApiCredentials, ConfigTemplate, DataSource, PasswordHash, Placement, Profile,
    ProviderCode, Role, Team, User, agency, team,
};

use crate::config::CredentialPolicy;
use crate::directory::{Directory, Tables};
use crate::provider::{self, BookingContext};
use crate::services::membership::{self, UserEdits};
use crate::services::requests::{
    AgencyDetail, AgencySummary, AgencyUpdate, BasicInfo, BulkUsers, DataSourceBinding,
    DataSourceSummary, GeneralInfo, NewAgency, NewDataSource, NewTeam, NewUser, TeamDetail,
    TeamSummary, TeamUpdate, Tenant, UserDetail, UserSummary, UserUpdate,
};

pub struct TenantGraph<D, H> {
    directory: D,
    hasher: H,
    policy: CredentialPolicy,
}

impl<D, H> TenantGraph<D, H>
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

    // ─────────────────────────────────────────────────────────────────────────
    // Agencies
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip_all, fields(actor = %actor.user_id, name = %request.name), err)]
    pub fn create_agency(
        &self,
        actor: &Actor,
        request: NewAgency,
        now: DateTime<Utc>,
    ) -> DomainResult<Agency> {
        authorize(actor, Action::Create, &Target::scope(ResourceKind::Agency, None, None))?;
        let credentials = ApiCredentials::new(request.api_username, request.api_password)?;
        let mut agency = Agency::new(AgencyId::new(), &request.name, credentials, now)?;
        agency.features = request.features;
        agency.is_iframe = request.is_iframe;
        agency.config = request.config;

        self.directory.transaction(|tables| {
            let mut edits = UserEdits::default();
            bind_data_sources(tables, agency.id, &request.data_sources, now)?;
            if let Some(candidate) = request.admin {
                membership::assign_agency_admin(
                    tables, &mut edits, actor, agency.id, candidate, now,
                )?;
                agency.admin = Some(candidate);
            }
            edits.finish(tables, now);
            tables.agencies.insert(agency.clone())?;
            tracing::info!(agency_id = %agency.id, "agency created");
            Ok(agency)
        })
    }

    /// Replace an agency's details and admin. Rebinding its data sources is
    /// reserved to superusers.
    #[instrument(skip_all, fields(actor = %actor.user_id, agency_id = %agency_id), err)]
    pub fn update_agency(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
        request: AgencyUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Agency> {
        authorize(actor, Action::Update, &Target::agency_id(agency_id))?;
        if request.data_sources.is_some() && !actor.is_superuser() {
            return Err(DomainError::permission_denied(
                "only a superuser may reassign data sources",
            ));
        }
        let credentials = ApiCredentials::new(request.api_username, request.api_password)?;

        self.directory.transaction(|tables| {
            let mut agency = tables.agency(agency_id)?.clone();
            agency.rename(&request.name)?;
            agency.api_credentials = credentials;
            agency.features = request.features;
            agency.is_iframe = request.is_iframe;

            let mut edits = UserEdits::default();
            if agency.admin != request.admin {
                if let Some(prior) = agency.admin {
                    membership::release_agency_admin(tables, &mut edits, agency_id, prior)?;
                }
                if let Some(candidate) = request.admin {
                    membership::assign_agency_admin(
                        tables, &mut edits, actor, agency_id, candidate, now,
                    )?;
                }
                agency.admin = request.admin;
            }

            if let Some(bindings) = &request.data_sources {
                for id in tables.data_sources.ids_where(|ds| ds.agency == Some(agency_id)) {
                    let ds = tables.data_sources.get_mut(id)?;
                    ds.agency = None;
                    ds.touch(now);
                }
                bind_data_sources(tables, agency_id, bindings, now)?;
            }

            edits.finish(tables, now);
            agency.touch(now);
            *tables.agencies.get_mut(agency_id)? = agency.clone();
            Ok(agency)
        })
    }

    /// Deactivate an agency together with its users and teams.
    #[instrument(skip_all, fields(actor = %actor.user_id, agency_id = %agency_id), err)]
    pub fn archive_agency(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        authorize(actor, Action::Archive, &Target::agency_id(agency_id))?;
        self.directory.transaction(|tables| {
            let agency = tables.agencies.get_mut(agency_id)?;
            agency.is_active = false;
            agency.touch(now);

            let users = tables.users.ids_where(|u| u.agency() == Some(agency_id) && u.is_active);
            for &id in &users {
                let user = tables.users.get_mut(id)?;
                user.is_active = false;
                user.touch(now);
            }
            let teams = tables.teams.ids_where(|t| t.agency == Some(agency_id) && t.is_active);
            for &id in &teams {
                let team = tables.teams.get_mut(id)?;
                team.is_active = false;
                team.touch(now);
            }
            tracing::info!(
                users = users.len(),
                teams = teams.len(),
                "agency archived with cascade"
            );
            Ok(())
        })
    }

    /// Reactivate an agency. Its users and teams stay as they are.
    #[instrument(skip_all, fields(actor = %actor.user_id, agency_id = %agency_id), err)]
    pub fn reactivate_agency(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        authorize(actor, Action::Archive, &Target::agency_id(agency_id))?;
        self.directory.transaction(|tables| {
            let agency = tables.agencies.get_mut(agency_id)?;
            if !agency.is_active {
                agency.is_active = true;
                agency.touch(now);
            }
            Ok(())
        })
    }

    /// Hard delete. Teams are orphaned, users detached (the admin demoted) and
    /// data sources returned to the pool.
    #[instrument(skip_all, fields(actor = %actor.user_id, agency_id = %agency_id), err)]
    pub fn delete_agency(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        authorize(actor, Action::Delete, &Target::agency_id(agency_id))?;
        self.directory.transaction(|tables| {
            tables.agencies.delete(agency_id)?;

            for id in tables.teams.ids_where(|t| t.agency == Some(agency_id)) {
                let team = tables.teams.get_mut(id)?;
                team.agency = None;
                team.touch(now);
            }
            let mut edits = UserEdits::default();
            for id in tables.users.ids_where(|u| u.agency() == Some(agency_id)) {
                role::detach_from_agency(edits.user_mut(tables, id)?);
            }
            edits.finish(tables, now);
            for id in tables.data_sources.ids_where(|ds| ds.agency == Some(agency_id)) {
                let ds = tables.data_sources.get_mut(id)?;
                ds.agency = None;
                ds.touch(now);
            }
            tracing::info!("agency deleted");
            Ok(())
        })
    }

    #[instrument(skip_all, fields(actor = %actor.user_id), err)]
    pub fn list_agencies(
        &self,
        actor: &Actor,
        keyword: Option<&str>,
    ) -> DomainResult<Vec<AgencySummary>> {
        authorize(actor, Action::List, &Target::scope(ResourceKind::Agency, None, None))?;
        let needle = keyword.map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty());
        self.directory.read(|tables| {
            let mut rows: Vec<AgencySummary> = tables
                .agencies
                .filter(|a| matches_keyword(&a.name, needle.as_deref()))
                .into_iter()
                .map(AgencySummary::from)
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(rows)
        })
    }

    /// An agency with its bound slots. Provider credentials stay out except
    /// the API username.
    pub fn agency_detail(&self, actor: &Actor, agency_id: AgencyId) -> DomainResult<AgencyDetail> {
        authorize(actor, Action::Read, &Target::agency_id(agency_id))?;
        self.directory.read(|tables| {
            let agency = tables.agency(agency_id)?;
            Ok(AgencyDetail {
                agency: AgencySummary::from(agency),
                api_username: agency.api_credentials.username.clone(),
                users: tables.users.filter(|u| u.agency() == Some(agency_id)).len(),
                data_sources: tables
                    .data_sources
                    .filter(|ds| ds.agency == Some(agency_id))
                    .into_iter()
                    .map(DataSourceSummary::from)
                    .collect(),
            })
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Data sources
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an unbound slot to the shared pool.
    #[instrument(skip_all, fields(actor = %actor.user_id), err)]
    pub fn create_data_source(
        &self,
        actor: &Actor,
        request: NewDataSource,
        now: DateTime<Utc>,
    ) -> DomainResult<DataSource> {
        authorize(actor, Action::Create, &Target::scope(ResourceKind::DataSource, None, None))?;
        let provider = request.provider.parse::<ProviderCode>()?;
        let source = DataSource::new(DataSourceId::new(), &request.name, &request.pcc, provider, now)?;
        self.directory.transaction(|tables| {
            tables.data_sources.insert(source.clone())?;
            Ok(source)
        })
    }

    /// Slots not bound to any agency.
    pub fn unbound_data_sources(&self, actor: &Actor) -> DomainResult<Vec<DataSourceSummary>> {
        authorize(actor, Action::List, &Target::scope(ResourceKind::DataSource, None, None))?;
        self.directory.read(|tables| {
            Ok(tables
                .data_sources
                .filter(|ds| ds.agency.is_none())
                .into_iter()
                .map(DataSourceSummary::from)
                .collect())
        })
    }

    /// Slots an agency may use: its own plus the unbound pool.
    pub fn available_data_sources(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
    ) -> DomainResult<Vec<DataSourceSummary>> {
        authorize(
            actor,
            Action::List,
            &Target::scope(ResourceKind::DataSource, Some(agency_id), None),
        )?;
        self.directory.read(|tables| {
            tables.agency(agency_id)?;
            Ok(tables
                .data_sources
                .filter(|ds| ds.agency.is_none() || ds.agency == Some(agency_id))
                .into_iter()
                .map(DataSourceSummary::from)
                .collect())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teams
    // ─────────────────────────────────────────────────────────────────────────

    /// New team under an agency, with a snapshot of the agency's template.
    #[instrument(
        skip_all,
        fields(actor = %actor.user_id, agency_id = %request.agency, members = request.members.len()),
        err
    )]
    pub fn create_team(
        &self,
        actor: &Actor,
        request: NewTeam,
        now: DateTime<Utc>,
    ) -> DomainResult<Team> {
        authorize(
            actor,
            Action::Create,
            &Target::scope(ResourceKind::Team, Some(request.agency), None),
        )?;

        self.directory.transaction(|tables| {
            let agency = tables.agency(request.agency)?;
            let mut team = Team::new(
                TeamId::new(),
                &request.name,
                agency.id,
                agency.config.as_ref(),
                request.is_booking,
                now,
            )?;
            tables.teams.insert(team.clone())?;

            let mut edits = UserEdits::default();
            membership::replace_members(
                tables,
                &mut edits,
                actor,
                &team,
                &request.members,
                request.admin,
            )?;
            if let Some(candidate) = request.admin {
                membership::assign_team_lead(
                    tables, &mut edits, actor, &team, candidate, now,
                )?;
                team.admin = Some(candidate);
            }
            edits.finish(tables, now);
            *tables.teams.get_mut(team.id)? = team.clone();
            tracing::info!(team_id = %team.id, "team created");
            Ok(team)
        })
    }

    /// Replace a team's name, lead and full membership.
    ///
    /// The prior lead is demoted and detached before the new lead (if any) is
    /// promoted; members not listed become teamless agents.
    #[instrument(
        skip_all,
        fields(actor = %actor.user_id, team_id = %team_id, members = request.members.len()),
        err
    )]
    pub fn update_team(
        &self,
        actor: &Actor,
        team_id: TeamId,
        request: TeamUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Team> {
        self.directory.transaction(|tables| {
            let mut team = tables.team(team_id)?.clone();
            authorize(actor, Action::Update, &Target::team(&team))?;
            team.rename(&request.name)?;
            team.is_booking = request.is_booking;

            let mut edits = UserEdits::default();
            if let Some(prior) = team.admin.take() {
                membership::release_team_lead(tables, &mut edits, team_id, prior)?;
            }
            membership::replace_members(
                tables,
                &mut edits,
                actor,
                &team,
                &request.members,
                request.admin,
            )?;
            if let Some(candidate) = request.admin {
                membership::assign_team_lead(
                    tables, &mut edits, actor, &team, candidate, now,
                )?;
                team.admin = Some(candidate);
            }
            let changed = edits.finish(tables, now);
            team.touch(now);
            *tables.teams.get_mut(team_id)? = team.clone();
            tracing::info!(users_changed = changed.len(), "team updated");
            Ok(team)
        })
    }

    /// Deactivate a team. Its users are left as they are.
    #[instrument(skip_all, fields(actor = %actor.user_id, team_id = %team_id), err)]
    pub fn archive_team(&self, actor: &Actor, team_id: TeamId, now: DateTime<Utc>) -> DomainResult<()> {
        self.set_team_active(actor, team_id, false, now)
    }

    #[instrument(skip_all, fields(actor = %actor.user_id, team_id = %team_id), err)]
    pub fn reactivate_team(
        &self,
        actor: &Actor,
        team_id: TeamId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.set_team_active(actor, team_id, true, now)
    }

    fn set_team_active(
        &self,
        actor: &Actor,
        team_id: TeamId,
        active: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.directory.transaction(|tables| {
            let team = tables.teams.get_mut(team_id)?;
            authorize(actor, Action::Archive, &Target::team(team))?;
            if team.is_active != active {
                team.is_active = active;
                team.touch(now);
            }
            Ok(())
        })
    }

    /// Hard delete. Members are detached and the lead demoted.
    #[instrument(skip_all, fields(actor = %actor.user_id, team_id = %team_id), err)]
    pub fn delete_team(&self, actor: &Actor, team_id: TeamId, now: DateTime<Utc>) -> DomainResult<()> {
        self.directory.transaction(|tables| {
            authorize(actor, Action::Delete, &Target::team(tables.team(team_id)?))?;
            let mut edits = UserEdits::default();
            membership::disband_team(tables, &mut edits, team_id)?;
            edits.finish(tables, now);
            tables.teams.delete(team_id)?;
            tracing::info!("team deleted");
            Ok(())
        })
    }

    pub fn team_detail(&self, actor: &Actor, team_id: TeamId) -> DomainResult<TeamDetail> {
        self.directory.read(|tables| {
            let team = tables.team(team_id)?;
            authorize(actor, Action::Read, &Target::team(team))?;
            Ok(TeamDetail {
                id: team.id,
                name: team.name.clone(),
                agency: team.agency,
                is_active: team.is_active,
                is_booking: team.is_booking,
                admin: team.admin,
                members: tables.team_member_ids(team.id),
            })
        })
    }

    /// Teams visible to the actor, optionally filtered by a name keyword.
    ///
    /// Superusers may scope to any agency (or none); everyone else sees their
    /// own agency, and team leads only their own team.
    pub fn list_teams(
        &self,
        actor: &Actor,
        agency_id: Option<AgencyId>,
        keyword: Option<&str>,
    ) -> DomainResult<Vec<TeamSummary>> {
        let (scope_agency, scope_team) = match actor.role {
            Role::Superuser => (agency_id, None),
            Role::TeamLead { team } => (actor.agency, Some(team)),
            Role::AgencyAdmin | Role::Agent => (actor.agency, None),
        };
        if !actor.is_superuser() {
            authorize(
                actor,
                Action::List,
                &Target::scope(ResourceKind::Team, scope_agency, scope_team),
            )?;
        }
        let needle = keyword.map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty());
        self.directory.read(|tables| {
            let mut rows: Vec<TeamSummary> = tables
                .teams
                .filter(|t| {
                    scope_agency.is_none_or(|a| t.agency == Some(a))
                        && scope_team.is_none_or(|id| t.id == id)
                        && matches_keyword(&t.name, needle.as_deref())
                })
                .into_iter()
                .map(TeamSummary::from)
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(rows)
        })
    }

    /// Non-lead members of a team.
    pub fn list_team_members(&self, actor: &Actor, team_id: TeamId) -> DomainResult<Vec<UserSummary>> {
        self.directory.read(|tables| {
            let team = tables.team(team_id)?;
            authorize(
                actor,
                Action::List,
                &Target::scope(ResourceKind::User, team.agency, Some(team.id)),
            )?;
            let ids = tables.team_member_ids(team_id);
            ids.into_iter()
                .map(|id| tables.user(id).map(UserSummary::from))
                .collect()
        })
    }

    /// Active, teamless agents of an agency: candidates for a team.
    pub fn list_available_agents(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
    ) -> DomainResult<Vec<UserSummary>> {
        authorize(
            actor,
            Action::ListAvailable,
            &Target::scope(ResourceKind::User, Some(agency_id), None),
        )?;
        self.directory.read(|tables| {
            tables.agency(agency_id)?;
            Ok(tables
                .users
                .filter(|u| u.agency() == Some(agency_id) && u.is_available_agent() && u.is_active)
                .into_iter()
                .map(UserSummary::from)
                .collect())
        })
    }

    /// Candidates for the admin seat of an agency: its active agents, plus
    /// unattached users when the actor is a superuser.
    pub fn list_available_admins(
        &self,
        actor: &Actor,
        agency_id: AgencyId,
    ) -> DomainResult<Vec<UserSummary>> {
        authorize(
            actor,
            Action::ListAvailable,
            &Target::scope(ResourceKind::User, Some(agency_id), None),
        )?;
        let with_unattached = actor.is_superuser();
        self.directory.read(|tables| {
            tables.agency(agency_id)?;
            let mut rows: Vec<UserSummary> = tables
                .users
                .filter(|u| {
                    u.is_active
                        && u.role() == Role::Agent
                        && (u.agency() == Some(agency_id)
                            || (with_unattached && u.placement() == Placement::unattached()))
                })
                .into_iter()
                .map(UserSummary::from)
                .collect();
            rows.sort_by(|a, b| a.email.cmp(&b.email));
            Ok(rows)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Create one user in the actor's scope.
    #[instrument(skip_all, fields(actor = %actor.user_id), err)]
    pub fn create_user(
        &self,
        actor: &Actor,
        request: NewUser,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
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
            let placement = self.place(tables, actor, request.team, request.agency)?;
            let user = new_user(tables, profile, hash, placement, request.is_active, now)?;
            tracing::info!(user_id = %user.id, role = %user.role(), "user created");
            Ok(user)
        })
    }

    /// Create users for a list of emails with one password and active flag.
    /// Any bad or duplicate address aborts the whole batch.
    #[instrument(skip_all, fields(actor = %actor.user_id, count = request.emails.len()), err)]
    pub fn bulk_create_users(
        &self,
        actor: &Actor,
        request: BulkUsers,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<User>> {
        validate_password(&request.password, self.policy.min_password_length)?;
        let mut prepared = Vec::with_capacity(request.emails.len());
        for email in &request.emails {
            prepared.push((Profile::from_email(email)?, self.hasher.hash(&request.password)?));
        }

        self.directory.transaction(|tables| {
            let placement = self.place(tables, actor, request.team, request.agency)?;
            prepared
                .into_iter()
                .map(|(profile, hash)| {
                    new_user(tables, profile, hash, placement, request.is_active, now)
                })
                .collect()
        })
    }

    /// Edit profile fields, the active flag and, for agents, the team.
    #[instrument(skip_all, fields(actor = %actor.user_id, user_id = %user_id), err)]
    pub fn update_user(
        &self,
        actor: &Actor,
        user_id: UserId,
        request: UserUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        self.directory.transaction(|tables| {
            let current = tables.user(user_id)?;
            authorize(actor, Action::Update, &Target::user(current))?;
            if actor.user_id == user_id && request.is_active != current.is_active {
                return Err(DomainError::permission_denied("users cannot change their own active flag"));
            }
            let profile = Profile::new(
                &request.email,
                current.username(),
                &request.first_name,
                &request.last_name,
                request.phone.as_deref(),
            )?;
            tables.ensure_identity_free(&profile.email, profile.username.as_deref(), Some(user_id))?;

            let target_team = match request.team {
                Some(team_id) if current.team() != Some(team_id) => {
                    let team = tables.team(team_id)?.clone();
                    authorize(actor, Action::Update, &Target::team(&team))?;
                    if current.agency().is_some_and(|a| team.agency != Some(a)) {
                        return Err(DomainError::validation(
                            "team",
                            team::codes::MEMBER,
                            "team belongs to another agency",
                        ));
                    }
                    Some(team)
                }
                _ => None,
            };

            let mut edits = UserEdits::default();
            let user = edits.user_mut(tables, user_id)?;
            user.profile = profile;
            user.is_active = request.is_active;
            if let Some(team) = &target_team {
                role::attach_to_team(user, team)?;
            }
            edits.finish(tables, now);
            Ok(tables.user(user_id)?.clone())
        })
    }

    /// Flip a user's active flag; returns the new value.
    #[instrument(skip_all, fields(actor = %actor.user_id, user_id = %user_id), err)]
    pub fn toggle_user_active(
        &self,
        actor: &Actor,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        if actor.user_id == user_id {
            return Err(DomainError::permission_denied("users cannot deactivate themselves"));
        }
        self.directory.transaction(|tables| {
            let user = tables.users.get_mut(user_id)?;
            authorize(actor, Action::Archive, &Target::user(user))?;
            user.is_active = !user.is_active;
            user.touch(now);
            Ok(user.is_active)
        })
    }

    /// Full settings on the user's own record, the public summary otherwise.
    pub fn user_detail(&self, actor: &Actor, user_id: UserId) -> DomainResult<UserDetail> {
        self.directory.read(|tables| {
            let user = tables.user(user_id)?;
            authorize(actor, Action::Read, &Target::user(user))?;
            Ok(UserDetail {
                user: UserSummary::from(user),
                settings: (actor.user_id == user_id).then(|| BasicInfo::from(user)),
            })
        })
    }

    /// Users visible to the actor, matched on email, username or name.
    ///
    /// Scoped like [`Self::list_teams`]; agents may not list users.
    pub fn list_users(&self, actor: &Actor, keyword: Option<&str>) -> DomainResult<Vec<UserSummary>> {
        let (scope_agency, scope_team) = match actor.role {
            Role::Superuser => (None, None),
            Role::TeamLead { team } => (actor.agency, Some(team)),
            Role::AgencyAdmin | Role::Agent => (actor.agency, None),
        };
        authorize(
            actor,
            Action::List,
            &Target::scope(ResourceKind::User, scope_agency, scope_team),
        )?;
        let needle = keyword.map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty());
        self.directory.read(|tables| {
            let mut rows: Vec<UserSummary> = tables
                .users
                .filter(|u| {
                    scope_agency.is_none_or(|a| u.agency() == Some(a))
                        && scope_team.is_none_or(|t| u.team() == Some(t))
                        && [
                            u.email(),
                            u.username().unwrap_or_default(),
                            u.profile.first_name.as_str(),
                            u.profile.last_name.as_str(),
                        ]
                        .iter()
                        .any(|field| matches_keyword(field, needle.as_deref()))
                })
                .into_iter()
                .map(UserSummary::from)
                .collect();
            rows.sort_by(|a, b| a.email.cmp(&b.email));
            Ok(rows)
        })
    }

    /// Whether `email` is free for a new user. Open to anyone who may create
    /// users.
    pub fn email_available(&self, actor: &Actor, email: &str) -> DomainResult<bool> {
        authorize(
            actor,
            Action::Create,
            &Target::scope(ResourceKind::User, actor.agency, actor.team),
        )?;
        let email = validate_email(email)?;
        self.directory.read(|tables| Ok(tables.user_by_email(&email).is_none()))
    }

    pub fn basic_info(&self, actor: &Actor, user_id: UserId) -> DomainResult<BasicInfo> {
        self.directory.read(|tables| {
            let user = tables.user(user_id)?;
            authorize(actor, Action::ViewSettings, &Target::user(user))?;
            Ok(BasicInfo::from(user))
        })
    }

    /// Name and display settings of a team or agency. An agency without its
    /// own template reports the defaults.
    pub fn general_info(&self, actor: &Actor, tenant: Tenant) -> DomainResult<GeneralInfo> {
        self.directory.read(|tables| match tenant {
            Tenant::Team(id) => {
                let team = tables.team(id)?;
                authorize(actor, Action::ViewSettings, &Target::team(team))?;
                Ok(GeneralInfo::new(&team.name, &team.config))
            }
            Tenant::Agency(id) => {
                let agency = tables.agency(id)?;
                authorize(actor, Action::ViewSettings, &Target::agency(agency))?;
                let config = agency.config.clone().unwrap_or_default();
                Ok(GeneralInfo::new(&agency.name, &config))
            }
        })
    }

    /// Self-service profile and display settings.
    #[instrument(skip_all, fields(actor = %actor.user_id, user_id = %user_id), err)]
    pub fn update_basic_info(
        &self,
        actor: &Actor,
        user_id: UserId,
        request: BasicInfo,
        now: DateTime<Utc>,
    ) -> DomainResult<User> {
        self.directory.transaction(|tables| {
            let user = tables.user(user_id)?;
            authorize(actor, Action::EditSettings, &Target::user(user))?;
            let profile = Profile::new(
                &request.email,
                user.username(),
                &request.first_name,
                &request.last_name,
                request.phone.as_deref(),
            )?;
            tables.ensure_identity_free(&profile.email, profile.username.as_deref(), Some(user_id))?;

            let user = tables.users.get_mut(user_id)?;
            user.config.set_display(&request.currency, &request.date_format)?;
            user.profile = profile;
            user.touch(now);
            Ok(user.clone())
        })
    }

    /// Team/agency name and display settings.
    #[instrument(skip_all, fields(actor = %actor.user_id, tenant = ?tenant), err)]
    pub fn update_general_info(
        &self,
        actor: &Actor,
        tenant: Tenant,
        request: GeneralInfo,
        now: DateTime<Utc>,
    ) -> DomainResult<ConfigTemplate> {
        self.directory.transaction(|tables| match tenant {
            Tenant::Team(id) => {
                let team = tables.teams.get_mut(id)?;
                authorize(actor, Action::EditSettings, &Target::team(team))?;
                team.rename(&request.name)?;
                team.config.set_display(&request.currency, &request.date_format)?;
                team.touch(now);
                Ok(team.config.clone())
            }
            Tenant::Agency(id) => {
                let agency = tables.agencies.get_mut(id)?;
                authorize(actor, Action::EditSettings, &Target::agency(agency))?;
                agency.rename(&request.name)?;
                agency
                    .config_mut()
                    .set_display(&request.currency, &request.date_format)?;
                agency.touch(now);
                Ok(agency.config_mut().clone())
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Booking provider
    // ─────────────────────────────────────────────────────────────────────────

    /// Credentials and search defaults the booking proxy needs for `user_id`.
    pub fn booking_context(&self, user_id: UserId) -> DomainResult<BookingContext> {
        self.directory.read(|tables| provider::resolve(tables, user_id))
    }

    // ─────────────────────────────────────────────────────────────────────────

    /// Where a user created by `actor` lands, gated on that scope.
    fn place(
        &self,
        tables: &Tables,
        actor: &Actor,
        team: Option<TeamId>,
        agency_id: Option<AgencyId>,
    ) -> DomainResult<Placement> {
        let team = team.map(|id| tables.team(id)).transpose()?;
        if let Some(id) = agency_id {
            tables.agency(id)?;
        }
        let placement = role::place_new_user(actor.role, actor.agency, team, agency_id)?;
        authorize(
            actor,
            Action::Create,
            &Target::scope(ResourceKind::User, placement.agency(), placement.team()),
        )?;
        Ok(placement)
    }
}

fn new_user(
    tables: &mut Tables,
    profile: Profile,
    hash: PasswordHash,
    placement: Placement,
    is_active: bool,
    now: DateTime<Utc>,
) -> DomainResult<User> {
    let config = parent_config(tables, &placement);
    let mut user = User::new(UserId::new(), profile, hash, placement, config, now);
    user.is_active = is_active;
    tables.insert_user(user.clone())?;
    Ok(user)
}

/// Snapshot of the nearest template above a new user: team, then agency.
fn parent_config(tables: &Tables, placement: &Placement) -> ConfigTemplate {
    if let Some(team) = placement.team().and_then(|id| tables.team(id).ok()) {
        return team.config.fork();
    }
    let agency = placement.agency().and_then(|id| tables.agency(id).ok());
    ConfigTemplate::fork_or_default(agency.and_then(|a| a.config.as_ref()))
}

fn bind_data_sources(
    tables: &mut Tables,
    agency_id: AgencyId,
    bindings: &[DataSourceBinding],
    now: DateTime<Utc>,
) -> DomainResult<()> {
    for binding in bindings {
        let ds = tables.data_sources.get_mut(binding.id)?;
        if let Some(owner) = ds.agency
            && owner != agency_id
        {
            return Err(DomainError::conflict(format!(
                "data source {} is bound to agency {owner}",
                binding.id
            )));
        }
        ds.agency = Some(agency_id);
        if let Some(pcc) = &binding.pcc {
            ds.set_pcc(pcc).map_err(|_| {
                DomainError::validation(
                    "data_sources",
                    agency::codes::DATA_SOURCES,
                    format!("pcc of data source {} is invalid", binding.id),
                )
            })?;
        }
        ds.touch(now);
    }
    Ok(())
}

fn matches_keyword(name: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|n| name.to_lowercase().contains(n))
}

