use std::collections::BTreeMap;

use tripdesk_core::{AgencyId, DataSourceId, DomainError, DomainResult, Entity, TeamId, UserId};
use tripdesk_tenancy::{Agency, DataSource, Team, User};

/// One entity table keyed by primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<E: Entity> {
    name: &'static str,
    rows: BTreeMap<E::Id, E>,
}

impl<E> Table<E>
where
    E: Entity + Clone,
    E::Id: Ord + Copy + core::fmt::Display,
{
    fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: E::Id) -> DomainResult<&E> {
        self.rows
            .get(&id)
            .ok_or_else(|| DomainError::not_found(self.name, id))
    }

    pub fn get_mut(&mut self, id: E::Id) -> DomainResult<&mut E> {
        let name = self.name;
        self.rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(name, id))
    }

    pub fn contains(&self, id: E::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn insert(&mut self, row: E) -> DomainResult<()> {
        let id = *row.id();
        if self.rows.contains_key(&id) {
            return Err(DomainError::conflict(format!("{} {id} already exists", self.name)));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    pub fn delete(&mut self, id: E::Id) -> DomainResult<E> {
        self.rows
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(self.name, id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    pub fn find(&self, pred: impl Fn(&E) -> bool) -> Option<&E> {
        self.rows.values().find(|row| pred(row))
    }

    /// Ids of all rows matching `pred`, in key order.
    pub fn ids_where(&self, pred: impl Fn(&E) -> bool) -> Vec<E::Id> {
        self.rows
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn filter(&self, pred: impl Fn(&E) -> bool) -> Vec<&E> {
        self.rows.values().filter(|row| pred(row)).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The full relational state a [`super::Directory`] transaction works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub agencies: Table<Agency>,
    pub teams: Table<Team>,
    pub users: Table<User>,
    pub data_sources: Table<DataSource>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            agencies: Table::new("agency"),
            teams: Table::new("team"),
            users: Table::new("user"),
            data_sources: Table::new("data_source"),
        }
    }
}

impl Tables {
    pub fn agency(&self, id: AgencyId) -> DomainResult<&Agency> {
        self.agencies.get(id)
    }

    pub fn team(&self, id: TeamId) -> DomainResult<&Team> {
        self.teams.get(id)
    }

    pub fn user(&self, id: UserId) -> DomainResult<&User> {
        self.users.get(id)
    }

    pub fn data_source(&self, id: DataSourceId) -> DomainResult<&DataSource> {
        self.data_sources.get(id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim().to_ascii_lowercase();
        self.users.find(|u| u.email() == email)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        let username = username.trim();
        self.users.find(|u| u.username() == Some(username))
    }

    pub fn user_by_reset_token(&self, token: &str) -> Option<&User> {
        self.users.find(|u| u.password_reset_token() == Some(token))
    }

    /// Email and username are unique across all users (except `except`).
    pub fn ensure_identity_free(
        &self,
        email: &str,
        username: Option<&str>,
        except: Option<UserId>,
    ) -> DomainResult<()> {
        if let Some(other) = self.user_by_email(email)
            && Some(other.id) != except
        {
            return Err(DomainError::conflict(format!("email {email} is already taken")));
        }
        if let Some(username) = username
            && let Some(other) = self.user_by_username(username)
            && Some(other.id) != except
        {
            return Err(DomainError::conflict(format!(
                "username {username} is already taken"
            )));
        }
        Ok(())
    }

    /// Insert a user after checking identity uniqueness.
    pub fn insert_user(&mut self, user: User) -> DomainResult<()> {
        self.ensure_identity_free(user.email(), user.username(), None)?;
        self.users.insert(user)
    }

    /// Non-lead members of a team.
    pub fn team_member_ids(&self, team: TeamId) -> Vec<UserId> {
        self.users
            .ids_where(|u| u.team() == Some(team) && u.role() == tripdesk_tenancy::Role::Agent)
    }
}
