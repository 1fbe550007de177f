#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tripdesk_auth::{Actor, Argon2Hasher, HashCost};
use tripdesk_core::{AgencyId, TeamId, UserId};
use tripdesk_infra::requests::{NewAgency, NewTeam, NewUser, Registration};
use tripdesk_infra::{
    CredentialPolicy, CredentialService, Directory, InMemoryDirectory, Tables, TenantGraph,
};
use tripdesk_tenancy::{
    AgencyFeatures, ConfigTemplate, PasswordHash, Placement, Profile, Team, User,
};

pub type Graph = TenantGraph<Arc<InMemoryDirectory>, Arc<Argon2Hasher>>;
pub type Credentials = CredentialService<Arc<InMemoryDirectory>, Arc<Argon2Hasher>>;

pub const PASSWORD: &str = "secret1";

/// One shared directory with both services and a seeded superuser.
pub struct World {
    pub directory: Arc<InMemoryDirectory>,
    pub graph: Graph,
    pub credentials: Credentials,
    pub root: Actor,
    pub now: DateTime<Utc>,
}

impl World {
    pub fn new() -> Self {
        tripdesk_observability::init_for_tests();

        let directory = Arc::new(InMemoryDirectory::new());
        let policy = CredentialPolicy {
            hash_cost: HashCost::low(),
            ..CredentialPolicy::default()
        };
        let hasher = Arc::new(policy.hasher().unwrap());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        let root = User::new(
            UserId::new(),
            Profile::new("root@tripdesk.io", Some("root"), "Root", "User", None).unwrap(),
            PasswordHash::new("unused"),
            Placement::superuser(),
            ConfigTemplate::default(),
            now,
        );
        let root_actor = Actor::from_user(&root);
        directory.transaction(|t| t.insert_user(root)).unwrap();

        Self {
            graph: TenantGraph::new(directory.clone(), hasher.clone(), policy.clone()),
            credentials: CredentialService::new(directory.clone(), hasher, policy),
            directory,
            root: root_actor,
            now,
        }
    }

    pub fn snapshot(&self) -> Tables {
        self.directory.snapshot().unwrap()
    }

    pub fn user(&self, id: UserId) -> User {
        self.snapshot().user(id).unwrap().clone()
    }

    pub fn team(&self, id: TeamId) -> Team {
        self.snapshot().team(id).unwrap().clone()
    }

    /// Actor for a user as currently stored.
    pub fn actor(&self, id: UserId) -> Actor {
        Actor::from_user(&self.user(id))
    }

    pub fn agency(&self, name: &str, config: Option<ConfigTemplate>) -> AgencyId {
        self.graph
            .create_agency(&self.root, new_agency(name, config), self.now)
            .unwrap()
            .id
    }

    /// Agent created by the superuser directly under `agency`.
    pub fn agent(&self, email: &str, agency: Option<AgencyId>) -> UserId {
        self.graph
            .create_user(&self.root, new_user(email, None, agency), self.now)
            .unwrap()
            .id
    }

    /// An agency with a freshly created admin; returns both ids.
    pub fn administered_agency(&self, name: &str) -> (AgencyId, UserId) {
        let admin = self.agent(&format!("admin@{}.io", name.to_lowercase()), None);
        let mut request = new_agency(name, None);
        request.admin = Some(admin);
        let agency = self.graph.create_agency(&self.root, request, self.now).unwrap();
        (agency.id, admin)
    }

    pub fn team_with(
        &self,
        agency: AgencyId,
        name: &str,
        admin: Option<UserId>,
        members: &[UserId],
    ) -> TeamId {
        self.graph
            .create_team(
                &self.root,
                NewTeam {
                    name: name.into(),
                    agency,
                    admin,
                    is_booking: true,
                    members: members.to_vec(),
                },
                self.now,
            )
            .unwrap()
            .id
    }

    pub fn register(&self, email: &str) -> UserId {
        self.credentials
            .register(
                Registration {
                    email: email.into(),
                    username: None,
                    first_name: "Reg".into(),
                    last_name: "Istered".into(),
                    phone: None,
                    password: PASSWORD.into(),
                },
                self.now,
            )
            .unwrap()
            .id
    }
}

pub fn new_agency(name: &str, config: Option<ConfigTemplate>) -> NewAgency {
    NewAgency {
        name: name.into(),
        api_username: format!("{}-api", name.to_lowercase()),
        api_password: "provider-pw".into(),
        features: AgencyFeatures::default(),
        is_iframe: false,
        admin: None,
        config,
        data_sources: Vec::new(),
    }
}

pub fn new_user(email: &str, team: Option<TeamId>, agency: Option<AgencyId>) -> NewUser {
    NewUser {
        email: email.into(),
        username: None,
        first_name: "Test".into(),
        last_name: "User".into(),
        phone: None,
        password: PASSWORD.into(),
        is_active: true,
        team,
        agency,
    }
}

/// Ids of users whose stored row differs between two snapshots.
pub fn changed_users(before: &Tables, after: &Tables) -> Vec<UserId> {
    after
        .users
        .iter()
        .filter(|u| before.user(u.id).ok() != Some(*u))
        .map(|u| u.id)
        .collect()
}
