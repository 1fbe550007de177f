use serde::{Deserialize, Serialize};

use tripdesk_core::{AgencyId, TeamId, UserId};
use tripdesk_tenancy::{Role, User};

/// The already-authenticated caller of an operation.
///
/// Built by the transport layer from its session; the gate never looks the
/// actor up itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub agency: Option<AgencyId>,
    pub team: Option<TeamId>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role(),
            agency: user.agency(),
            team: user.team(),
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.role.is_superuser()
    }
}
