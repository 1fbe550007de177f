//! `tripdesk-tenancy`: the Agency/Team/User hierarchy and its role engine.
//!
//! Pure domain types: no storage and no clock. Time-dependent constructors
//! take `now` from the caller.

pub mod agency;
pub mod config_template;
pub mod data_source;
pub mod role;
pub mod team;
pub mod user;

pub use agency::{Agency, AgencyFeatures, ApiCredentials};
pub use config_template::{ConfigTemplate, ConfigTemplateBuilder, CurrencyCode, DateFormat};
pub use data_source::{DataSource, ProviderCode};
pub use role::{Placement, Role, RoleChange};
pub use team::Team;
pub use user::{Endpoint, PasswordHash, Profile, User};
