//! `tripdesk-auth`: authorization gate and credential primitives.
//!
//! Decoupled from HTTP and storage: callers resolve the actor and the target's
//! owner chain, this crate only decides.

pub mod actor;
pub mod authorize;
pub mod password;
pub mod reset_token;

pub use actor::Actor;
pub use authorize::{Action, Decision, ResourceKind, Rule, Target, authorize, explain};
pub use password::{Argon2Hasher, HashCost, PasswordHasher};
