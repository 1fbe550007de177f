//! `tripdesk-core`: shared building blocks for the tenant hierarchy.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AgencyId, DataSourceId, TeamId, UserId};
pub use value_object::ValueObject;
