//! Infrastructure layer: persistence boundary, services, config.

pub mod config;
pub mod directory;
pub mod provider;
pub mod services;

pub use config::CredentialPolicy;
pub use directory::{Directory, InMemoryDirectory, Tables};
pub use provider::{BookingContext, SourceCredential};
pub use services::requests;
pub use services::{CredentialService, TenantGraph};
