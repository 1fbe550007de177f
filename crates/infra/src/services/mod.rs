//! Application services over a [`crate::directory::Directory`].

pub mod credentials;
pub(crate) mod membership;
pub mod requests;
pub mod tenant_graph;

pub use credentials::CredentialService;
pub use tenant_graph::TenantGraph;
