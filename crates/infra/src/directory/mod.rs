//! Persistence boundary for the tenant hierarchy.
//!
//! Services never touch storage directly: they run closures against a
//! [`Tables`] unit of work, either read-only or inside one atomic transaction.
//! A relational backend implements [`Directory`] with one database
//! transaction per call and a row lock on the tenants it rewrites.

use std::sync::Arc;

use tripdesk_core::DomainResult;

pub mod in_memory;
pub mod tables;

pub use in_memory::InMemoryDirectory;
pub use tables::{Table, Tables};

pub trait Directory: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> DomainResult<T>) -> DomainResult<T>;

    /// Run `f` atomically: either every write it made is committed, or none.
    fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> DomainResult<T>) -> DomainResult<T>;
}

impl<D: Directory> Directory for Arc<D> {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> DomainResult<T>) -> DomainResult<T> {
        (**self).read(f)
    }

    fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> DomainResult<T>) -> DomainResult<T> {
        (**self).transaction(f)
    }
}
