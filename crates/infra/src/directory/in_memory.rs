use std::sync::RwLock;

use tripdesk_core::{DomainError, DomainResult};

use super::{Directory, Tables};

/// In-memory directory for tests/dev.
///
/// A transaction holds the write lock for its whole duration and works on a
/// copy of the tables, which replaces the live state only when the closure
/// returns `Ok`. Transactions are therefore serialized and all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    tables: RwLock<Tables>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DomainResult<Tables> {
        self.read(|tables| Ok(tables.clone()))
    }
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::internal("directory lock poisoned")
}

impl Directory for InMemoryDirectory {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> DomainResult<T>) -> DomainResult<T> {
        let tables = self.tables.read().map_err(poisoned)?;
        f(&tables)
    }

    fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> DomainResult<T>) -> DomainResult<T> {
        let mut live = self.tables.write().map_err(poisoned)?;
        let mut draft = live.clone();
        let out = f(&mut draft)?;
        *live = draft;
        Ok(out)
    }
}
