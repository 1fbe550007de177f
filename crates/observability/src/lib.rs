//! Process-wide tracing setup shared by binaries and integration tests.

/// Subscriber installation (filters, formatters).
pub mod tracing;

pub use crate::tracing::{init, init_for_tests};
