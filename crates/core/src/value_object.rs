//! Value objects: compared by value, owned by value.

/// Marker for types without identity.
///
/// Owners hold them by value; handing one to a child tenant means cloning it,
/// so a later edit on the parent never shows up on the child.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
