//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Plain CRUD records (categories, users, notifications) implement this; records
/// with a command/event lifecycle implement [`crate::AggregateRoot`] instead.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
