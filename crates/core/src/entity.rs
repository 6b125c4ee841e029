//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Journal entries and requisitions are entities: two rows with identical
/// quantities are still distinct records.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
