//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances holding the same values are
/// interchangeable. Stock quantities are the typical example: a bucket of
/// `100 kg / 10 cones` is equal to any other bucket of `100 kg / 10 cones`.
///
/// The trait requires:
/// - **Clone**: values are copied, not shared
/// - **PartialEq**: comparison is by attribute values
/// - **Debug**: values show up in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
