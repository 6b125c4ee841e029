//! The four quantities tracked for every stock bucket.

use core::ops::Neg;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::ValueObject;

/// Weight and cone counts for one storage tier (or one transaction delta).
///
/// Values are signed: corrective transactions and over-issuing can push a
/// bucket below zero, which is surfaced through status rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockMetrics {
    pub total_weight: Decimal,
    pub tear_weight: Decimal,
    pub net_weight: Decimal,
    pub number_of_cones: Decimal,
}

impl ValueObject for StockMetrics {}

impl StockMetrics {
    pub const ZERO: Self = Self {
        total_weight: Decimal::ZERO,
        tear_weight: Decimal::ZERO,
        net_weight: Decimal::ZERO,
        number_of_cones: Decimal::ZERO,
    };

    pub fn new(
        total_weight: Decimal,
        tear_weight: Decimal,
        net_weight: Decimal,
        number_of_cones: Decimal,
    ) -> Self {
        Self {
            total_weight,
            tear_weight,
            net_weight,
            number_of_cones,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Element-wise sum, `None` if any field leaves the `Decimal` range.
    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        Some(Self {
            total_weight: self.total_weight.checked_add(rhs.total_weight)?,
            tear_weight: self.tear_weight.checked_add(rhs.tear_weight)?,
            net_weight: self.net_weight.checked_add(rhs.net_weight)?,
            number_of_cones: self.number_of_cones.checked_add(rhs.number_of_cones)?,
        })
    }

    /// Element-wise difference, `None` if any field leaves the `Decimal` range.
    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        Some(Self {
            total_weight: self.total_weight.checked_sub(rhs.total_weight)?,
            tear_weight: self.tear_weight.checked_sub(rhs.tear_weight)?,
            net_weight: self.net_weight.checked_sub(rhs.net_weight)?,
            number_of_cones: self.number_of_cones.checked_sub(rhs.number_of_cones)?,
        })
    }
}

impl Neg for StockMetrics {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            total_weight: -self.total_weight,
            tear_weight: -self.tear_weight,
            net_weight: -self.net_weight,
            number_of_cones: -self.number_of_cones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn arithmetic_is_element_wise() {
        let a = StockMetrics::new(dec!(110), dec!(10), dec!(100), dec!(10));
        let b = StockMetrics::new(dec!(11), dec!(1), dec!(10), dec!(1));

        assert_eq!(
            a.checked_add(&b),
            Some(StockMetrics::new(dec!(121), dec!(11), dec!(110), dec!(11)))
        );
        assert_eq!(
            b.checked_sub(&a),
            Some(StockMetrics::new(dec!(-99), dec!(-9), dec!(-90), dec!(-9)))
        );
        assert_eq!(-b, StockMetrics::new(dec!(-11), dec!(-1), dec!(-10), dec!(-1)));
        assert!(a.checked_sub(&a).is_some_and(|m| m.is_zero()));
    }

    #[test]
    fn overflow_in_any_field_yields_none() {
        let cones_only = StockMetrics::new(dec!(0), dec!(0), dec!(0), Decimal::MAX);
        assert_eq!(cones_only.checked_add(&cones_only), None);

        let floor = StockMetrics::new(Decimal::MIN, dec!(0), dec!(0), dec!(0));
        let one = StockMetrics::new(dec!(1), dec!(0), dec!(0), dec!(0));
        assert_eq!(floor.checked_sub(&one), None);
        assert_eq!(floor.checked_add(&one).map(|m| m.total_weight), Some(Decimal::MIN + dec!(1)));
    }
}
