//! Fixed-point money, percentage and quantity types.
//!
//! Amounts are stored as integer minor units and every derived amount is
//! computed with [`Decimal`] and rounded back to cents (midpoint away from
//! zero), so repeated recalculation never drifts.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting arbitrary decimals into fixed-point values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    #[error("amount overflowed")]
    Overflow,
}

fn scaled(value: Decimal, dp: u32) -> Result<i64, MoneyError> {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .checked_mul(Decimal::from(10_i64.pow(dp)))
        .and_then(|minor| minor.to_i64())
        .ok_or(MoneyError::OutOfRange(value))
}

/// A monetary amount in cents.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Rounds `value` to the nearest cent.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        scaled(value, 2).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// `self * percent / 100`, rounded to the cent.
    pub fn percent_of(self, percent: Percent) -> Result<Money, MoneyError> {
        let share = self
            .to_decimal()
            .checked_mul(percent.fraction())
            .ok_or(MoneyError::Overflow)?;
        Money::from_decimal(share)
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(rhs.0).map(Self).ok_or(MoneyError::Overflow)
    }

    pub fn checked_sub(self, rhs: Money) -> Result<Money, MoneyError> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(MoneyError::Overflow)
    }

    /// Adds up `amounts`, failing on overflow.
    pub fn try_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.to_decimal()
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

/// A percentage in hundredths of a percent: `10%` is stored as `1000`.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Percent(i64);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    pub const fn from_bps(bps: i64) -> Self {
        Self(bps)
    }

    pub const fn bps(self) -> i64 {
        self.0
    }

    /// Parses a percentage such as `7.25`, keeping two decimal places.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        scaled(value, 2).map(Self)
    }

    /// The percentage as written, e.g. `12.5`.
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// The percentage as a fraction of one, e.g. `0.125`.
    pub fn fraction(self) -> Decimal {
        Decimal::new(self.0, 4)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_decimal())
    }
}

impl From<Percent> for Decimal {
    fn from(value: Percent) -> Self {
        value.to_decimal()
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Percent::from_decimal(value)
    }
}

/// A line-item quantity in thousandths of a unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Quantity(i64);

impl Quantity {
    pub const ONE: Quantity = Quantity(1000);

    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    pub const fn milli(self) -> i64 {
        self.0
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        scaled(value, 3).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 3)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::ONE
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.to_decimal()
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Quantity::from_decimal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_cents_away_from_zero() {
        assert_eq!(Money::from_decimal(dec!(0.125)).unwrap().cents(), 13);
        assert_eq!(Money::from_decimal(dec!(-0.125)).unwrap().cents(), -13);
        assert_eq!(Money::from_decimal(dec!(0.124)).unwrap().cents(), 12);
    }

    #[test]
    fn percent_of_uses_fraction_of_base() {
        let subtotal = Money::from_cents(25_000);
        let ten = Percent::from_decimal(dec!(10)).unwrap();
        assert_eq!(ten.bps(), 1000);
        assert_eq!(subtotal.percent_of(ten).unwrap(), Money::from_cents(2_500));

        let five = Percent::from_decimal(dec!(5)).unwrap();
        assert_eq!(
            Money::from_cents(22_500).percent_of(five).unwrap(),
            Money::from_cents(1_125)
        );
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(23_625)).unwrap();
        assert_eq!(json, "\"236.25\"");

        let parsed: Money = serde_json::from_str("236.25").unwrap();
        assert_eq!(parsed.cents(), 23_625);
        let parsed: Money = serde_json::from_str("\"10000\"").unwrap();
        assert_eq!(parsed.cents(), 1_000_000);
    }

    #[test]
    fn quantity_keeps_three_places() {
        let q = Quantity::from_decimal(dec!(2.5)).unwrap();
        assert_eq!(q.milli(), 2500);
        assert_eq!(q.to_decimal(), dec!(2.500));
        assert_eq!(Quantity::default(), Quantity::ONE);
    }

    #[test]
    fn sums_and_differences() {
        let total = Money::try_sum([100, 250, 5].into_iter().map(Money::from_cents)).unwrap();
        assert_eq!(total, Money::from_cents(355));
        assert_eq!(
            total.checked_sub(Money::from_cents(55)).unwrap(),
            Money::from_cents(300)
        );
        assert_eq!(
            Money::from_cents(10).max(Money::from_cents(20)),
            Money::from_cents(20)
        );
    }

    #[test]
    fn overflowing_sums_are_errors() {
        let big = Money::from_cents(i64::MAX);
        assert_eq!(big.checked_add(Money::from_cents(1)), Err(MoneyError::Overflow));
        assert_eq!(Money::try_sum([big, big]), Err(MoneyError::Overflow));
        assert_eq!(
            Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn huge_decimals_are_rejected_not_scaled() {
        assert!(matches!(
            Money::from_decimal(Decimal::MAX),
            Err(MoneyError::OutOfRange(_))
        ));
        assert!(Quantity::from_decimal(Decimal::MAX).is_err());
        assert!(Percent::from_decimal(Decimal::MIN).is_err());

        let parsed = serde_json::from_str::<Money>("\"79228162514264337593543950335\"");
        assert!(parsed.is_err());
    }
}
