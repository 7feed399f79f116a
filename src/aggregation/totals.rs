//! Pure quote arithmetic.
//!
//! Each derived amount is rounded to the cent as soon as it is produced, so
//! `total == (subtotal - discount_amount) + tax_amount` holds exactly.

use rust_decimal::Decimal;

use crate::money::{Money, MoneyError, Percent, Quantity};

/// `quantity * unit_price * (1 - discount/100)`, rounded to the cent.
pub fn line_total(
    quantity: Quantity,
    unit_price: Money,
    discount: Percent,
) -> Result<Money, MoneyError> {
    let net = Decimal::ONE
        .checked_sub(discount.fraction())
        .and_then(|share| {
            quantity
                .to_decimal()
                .checked_mul(unit_price.to_decimal())?
                .checked_mul(share)
        })
        .ok_or(MoneyError::Overflow)?;
    Money::from_decimal(net)
}

/// Derived amounts of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuoteTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl QuoteTotals {
    /// Computes the totals from the line totals and the quote-level
    /// percentages. Tax applies to the discounted subtotal.
    pub fn compute<I>(line_totals: I, discount: Percent, tax: Percent) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        let subtotal = Money::try_sum(line_totals)?;
        let discount_amount = subtotal.percent_of(discount)?;
        let taxable = subtotal.checked_sub(discount_amount)?;
        let tax_amount = taxable.percent_of(tax)?;

        Ok(Self {
            subtotal,
            discount_amount,
            tax_amount,
            total: taxable.checked_add(tax_amount)?,
        })
    }

    pub fn taxable(&self) -> Result<Money, MoneyError> {
        self.subtotal.checked_sub(self.discount_amount)
    }
}
