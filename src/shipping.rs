//! # Shipping Estimator
//!
//! Freight cost for a quote: driving distance from the configured origin to
//! the customer's postal code, times a per-mile rate, never below a minimum
//! charge. The distance lookup sits behind [`DistanceProvider`]; no concrete
//! network provider ships with this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::config::ShippingConfig;
use crate::money::{Money, MoneyError};

/// Failures reported by a distance provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistanceError {
    /// The provider does not know the postal code
    #[error("unknown postal code: {postal_code}")]
    UnknownPostalCode { postal_code: String },
    /// No drivable route between the two points
    #[error("no route found from {origin} to {destination}")]
    NoRoute { origin: String, destination: String },
    /// Network or upstream failure
    #[error("distance provider unavailable: {details}")]
    Unavailable { details: String, retryable: bool },
}

impl DistanceError {
    fn is_retryable(&self) -> bool {
        matches!(self, DistanceError::Unavailable { retryable: true, .. })
    }
}

/// Errors from [`ShippingEstimator::estimate`]
#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("postal code is required")]
    MissingPostalCode,
    #[error("distance lookup timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error(transparent)]
    Distance(#[from] DistanceError),
    #[error("shipping cost out of range: {0}")]
    Money(#[from] MoneyError),
}

/// Source of road distances between two postal codes
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    /// Driving distance in miles.
    async fn driving_miles(&self, origin: &str, destination: &str)
    -> Result<Decimal, DistanceError>;
}

/// Result of a shipping estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingEstimate {
    pub origin_postal_code: String,
    pub destination_postal_code: String,
    /// Rounded to one decimal
    pub distance_miles: Decimal,
    pub rate_per_mile: Decimal,
    /// `distance * rate`, before the minimum is applied
    pub calculated_cost: Money,
    /// What the customer is charged
    pub shipping_cost: Money,
    pub minimum_applied: bool,
}

#[derive(Clone)]
pub struct ShippingEstimator {
    provider: Arc<dyn DistanceProvider>,
    config: ShippingConfig,
}

impl ShippingEstimator {
    pub fn new(provider: Arc<dyn DistanceProvider>, config: ShippingConfig) -> Self {
        Self { provider, config }
    }

    /// Estimate freight from the configured origin to `destination`.
    ///
    /// A timed-out or retryable provider failure is retried once.
    pub async fn estimate(&self, destination: &str) -> Result<ShippingEstimate, ShippingError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(ShippingError::MissingPostalCode);
        }
        let origin = self.config.origin_postal_code.trim();

        let miles = match self.lookup(origin, destination).await {
            Err(err) if is_retryable(&err) => {
                tracing::warn!(
                    origin = %origin,
                    destination = %destination,
                    error = %err,
                    "Distance lookup failed; retrying once"
                );
                self.lookup(origin, destination).await?
            }
            result => result?,
        };

        let estimate = price(
            origin,
            destination,
            miles,
            self.config.rate_per_mile,
            self.config.minimum_cost,
        )?;

        tracing::debug!(
            destination = %destination,
            miles = %estimate.distance_miles,
            cost = %estimate.shipping_cost,
            minimum_applied = estimate.minimum_applied,
            "Estimated shipping"
        );
        Ok(estimate)
    }

    async fn lookup(&self, origin: &str, destination: &str) -> Result<Decimal, ShippingError> {
        let timeout_ms = self.config.timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.provider.driving_miles(origin, destination),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(ShippingError::Timeout { timeout_ms }),
        }
    }
}

fn is_retryable(err: &ShippingError) -> bool {
    match err {
        ShippingError::Timeout { .. } => true,
        ShippingError::Distance(err) => err.is_retryable(),
        _ => false,
    }
}

/// `max(distance * rate, minimum)`, with the distance rounded to a tenth of
/// a mile first.
pub fn price(
    origin: &str,
    destination: &str,
    miles: Decimal,
    rate_per_mile: Decimal,
    minimum_cost: Decimal,
) -> Result<ShippingEstimate, MoneyError> {
    let distance_miles = miles.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    let raw_cost = distance_miles
        .checked_mul(rate_per_mile)
        .ok_or(MoneyError::Overflow)?;
    let calculated_cost = Money::from_decimal(raw_cost)?;
    let minimum = Money::from_decimal(minimum_cost)?;
    let shipping_cost = calculated_cost.max(minimum);

    Ok(ShippingEstimate {
        origin_postal_code: origin.to_string(),
        destination_postal_code: destination.to_string(),
        distance_miles,
        rate_per_mile,
        calculated_cost,
        shipping_cost,
        minimum_applied: shipping_cost > calculated_cost,
    })
}
