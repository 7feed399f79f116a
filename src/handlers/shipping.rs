//! # Shipping API Handlers
//!
//! Freight estimates from the configured origin. The endpoint answers 503
//! until the application state carries a distance provider.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiJson;
use crate::error::ApiError;
use crate::money::Money;
use crate::server::AppState;
use crate::shipping::ShippingEstimate;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ShippingEstimateRequest {
    #[schema(example = "90210")]
    pub postal_code: String,
}

/// Freight estimate for one destination
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShippingEstimateDto {
    pub origin_postal_code: String,
    pub destination_postal_code: String,
    #[schema(value_type = String, example = "2021.5")]
    pub distance_miles: Decimal,
    #[schema(value_type = String, example = "3.85")]
    pub rate_per_mile: Decimal,
    #[schema(value_type = String, example = "7782.78")]
    pub calculated_cost: Money,
    #[schema(value_type = String, example = "7782.78")]
    pub shipping_cost: Money,
    pub minimum_applied: bool,
}

impl From<ShippingEstimate> for ShippingEstimateDto {
    fn from(estimate: ShippingEstimate) -> Self {
        Self {
            origin_postal_code: estimate.origin_postal_code,
            destination_postal_code: estimate.destination_postal_code,
            distance_miles: estimate.distance_miles,
            rate_per_mile: estimate.rate_per_mile,
            calculated_cost: estimate.calculated_cost,
            shipping_cost: estimate.shipping_cost,
            minimum_applied: estimate.minimum_applied,
        }
    }
}

/// Estimate freight to a postal code
#[utoipa::path(
    post,
    path = "/api/shipping/estimate",
    request_body = ShippingEstimateRequest,
    responses(
        (status = 200, description = "Estimate computed", body = ShippingEstimateDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 422, description = "No route to the postal code", body = ApiError),
        (status = 502, description = "Distance provider failed", body = ApiError),
        (status = 503, description = "Shipping estimates not configured", body = ApiError),
        (status = 504, description = "Distance lookup timed out", body = ApiError)
    ),
    tag = "shipping"
)]
pub async fn estimate_shipping(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ShippingEstimateRequest>,
) -> Result<Json<ShippingEstimateDto>, ApiError> {
    let estimator = state.shipping.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Shipping estimates are not configured",
        )
    })?;

    let estimate = estimator.estimate(&request.postal_code).await?;
    Ok(Json(estimate.into()))
}
