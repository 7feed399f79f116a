//! # Quotes API Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ApiJson, ApiPath, CreatedResponse, DeletedResponse, nullable};
use crate::error::{ApiError, CrmError};
use crate::models::{QuoteStatus, quote, quote_item};
use crate::money::{Money, Percent, Quantity};
use crate::repositories::quote::{
    CreateQuoteItemRequest, CreateQuoteRequest, QuoteWithItems, UpdateQuoteItemRequest,
    UpdateQuoteRequest,
};
use crate::server::AppState;

/// Quote as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteDto {
    pub id: Uuid,
    #[schema(example = "Q-2026-0001")]
    pub quote_number: String,
    pub title: Option<String>,
    pub status: QuoteStatus,
    pub deal_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    pub salesperson_name: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,
    #[schema(value_type = String, example = "250.00")]
    pub subtotal: Money,
    #[schema(value_type = String, example = "10.00")]
    pub discount_percent: Percent,
    #[schema(value_type = String, example = "25.00")]
    pub discount_amount: Money,
    #[schema(value_type = String, example = "5.00")]
    pub tax_percent: Percent,
    #[schema(value_type = String, example = "11.25")]
    pub tax_amount: Money,
    #[schema(value_type = String, example = "236.25")]
    pub total: Money,
    pub quote_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_link: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

impl From<quote::Model> for QuoteDto {
    fn from(model: quote::Model) -> Self {
        Self {
            subtotal: model.subtotal(),
            discount_percent: model.discount_percent(),
            discount_amount: model.discount_amount(),
            tax_percent: model.tax_percent(),
            tax_amount: model.tax_amount(),
            total: model.total(),
            id: model.id,
            quote_number: model.quote_number,
            title: model.title,
            status: model.status,
            deal_id: model.deal_id,
            contact_id: model.contact_id,
            company_id: model.company_id,
            salesperson_id: model.salesperson_id,
            salesperson_name: model.salesperson_name,
            customer_name: model.customer_name,
            customer_email: model.customer_email,
            customer_phone: model.customer_phone,
            customer_company: model.customer_company,
            quote_date: model.quote_date,
            expiry_date: model.expiry_date,
            notes: model.notes,
            terms: model.terms,
            payment_link: model.payment_link,
            payment_date: model.payment_date,
        }
    }
}

/// Quote line item as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteItemDto {
    pub id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = String, example = "2")]
    pub quantity: Quantity,
    #[schema(value_type = String, example = "100.00")]
    pub unit_price: Money,
    #[schema(value_type = String, example = "0")]
    pub discount_percent: Percent,
    #[schema(value_type = String, example = "200.00")]
    pub line_total: Money,
    pub sort_order: i32,
}

impl From<quote_item::Model> for QuoteItemDto {
    fn from(model: quote_item::Model) -> Self {
        Self {
            quantity: model.quantity(),
            unit_price: model.unit_price(),
            discount_percent: model.discount_percent(),
            line_total: model.line_total(),
            id: model.id,
            product_id: model.product_id,
            product_name: model.product_name,
            sku: model.sku,
            description: model.description,
            sort_order: model.sort_order,
        }
    }
}

/// Quote with its line items
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuoteDetailsDto {
    #[serde(flatten)]
    pub quote: QuoteDto,
    pub items: Vec<QuoteItemDto>,
}

impl From<QuoteWithItems> for QuoteDetailsDto {
    fn from(value: QuoteWithItems) -> Self {
        Self {
            quote: value.quote.into(),
            items: value.items.into_iter().map(QuoteItemDto::from).collect(),
        }
    }
}

/// Request payload for creating a quote
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateQuoteDto {
    pub title: Option<String>,
    /// Existing deal; a new one is provisioned when absent
    pub deal_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,
    #[serde(default)]
    #[schema(value_type = String, example = "10")]
    pub discount_percent: Percent,
    #[serde(default)]
    #[schema(value_type = String, example = "5")]
    pub tax_percent: Percent,
    pub quote_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
}

impl From<CreateQuoteDto> for CreateQuoteRequest {
    fn from(dto: CreateQuoteDto) -> Self {
        Self {
            title: dto.title,
            deal_id: dto.deal_id,
            contact_id: dto.contact_id,
            company_id: dto.company_id,
            salesperson_id: dto.salesperson_id,
            customer_name: dto.customer_name,
            customer_email: dto.customer_email,
            customer_phone: dto.customer_phone,
            customer_company: dto.customer_company,
            discount: dto.discount_percent,
            tax: dto.tax_percent,
            quote_date: dto.quote_date,
            expiry_date: dto.expiry_date,
            notes: dto.notes,
            terms: dto.terms,
            ..Self::default()
        }
    }
}

/// Partial update of a quote. A status change goes through the quote's
/// document lifecycle.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteDto {
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    pub status: Option<QuoteStatus>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub deal_id: Option<Option<Uuid>>,
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Percent>,
    #[schema(value_type = Option<String>)]
    pub tax_percent: Option<Percent>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub terms: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub payment_link: Option<Option<String>>,
}

/// Request payload for adding a line item
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateQuoteItemDto {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    #[schema(value_type = String, example = "1")]
    pub quantity: Quantity,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub unit_price: Option<Money>,
    #[serde(default)]
    #[schema(value_type = String, example = "0")]
    pub discount_percent: Percent,
    pub sort_order: Option<i32>,
}

impl From<CreateQuoteItemDto> for CreateQuoteItemRequest {
    fn from(dto: CreateQuoteItemDto) -> Self {
        Self {
            product_id: dto.product_id,
            product_name: dto.product_name,
            sku: dto.sku,
            description: dto.description,
            quantity: dto.quantity,
            unit_price: dto.unit_price,
            discount: dto.discount_percent,
            sort_order: dto.sort_order,
        }
    }
}

/// Partial update of a line item
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateQuoteItemDto {
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Quantity>,
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Money>,
    #[schema(value_type = Option<String>)]
    pub discount_percent: Option<Percent>,
    pub sort_order: Option<i32>,
}

impl From<UpdateQuoteItemDto> for UpdateQuoteItemRequest {
    fn from(dto: UpdateQuoteItemDto) -> Self {
        Self {
            product_name: dto.product_name,
            sku: dto.sku,
            description: dto.description,
            quantity: dto.quantity,
            unit_price: dto.unit_price,
            discount: dto.discount_percent,
            sort_order: dto.sort_order,
        }
    }
}

/// Create a quote
#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = CreateQuoteDto,
    responses(
        (status = 201, description = "Quote created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Referenced record not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<CreateQuoteDto>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let quote = state.quotes.create(dto.into()).await?;
    Ok(CreatedResponse::created(quote.id))
}

/// Get a quote with its line items
#[utoipa::path(
    get,
    path = "/api/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote UUID")),
    responses(
        (status = 200, description = "Quote found", body = QuoteDetailsDto),
        (status = 404, description = "Quote not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuoteDetailsDto>, ApiError> {
    let quote = state
        .quotes
        .get_with_items(id)
        .await?
        .ok_or_else(|| CrmError::not_found("quote", id))?;
    Ok(Json(quote.into()))
}

/// Update a quote
#[utoipa::path(
    patch,
    path = "/api/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote UUID")),
    request_body = UpdateQuoteDto,
    responses(
        (status = 200, description = "Quote updated", body = QuoteDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Quote not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn update_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateQuoteDto>,
) -> Result<Json<QuoteDto>, ApiError> {
    let request = UpdateQuoteRequest {
        title: dto.title,
        deal_id: dto.deal_id,
        discount: dto.discount_percent,
        tax: dto.tax_percent,
        expiry_date: dto.expiry_date,
        notes: dto.notes,
        terms: dto.terms,
        payment_link: dto.payment_link,
        status: dto.status,
        ..UpdateQuoteRequest::default()
    };

    let quote = state.quotes.update(id, request).await?;
    Ok(Json(quote.into()))
}

/// Delete a quote and its line items
#[utoipa::path(
    delete,
    path = "/api/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote UUID")),
    responses(
        (status = 200, description = "Deletion result", body = DeletedResponse)
    ),
    tag = "quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.quotes.delete(id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// Add a line item to a quote
#[utoipa::path(
    post,
    path = "/api/quotes/{id}/items",
    params(("id" = Uuid, Path, description = "Quote UUID")),
    request_body = CreateQuoteItemDto,
    responses(
        (status = 201, description = "Item added and totals recalculated", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Quote or product not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn add_quote_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<CreateQuoteItemDto>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let item = state.quotes.add_item(id, dto.into()).await?;
    Ok(CreatedResponse::created(item.id))
}

/// Update a line item
#[utoipa::path(
    patch,
    path = "/api/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Line item UUID")),
    request_body = UpdateQuoteItemDto,
    responses(
        (status = 200, description = "Item updated and totals recalculated", body = QuoteItemDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Item not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn update_quote_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateQuoteItemDto>,
) -> Result<Json<QuoteItemDto>, ApiError> {
    let item = state.quotes.update_item(id, dto.into()).await?;
    Ok(Json(item.into()))
}

/// Remove a line item
#[utoipa::path(
    delete,
    path = "/api/quote-items/{id}",
    params(("id" = Uuid, Path, description = "Line item UUID")),
    responses(
        (status = 200, description = "Deletion result", body = DeletedResponse)
    ),
    tag = "quotes"
)]
pub async fn delete_quote_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.quotes.delete_item(id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// Recompute a quote's totals from its line items
#[utoipa::path(
    post,
    path = "/api/quotes/{id}/recalculate",
    params(("id" = Uuid, Path, description = "Quote UUID")),
    responses(
        (status = 200, description = "Totals recalculated", body = QuoteDto),
        (status = 404, description = "Quote not found", body = ApiError)
    ),
    tag = "quotes"
)]
pub async fn recalculate_quote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<QuoteDto>, ApiError> {
    let quote = state.aggregation.recalculate_quote_totals(id).await?;
    Ok(Json(quote.into()))
}
