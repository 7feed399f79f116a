//! # Deals API Handlers
//!
//! CRUD on deals, contact linking, and the stage endpoint that drives the
//! pipeline state machine.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::quotes::QuoteDto;
use super::{ApiJson, ApiPath, CreatedResponse, DeletedResponse, nullable};
use crate::error::{ApiError, CrmError};
use crate::models::{DealStage, deal};
use crate::money::Money;
use crate::repositories::deal::{CreateDealRequest, DealDetails, UpdateDealRequest};
use crate::server::AppState;

/// Deal as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealDto {
    pub id: Uuid,
    #[schema(example = "Acme warehouse racking")]
    pub name: String,
    #[schema(value_type = String, example = "10000.00")]
    pub value: Money,
    pub stage: DealStage,
    pub salesperson_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub reported_source: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    /// Present exactly when the stage is closed
    pub actual_close_date: Option<NaiveDate>,
    pub close_reason: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = String)]
    pub created_at: String,
    #[schema(value_type = String)]
    pub updated_at: String,
}

impl From<deal::Model> for DealDto {
    fn from(model: deal::Model) -> Self {
        Self {
            value: model.value(),
            id: model.id,
            name: model.name,
            stage: model.stage,
            salesperson_id: model.salesperson_id,
            company_id: model.company_id,
            utm_source: model.utm_source,
            utm_medium: model.utm_medium,
            utm_campaign: model.utm_campaign,
            reported_source: model.reported_source,
            expected_close_date: model.expected_close_date,
            actual_close_date: model.actual_close_date,
            close_reason: model.close_reason,
            notes: model.notes,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// A contact linked to a deal
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealContactDto {
    pub contact_id: Uuid,
    pub name: String,
    pub email: String,
    #[schema(example = "primary")]
    pub role: String,
}

/// Deal with its contacts and quotes
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealDetailsDto {
    #[serde(flatten)]
    pub deal: DealDto,
    pub contacts: Vec<DealContactDto>,
    pub quotes: Vec<QuoteDto>,
}

impl From<DealDetails> for DealDetailsDto {
    fn from(details: DealDetails) -> Self {
        Self {
            deal: details.deal.into(),
            contacts: details
                .contacts
                .into_iter()
                .map(|linked| DealContactDto {
                    contact_id: linked.contact.id,
                    name: linked.contact.full_name(),
                    email: linked.contact.email,
                    role: linked.role,
                })
                .collect(),
            quotes: details.quotes.into_iter().map(QuoteDto::from).collect(),
        }
    }
}

/// Request payload for creating a deal
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDealDto {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = String, example = "2500.00")]
    pub value: Money,
    pub stage: Option<DealStage>,
    pub actual_close_date: Option<NaiveDate>,
    /// Linked as the primary contact
    pub contact_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub reported_source: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub close_reason: Option<String>,
    pub notes: Option<String>,
}

impl From<CreateDealDto> for CreateDealRequest {
    fn from(dto: CreateDealDto) -> Self {
        Self {
            value: dto.value,
            stage: dto.stage.unwrap_or(DealStage::NewDeal),
            actual_close_date: dto.actual_close_date,
            salesperson_id: dto.salesperson_id,
            company_id: dto.company_id,
            contact_id: dto.contact_id,
            utm_source: dto.utm_source,
            utm_medium: dto.utm_medium,
            utm_campaign: dto.utm_campaign,
            reported_source: dto.reported_source,
            expected_close_date: dto.expected_close_date,
            close_reason: dto.close_reason,
            notes: dto.notes,
            ..CreateDealRequest::new(dto.name)
        }
    }
}

/// Partial update. Stage and close date change only through the stage endpoint.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateDealDto {
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub value: Option<Money>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub salesperson_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub company_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub reported_source: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub expected_close_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl From<UpdateDealDto> for UpdateDealRequest {
    fn from(dto: UpdateDealDto) -> Self {
        Self {
            name: dto.name,
            value: dto.value,
            salesperson_id: dto.salesperson_id,
            company_id: dto.company_id,
            reported_source: dto.reported_source,
            expected_close_date: dto.expected_close_date,
            notes: dto.notes,
            ..Self::default()
        }
    }
}

/// Stage change request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChangeStageDto {
    #[schema(example = "closed_won")]
    pub stage: String,
    /// Close date for closed stages; defaults to today
    pub close_date: Option<NaiveDate>,
    /// Free-text reason, stored independently of the stage
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub close_reason: Option<Option<String>>,
}

/// Result of a stage change
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StageChangeDto {
    pub deal: DealDto,
    pub previous_stage: DealStage,
    /// Contacts whose deal value was recomputed
    pub contacts_resynced: Vec<Uuid>,
}

/// Request payload for linking a contact
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LinkContactDto {
    pub contact_id: Uuid,
    #[schema(example = "primary")]
    pub role: Option<String>,
}

/// Create a deal
#[utoipa::path(
    post,
    path = "/api/deals",
    request_body = CreateDealDto,
    responses(
        (status = 201, description = "Deal created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Linked contact not found", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn create_deal(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<CreateDealDto>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let deal = state.deals.create(dto.into()).await?;
    Ok(CreatedResponse::created(deal.id))
}

/// Get a deal with its contacts and quotes
#[utoipa::path(
    get,
    path = "/api/deals/{id}",
    params(("id" = Uuid, Path, description = "Deal UUID")),
    responses(
        (status = 200, description = "Deal found", body = DealDetailsDto),
        (status = 404, description = "Deal not found", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn get_deal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DealDetailsDto>, ApiError> {
    let details = state
        .deals
        .get_with_relations(id)
        .await?
        .ok_or_else(|| CrmError::not_found("deal", id))?;
    Ok(Json(details.into()))
}

/// Update a deal
#[utoipa::path(
    patch,
    path = "/api/deals/{id}",
    params(("id" = Uuid, Path, description = "Deal UUID")),
    request_body = UpdateDealDto,
    responses(
        (status = 200, description = "Deal updated", body = DealDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Deal not found", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn update_deal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateDealDto>,
) -> Result<Json<DealDto>, ApiError> {
    let deal = state.deals.update(id, dto.into()).await?;
    Ok(Json(deal.into()))
}

/// Delete a deal
#[utoipa::path(
    delete,
    path = "/api/deals/{id}",
    params(("id" = Uuid, Path, description = "Deal UUID")),
    responses(
        (status = 200, description = "Deletion result", body = DeletedResponse)
    ),
    tag = "deals"
)]
pub async fn delete_deal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.deals.delete(id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// Move a deal to another pipeline stage
#[utoipa::path(
    put,
    path = "/api/deals/{id}/stage",
    params(("id" = Uuid, Path, description = "Deal UUID")),
    request_body = ChangeStageDto,
    responses(
        (status = 200, description = "Stage changed", body = StageChangeDto),
        (status = 400, description = "Unknown stage", body = ApiError),
        (status = 404, description = "Deal not found", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn change_stage(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<ChangeStageDto>,
) -> Result<Json<StageChangeDto>, ApiError> {
    let outcome = state
        .pipeline
        .transition(id, &dto.stage, dto.close_date)
        .await?;

    let deal = match dto.close_reason {
        Some(reason) => state.pipeline.set_close_reason(id, reason).await?,
        None => outcome.deal,
    };

    Ok(Json(StageChangeDto {
        deal: deal.into(),
        previous_stage: outcome.previous_stage,
        contacts_resynced: outcome.resynced_contacts.iter().map(|c| c.id).collect(),
    }))
}

/// Link a contact to a deal
#[utoipa::path(
    post,
    path = "/api/deals/{id}/contacts",
    params(("id" = Uuid, Path, description = "Deal UUID")),
    request_body = LinkContactDto,
    responses(
        (status = 201, description = "Contact linked", body = CreatedResponse),
        (status = 404, description = "Deal or contact not found", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn add_deal_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<LinkContactDto>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let link = state
        .deals
        .add_contact(id, dto.contact_id, dto.role.as_deref())
        .await?;
    Ok(CreatedResponse::created(link.id))
}
