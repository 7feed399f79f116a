//! # Contacts API Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ApiJson, ApiPath, CreatedResponse, DeletedResponse, nullable};
use crate::error::{ApiError, CrmError};
use crate::models::contact;
use crate::money::Money;
use crate::repositories::contact::{CreateContactRequest, UpdateContactRequest};
use crate::server::AppState;

/// Contact as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContactDto {
    pub id: Uuid,
    #[schema(example = "Ann")]
    pub first_name: String,
    #[schema(example = "Lee")]
    pub last_name: String,
    #[schema(example = "ann@example.com")]
    pub email: String,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub landing_page: Option<String>,
    pub referrer: Option<String>,
    pub notes: Option<String>,
    /// Sum of the contact's won deals
    #[schema(value_type = String, example = "10000.00")]
    pub deal_value: Money,
    pub deal_closed_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub last_activity_at: Option<String>,
    #[schema(value_type = String)]
    pub created_at: String,
    #[schema(value_type = String)]
    pub updated_at: String,
}

impl From<contact::Model> for ContactDto {
    fn from(model: contact::Model) -> Self {
        Self {
            deal_value: model.deal_value(),
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            company_id: model.company_id,
            salesperson_id: model.salesperson_id,
            utm_source: model.utm_source,
            utm_medium: model.utm_medium,
            utm_campaign: model.utm_campaign,
            utm_term: model.utm_term,
            utm_content: model.utm_content,
            landing_page: model.landing_page,
            referrer: model.referrer,
            notes: model.notes,
            deal_closed_date: model.deal_closed_date,
            last_activity_at: model.last_activity_at.map(|at| at.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// Request payload for creating a contact
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateContactDto {
    #[schema(example = "Ann")]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[schema(example = "ann@example.com")]
    pub email: String,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub landing_page: Option<String>,
    pub referrer: Option<String>,
    pub notes: Option<String>,
}

impl From<CreateContactDto> for CreateContactRequest {
    fn from(dto: CreateContactDto) -> Self {
        Self {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email,
            phone: dto.phone,
            company_id: dto.company_id,
            salesperson_id: dto.salesperson_id,
            utm_source: dto.utm_source,
            utm_medium: dto.utm_medium,
            utm_campaign: dto.utm_campaign,
            utm_term: dto.utm_term,
            utm_content: dto.utm_content,
            landing_page: dto.landing_page,
            referrer: dto.referrer,
            notes: dto.notes,
        }
    }
}

/// Partial update; `null` clears a nullable field, an absent key leaves it
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateContactDto {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub company_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<Uuid>)]
    pub salesperson_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub utm_source: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub utm_medium: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub utm_campaign: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

impl From<UpdateContactDto> for UpdateContactRequest {
    fn from(dto: UpdateContactDto) -> Self {
        Self {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email,
            phone: dto.phone,
            company_id: dto.company_id,
            salesperson_id: dto.salesperson_id,
            utm_source: dto.utm_source,
            utm_medium: dto.utm_medium,
            utm_campaign: dto.utm_campaign,
            notes: dto.notes,
            ..Self::default()
        }
    }
}

/// Create a contact
#[utoipa::path(
    post,
    path = "/api/contacts",
    request_body = CreateContactDto,
    responses(
        (status = 201, description = "Contact created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Email already in use", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn create_contact(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<CreateContactDto>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let contact = state.contacts.create(dto.into()).await?;
    Ok(CreatedResponse::created(contact.id))
}

/// Get a contact by ID
#[utoipa::path(
    get,
    path = "/api/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact UUID")),
    responses(
        (status = 200, description = "Contact found", body = ContactDto),
        (status = 404, description = "Contact not found", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn get_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ContactDto>, ApiError> {
    let contact = state
        .contacts
        .get(id)
        .await?
        .ok_or_else(|| CrmError::not_found("contact", id))?;
    Ok(Json(contact.into()))
}

/// Update a contact
#[utoipa::path(
    patch,
    path = "/api/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact UUID")),
    request_body = UpdateContactDto,
    responses(
        (status = 200, description = "Contact updated", body = ContactDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
        (status = 409, description = "Email already in use", body = ApiError)
    ),
    tag = "contacts"
)]
pub async fn update_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateContactDto>,
) -> Result<Json<ContactDto>, ApiError> {
    let contact = state.contacts.update(id, dto.into()).await?;
    Ok(Json(contact.into()))
}

/// Delete a contact
#[utoipa::path(
    delete,
    path = "/api/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact UUID")),
    responses(
        (status = 200, description = "Deletion result", body = DeletedResponse)
    ),
    tag = "contacts"
)]
pub async fn delete_contact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.contacts.delete(id).await?;
    Ok(Json(DeletedResponse { deleted }))
}
