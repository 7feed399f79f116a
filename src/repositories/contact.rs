//! # Contact Repository
//!
//! CRUD for contacts plus the activity stamp and the email-keyed upsert used
//! by import adapters. `deal_value` is never written here; it belongs to the
//! aggregation engine.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::{DEFAULT_PAGE_SIZE, apply, like_pattern, non_blank};
use crate::error::CrmError;
use crate::models::{Contact, Deal, DealContact, Quote, contact, deal, deal_contact, quote};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Request data for creating a contact
#[derive(Debug, Clone, Default)]
pub struct CreateContactRequest {
    pub first_name: String,
    pub last_name: String,
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

/// Partial update for a contact
#[derive(Debug, Clone, Default)]
pub struct UpdateContactRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub company_id: Option<Option<Uuid>>,
    pub salesperson_id: Option<Option<Uuid>>,
    pub utm_source: Option<Option<String>>,
    pub utm_medium: Option<Option<String>>,
    pub utm_campaign: Option<Option<String>>,
    pub utm_term: Option<Option<String>>,
    pub utm_content: Option<Option<String>>,
    pub landing_page: Option<Option<String>>,
    pub referrer: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    /// Explicit activity timestamp; defaults to now
    pub last_activity_at: Option<DateTimeWithTimeZone>,
}

impl From<CreateContactRequest> for UpdateContactRequest {
    fn from(request: CreateContactRequest) -> Self {
        Self {
            first_name: Some(request.first_name),
            last_name: Some(request.last_name),
            email: Some(request.email),
            phone: request.phone.map(Some),
            company_id: request.company_id.map(Some),
            salesperson_id: request.salesperson_id.map(Some),
            utm_source: request.utm_source.map(Some),
            utm_medium: request.utm_medium.map(Some),
            utm_campaign: request.utm_campaign.map(Some),
            utm_term: request.utm_term.map(Some),
            utm_content: request.utm_content.map(Some),
            landing_page: request.landing_page.map(Some),
            referrer: request.referrer.map(Some),
            notes: request.notes.map(Some),
            last_activity_at: None,
        }
    }
}

/// Sortable contact columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactSortColumn {
    #[default]
    CreatedAt,
    FirstName,
    LastName,
    Email,
    UtmSource,
    DealValue,
    LastActivity,
}

impl ContactSortColumn {
    fn column(self) -> contact::Column {
        match self {
            ContactSortColumn::CreatedAt => contact::Column::CreatedAt,
            ContactSortColumn::FirstName => contact::Column::FirstName,
            ContactSortColumn::LastName => contact::Column::LastName,
            ContactSortColumn::Email => contact::Column::Email,
            ContactSortColumn::UtmSource => contact::Column::UtmSource,
            ContactSortColumn::DealValue => contact::Column::DealValueCents,
            ContactSortColumn::LastActivity => contact::Column::LastActivityAt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContactSort {
    pub column: ContactSortColumn,
    pub order: Order,
}

impl Default for ContactSort {
    fn default() -> Self {
        Self {
            column: ContactSortColumn::CreatedAt,
            order: Order::Desc,
        }
    }
}

/// A deal the contact is linked to, with the link's role
#[derive(Debug, Clone)]
pub struct ContactDeal {
    pub deal: deal::Model,
    pub role: String,
}

/// Repository for contact database operations
#[derive(Debug, Clone)]
pub struct ContactRepository {
    db: DatabaseConnection,
}

impl ContactRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new contact. Fails with `DuplicateKey` if the email is taken.
    pub async fn create(&self, request: CreateContactRequest) -> Result<contact::Model, CrmError> {
        create_in(&self.db, request).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<contact::Model>, CrmError> {
        Ok(Contact::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<contact::Model>, CrmError> {
        Ok(Contact::find()
            .filter(contact::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?)
    }

    /// Page through contacts. A `limit` of zero uses the default page size.
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
        sort: ContactSort,
    ) -> Result<Vec<contact::Model>, CrmError> {
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
        Ok(Contact::find()
            .order_by(sort.column.column(), sort.order)
            .order_by_asc(contact::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?)
    }

    pub async fn count(&self) -> Result<u64, CrmError> {
        Ok(Contact::find().count(&self.db).await?)
    }

    /// Case-insensitive (on SQLite) substring search over names and email.
    pub async fn search(&self, query: &str) -> Result<Vec<contact::Model>, CrmError> {
        let pattern = like_pattern(query);
        Ok(Contact::find()
            .filter(
                Condition::any()
                    .add(contact::Column::FirstName.like(&pattern))
                    .add(contact::Column::LastName.like(&pattern))
                    .add(contact::Column::Email.like(&pattern)),
            )
            .order_by_desc(contact::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Apply a partial update. Stamps `last_activity_at` unless the request
    /// supplies one.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateContactRequest,
    ) -> Result<contact::Model, CrmError> {
        update_in(&self.db, id, request).await
    }

    /// Record activity on the contact without changing anything else.
    pub async fn touch_activity(&self, id: Uuid) -> Result<contact::Model, CrmError> {
        touch_activity_in(&self.db, id).await
    }

    /// Delete a contact, removing its deal links and detaching its quotes.
    /// Returns `false` if the contact did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(contact) = Contact::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        DealContact::delete_many()
            .filter(deal_contact::Column::ContactId.eq(id))
            .exec(&txn)
            .await?;

        Quote::update_many()
            .col_expr(quote::Column::ContactId, Expr::value(Option::<Uuid>::None))
            .filter(quote::Column::ContactId.eq(id))
            .exec(&txn)
            .await?;

        contact.delete(&txn).await?;
        txn.commit().await?;

        tracing::info!(contact_id = %id, "Deleted contact");
        Ok(true)
    }

    /// Deals linked to the contact, most recently updated first.
    pub async fn deals_for_contact(&self, id: Uuid) -> Result<Vec<ContactDeal>, CrmError> {
        let rows = DealContact::find()
            .filter(deal_contact::Column::ContactId.eq(id))
            .find_also_related(Deal)
            .order_by_desc(deal::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(link, deal)| deal.map(|deal| ContactDeal { deal, role: link.role }))
            .collect())
    }

    /// Contacts nobody has touched yet: no recorded activity and no notes.
    pub async fn untouched_leads(&self, limit: u64) -> Result<Vec<contact::Model>, CrmError> {
        Ok(Contact::find()
            .filter(contact::Column::LastActivityAt.is_null())
            .filter(
                Condition::any()
                    .add(contact::Column::Notes.is_null())
                    .add(contact::Column::Notes.eq("")),
            )
            .order_by_desc(contact::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Insert, or update the existing contact with the same email. Returns the
    /// contact and whether it was newly created.
    pub async fn upsert_by_email(
        &self,
        request: CreateContactRequest,
    ) -> Result<(contact::Model, bool), CrmError> {
        let txn = self.db.begin().await?;

        let existing = Contact::find()
            .filter(contact::Column::Email.eq(normalize_email(&request.email)))
            .one(&txn)
            .await?;

        let result = match existing {
            Some(existing) => {
                let mut patch = UpdateContactRequest::from(request);
                // Imports fill gaps; they never blank out what is already there.
                patch.first_name = non_blank(patch.first_name);
                patch.last_name = non_blank(patch.last_name);
                (update_in(&txn, existing.id, patch).await?, false)
            }
            None => (create_in(&txn, request).await?, true),
        };

        txn.commit().await?;
        Ok(result)
    }
}

pub(crate) async fn create_in<C>(
    conn: &C,
    request: CreateContactRequest,
) -> Result<contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    let email = normalize_email(&request.email);
    validate_email(&email)?;
    let first_name = request.first_name.trim().to_string();
    if first_name.is_empty() {
        return Err(CrmError::validation("First name is required"));
    }

    let now = Utc::now().fixed_offset();
    let contact = contact::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(first_name),
        last_name: Set(request.last_name.trim().to_string()),
        email: Set(email.clone()),
        phone: Set(non_blank(request.phone)),
        company_id: Set(request.company_id),
        salesperson_id: Set(request.salesperson_id),
        utm_source: Set(non_blank(request.utm_source)),
        utm_medium: Set(non_blank(request.utm_medium)),
        utm_campaign: Set(non_blank(request.utm_campaign)),
        utm_term: Set(non_blank(request.utm_term)),
        utm_content: Set(non_blank(request.utm_content)),
        landing_page: Set(non_blank(request.landing_page)),
        referrer: Set(non_blank(request.referrer)),
        notes: Set(non_blank(request.notes)),
        deal_value_cents: Set(0),
        deal_closed_date: Set(None),
        last_activity_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let contact = contact
        .insert(conn)
        .await
        .map_err(CrmError::on_write("contact", email))?;

    tracing::info!(contact_id = %contact.id, "Created contact");
    Ok(contact)
}

pub(crate) async fn update_in<C>(
    conn: &C,
    id: Uuid,
    request: UpdateContactRequest,
) -> Result<contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    let contact = Contact::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("contact", id))?;

    let email = match request.email {
        Some(email) => {
            let email = normalize_email(&email);
            validate_email(&email)?;
            Some(email)
        }
        None => None,
    };
    if request
        .first_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(CrmError::validation("First name is required"));
    }
    let key = email.clone().unwrap_or_else(|| contact.email.clone());

    let now = Utc::now().fixed_offset();
    let mut active = contact.into_active_model();
    apply(
        &mut active.first_name,
        request.first_name.map(|name| name.trim().to_string()),
    );
    apply(
        &mut active.last_name,
        request.last_name.map(|name| name.trim().to_string()),
    );
    apply(&mut active.email, email);
    apply(&mut active.phone, request.phone);
    apply(&mut active.company_id, request.company_id);
    apply(&mut active.salesperson_id, request.salesperson_id);
    apply(&mut active.utm_source, request.utm_source);
    apply(&mut active.utm_medium, request.utm_medium);
    apply(&mut active.utm_campaign, request.utm_campaign);
    apply(&mut active.utm_term, request.utm_term);
    apply(&mut active.utm_content, request.utm_content);
    apply(&mut active.landing_page, request.landing_page);
    apply(&mut active.referrer, request.referrer);
    apply(&mut active.notes, request.notes);
    active.last_activity_at = Set(Some(request.last_activity_at.unwrap_or(now)));
    active.updated_at = Set(now);

    active
        .update(conn)
        .await
        .map_err(CrmError::on_write("contact", key))
}

pub(crate) async fn touch_activity_in<C>(conn: &C, id: Uuid) -> Result<contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    let contact = Contact::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("contact", id))?;

    let mut active = contact.into_active_model();
    active.last_activity_at = Set(Some(Utc::now().fixed_offset()));
    Ok(active.update(conn).await?)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), CrmError> {
    if email.is_empty() {
        return Err(CrmError::validation("Email is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(CrmError::validation(format!("Invalid email address: {email}")));
    }
    Ok(())
}
