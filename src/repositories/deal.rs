//! # Deal Repository
//!
//! CRUD for deals and their contact links. Stage and close date are not
//! patchable here; they move only through the pipeline state machine. Writes
//! that can change a contact's won total re-sum the affected contacts in the
//! same transaction.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::contact::touch_activity_in;
use super::{apply, like_pattern, non_blank};
use crate::aggregation::{sync_contact_value_for_deal_in, sync_contact_value_in};
use crate::error::CrmError;
use crate::models::deal_contact::DEFAULT_ROLE;
use crate::models::{
    Contact, Deal, DealContact, DealStage, Quote, contact, deal, deal_contact, quote,
};
use crate::money::Money;
use crate::pipeline::today;

/// Request data for creating a deal
#[derive(Debug, Clone)]
pub struct CreateDealRequest {
    pub name: String,
    pub value: Money,
    pub stage: DealStage,
    /// Close date for deals created directly in a closed stage; defaults to today
    pub actual_close_date: Option<NaiveDate>,
    pub salesperson_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    /// Linked with the `primary` role when present
    pub contact_id: Option<Uuid>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub reported_source: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub close_reason: Option<String>,
    pub notes: Option<String>,
}

impl CreateDealRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Money::ZERO,
            stage: DealStage::NewDeal,
            actual_close_date: None,
            salesperson_id: None,
            company_id: None,
            contact_id: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            reported_source: None,
            expected_close_date: None,
            close_reason: None,
            notes: None,
        }
    }
}

/// Partial update for a deal
#[derive(Debug, Clone, Default)]
pub struct UpdateDealRequest {
    pub name: Option<String>,
    pub value: Option<Money>,
    pub salesperson_id: Option<Option<Uuid>>,
    pub company_id: Option<Option<Uuid>>,
    pub utm_source: Option<Option<String>>,
    pub utm_medium: Option<Option<String>>,
    pub utm_campaign: Option<Option<String>>,
    pub reported_source: Option<Option<String>>,
    pub expected_close_date: Option<Option<NaiveDate>>,
    pub close_reason: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// A contact linked to a deal, with the link's role
#[derive(Debug, Clone)]
pub struct LinkedContact {
    pub contact: contact::Model,
    pub role: String,
}

/// A deal together with its contacts and quotes
#[derive(Debug, Clone)]
pub struct DealDetails {
    pub deal: deal::Model,
    pub contacts: Vec<LinkedContact>,
    pub quotes: Vec<quote::Model>,
}

/// Repository for deal database operations
#[derive(Debug, Clone)]
pub struct DealRepository {
    db: DatabaseConnection,
}

impl DealRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a deal, optionally linking a primary contact.
    ///
    /// A deal created in a closed stage gets its close date stamped, and one
    /// created `closed_won` immediately counts toward its contact's total.
    pub async fn create(&self, request: CreateDealRequest) -> Result<deal::Model, CrmError> {
        let txn = self.db.begin().await?;
        let deal = create_in(&txn, request).await?;
        txn.commit().await?;
        Ok(deal)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<deal::Model>, CrmError> {
        Ok(Deal::find_by_id(id).one(&self.db).await?)
    }

    /// The deal with its linked contacts (and roles) and its quotes.
    pub async fn get_with_relations(&self, id: Uuid) -> Result<Option<DealDetails>, CrmError> {
        let Some(deal) = Deal::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let contacts = DealContact::find()
            .filter(deal_contact::Column::DealId.eq(id))
            .find_also_related(Contact)
            .order_by_asc(deal_contact::Column::AddedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(link, contact)| {
                contact.map(|contact| LinkedContact {
                    contact,
                    role: link.role,
                })
            })
            .collect();

        let quotes = deal
            .find_related(Quote)
            .order_by_desc(quote::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(Some(DealDetails {
            deal,
            contacts,
            quotes,
        }))
    }

    /// All deals, optionally restricted to one stage, newest first.
    pub async fn list(&self, stage: Option<DealStage>) -> Result<Vec<deal::Model>, CrmError> {
        let mut select = Deal::find();
        if let Some(stage) = stage {
            select = select.filter(deal::Column::Stage.eq(stage));
        }
        Ok(select
            .order_by_desc(deal::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<deal::Model>, CrmError> {
        Ok(Deal::find()
            .filter(deal::Column::Name.like(like_pattern(query)))
            .order_by_desc(deal::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Apply a partial update. A value change on a `closed_won` deal re-sums
    /// the linked contacts.
    pub async fn update(&self, id: Uuid, request: UpdateDealRequest) -> Result<deal::Model, CrmError> {
        let txn = self.db.begin().await?;

        let deal = Deal::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| CrmError::not_found("deal", id))?;

        if request
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(CrmError::validation("Deal name is required"));
        }

        let value_changed = request
            .value
            .is_some_and(|value| value.cents() != deal.value_cents);

        let mut active = deal.into_active_model();
        apply(&mut active.name, request.name.map(|n| n.trim().to_string()));
        apply(&mut active.value_cents, request.value.map(Money::cents));
        apply(&mut active.salesperson_id, request.salesperson_id);
        apply(&mut active.company_id, request.company_id);
        apply(&mut active.utm_source, request.utm_source);
        apply(&mut active.utm_medium, request.utm_medium);
        apply(&mut active.utm_campaign, request.utm_campaign);
        apply(&mut active.reported_source, request.reported_source);
        apply(&mut active.expected_close_date, request.expected_close_date);
        apply(&mut active.close_reason, request.close_reason);
        apply(&mut active.notes, request.notes);
        active.updated_at = Set(Utc::now().fixed_offset());
        let deal = active.update(&txn).await?;

        if value_changed && deal.stage == DealStage::ClosedWon {
            sync_contact_value_for_deal_in(&txn, id).await?;
        }

        txn.commit().await?;
        Ok(deal)
    }

    /// Delete a deal. Its contact links are removed, its quotes detached, and
    /// the previously linked contacts re-summed. Returns `false` if the deal
    /// did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(deal) = Deal::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        let contact_ids: BTreeSet<Uuid> = deal
            .find_related(DealContact)
            .all(&txn)
            .await?
            .into_iter()
            .map(|link| link.contact_id)
            .collect();

        DealContact::delete_many()
            .filter(deal_contact::Column::DealId.eq(id))
            .exec(&txn)
            .await?;

        Quote::update_many()
            .col_expr(quote::Column::DealId, Expr::value(Option::<Uuid>::None))
            .filter(quote::Column::DealId.eq(id))
            .exec(&txn)
            .await?;

        deal.delete(&txn).await?;

        for contact_id in &contact_ids {
            sync_contact_value_in(&txn, *contact_id).await?;
        }

        txn.commit().await?;
        tracing::info!(deal_id = %id, contacts_resynced = contact_ids.len(), "Deleted deal");
        Ok(true)
    }

    /// Link a contact to a deal, or change the role of an existing link.
    /// Touches the contact's activity and re-sums its won total.
    pub async fn add_contact(
        &self,
        deal_id: Uuid,
        contact_id: Uuid,
        role: Option<&str>,
    ) -> Result<deal_contact::Model, CrmError> {
        let txn = self.db.begin().await?;
        let link = link_contact_in(&txn, deal_id, contact_id, role).await?;
        txn.commit().await?;
        Ok(link)
    }

    /// Remove a contact from a deal. Returns `false` if they were not linked.
    pub async fn remove_contact(&self, deal_id: Uuid, contact_id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let result = DealContact::delete_many()
            .filter(deal_contact::Column::DealId.eq(deal_id))
            .filter(deal_contact::Column::ContactId.eq(contact_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(false);
        }

        sync_contact_value_in(&txn, contact_id).await?;
        txn.commit().await?;
        Ok(true)
    }
}

pub(crate) async fn create_in<C>(conn: &C, request: CreateDealRequest) -> Result<deal::Model, CrmError>
where
    C: ConnectionTrait,
{
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(CrmError::validation("Deal name is required"));
    }

    let actual_close_date = if request.stage.is_closed() {
        Some(request.actual_close_date.unwrap_or_else(today))
    } else {
        None
    };

    let now = Utc::now().fixed_offset();
    let deal = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        value_cents: Set(request.value.cents()),
        stage: Set(request.stage),
        salesperson_id: Set(request.salesperson_id),
        company_id: Set(request.company_id),
        utm_source: Set(non_blank(request.utm_source)),
        utm_medium: Set(non_blank(request.utm_medium)),
        utm_campaign: Set(non_blank(request.utm_campaign)),
        reported_source: Set(non_blank(request.reported_source)),
        expected_close_date: Set(request.expected_close_date),
        actual_close_date: Set(actual_close_date),
        close_reason: Set(non_blank(request.close_reason)),
        notes: Set(non_blank(request.notes)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    if let Some(contact_id) = request.contact_id {
        link_contact_in(conn, deal.id, contact_id, None).await?;
    }

    tracing::info!(deal_id = %deal.id, stage = deal.stage.as_str(), "Created deal");
    Ok(deal)
}

pub(crate) async fn link_contact_in<C>(
    conn: &C,
    deal_id: Uuid,
    contact_id: Uuid,
    role: Option<&str>,
) -> Result<deal_contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    Deal::find_by_id(deal_id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("deal", deal_id))?;

    let role = role
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_ROLE)
        .to_string();

    let existing = DealContact::find()
        .filter(deal_contact::Column::DealId.eq(deal_id))
        .filter(deal_contact::Column::ContactId.eq(contact_id))
        .one(conn)
        .await?;

    // Raises NotFound for a missing contact before the link is written.
    touch_activity_in(conn, contact_id).await?;

    let link = match existing {
        Some(link) if link.role == role => link,
        Some(link) => {
            let mut active = link.into_active_model();
            active.role = Set(role);
            active.update(conn).await?
        }
        None => deal_contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            deal_id: Set(deal_id),
            contact_id: Set(contact_id),
            role: Set(role),
            added_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await
        .map_err(CrmError::on_write(
            "deal contact",
            format!("{deal_id}/{contact_id}"),
        ))?,
    };

    sync_contact_value_in(conn, contact_id).await?;
    Ok(link)
}
