//! # Aggregation Engine
//!
//! Keeps the derived columns consistent after writes:
//!
//! - quote `subtotal`/`discount_amount`/`tax_amount`/`total` from its line items,
//! - deal `value` from its quote's total,
//! - contact `deal_value` from the contact's `closed_won` deals.
//!
//! Every pass re-derives from source rows; nothing is patched incrementally.
//! The `*_in` functions run on any [`ConnectionTrait`] so services can compose
//! them into their own transaction. The methods on [`AggregationEngine`] open
//! and commit a transaction of their own.

pub mod totals;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use metrics::{counter, histogram};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::error::CrmError;
use crate::models::{
    Contact, Deal, DealContact, DealStage, Quote, QuoteItem, contact, deal, deal_contact, quote,
    quote_item,
};
use crate::money::{Money, MoneyError};

pub use totals::{QuoteTotals, line_total};

/// Outcome of a full contact backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub contacts_scanned: usize,
    pub contacts_updated: usize,
}

/// Entry point for callers that want each aggregation pass in its own transaction.
#[derive(Clone)]
pub struct AggregationEngine {
    db: DatabaseConnection,
}

impl AggregationEngine {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Recomputes a quote's totals and mirrors the total onto its deal.
    pub async fn recalculate_quote_totals(&self, quote_id: Uuid) -> Result<quote::Model, CrmError> {
        let txn = self.db.begin().await?;
        let quote = recalculate_quote_totals_in(&txn, quote_id).await?;
        txn.commit().await?;
        Ok(quote)
    }

    /// Re-sums `deal_value` for every contact linked to the deal.
    pub async fn sync_contact_value_for_deal(
        &self,
        deal_id: Uuid,
    ) -> Result<Vec<contact::Model>, CrmError> {
        let txn = self.db.begin().await?;
        let contacts = sync_contact_value_for_deal_in(&txn, deal_id).await?;
        txn.commit().await?;
        Ok(contacts)
    }

    /// Re-sums `deal_value` for every contact. Used for backfills and repairs.
    pub async fn sync_all_contact_values(&self) -> Result<SyncReport, CrmError> {
        let txn = self.db.begin().await?;
        let report = sync_all_contact_values_in(&txn).await?;
        txn.commit().await?;
        Ok(report)
    }
}

/// Recomputes the quote's derived amounts from its current line items.
///
/// Fails with `NotFound` before writing anything if the quote is missing. On
/// Postgres the quote row is locked for the rest of the transaction so
/// concurrent recalculations of one quote serialize.
pub async fn recalculate_quote_totals_in<C>(
    conn: &C,
    quote_id: Uuid,
) -> Result<quote::Model, CrmError>
where
    C: ConnectionTrait,
{
    let started = Instant::now();

    let mut select = Quote::find_by_id(quote_id);
    if conn.get_database_backend() == DbBackend::Postgres {
        select = select.lock_exclusive();
    }
    let quote = select
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("quote", quote_id))?;

    let items = QuoteItem::find()
        .filter(quote_item::Column::QuoteId.eq(quote_id))
        .all(conn)
        .await?;

    let totals = QuoteTotals::compute(
        items.iter().map(quote_item::Model::line_total),
        quote.discount_percent(),
        quote.tax_percent(),
    )?;

    let deal_id = quote.deal_id;
    let mut active = quote.into_active_model();
    active.subtotal_cents = Set(totals.subtotal.cents());
    active.discount_amount_cents = Set(totals.discount_amount.cents());
    active.tax_amount_cents = Set(totals.tax_amount.cents());
    active.total_cents = Set(totals.total.cents());
    active.updated_at = Set(Utc::now().fixed_offset());
    let quote = active.update(conn).await?;

    if let Some(deal_id) = deal_id {
        apply_quote_total_to_deal(conn, deal_id, totals.total).await?;
    }

    counter!("crm_quote_recalculations_total").increment(1);
    histogram!("crm_quote_recalculation_seconds").record(started.elapsed().as_secs_f64());
    tracing::debug!(
        quote_id = %quote_id,
        items = items.len(),
        subtotal = %totals.subtotal,
        total = %totals.total,
        "Recalculated quote totals"
    );

    Ok(quote)
}

async fn apply_quote_total_to_deal<C>(conn: &C, deal_id: Uuid, total: Money) -> Result<(), CrmError>
where
    C: ConnectionTrait,
{
    let Some(deal) = Deal::find_by_id(deal_id).one(conn).await? else {
        tracing::warn!(deal_id = %deal_id, "Quote references a missing deal; skipping value update");
        return Ok(());
    };

    let is_won = deal.stage == DealStage::ClosedWon;
    if deal.value_cents != total.cents() {
        let mut active = deal.into_active_model();
        active.value_cents = Set(total.cents());
        active.updated_at = Set(Utc::now().fixed_offset());
        active.update(conn).await?;
    }

    // A won deal's value feeds its contacts' aggregates.
    if is_won {
        sync_contact_value_for_deal_in(conn, deal_id).await?;
    }

    Ok(())
}

/// Re-sums `deal_value` for every contact linked to `deal_id`.
pub async fn sync_contact_value_for_deal_in<C>(
    conn: &C,
    deal_id: Uuid,
) -> Result<Vec<contact::Model>, CrmError>
where
    C: ConnectionTrait,
{
    let deal = Deal::find_by_id(deal_id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("deal", deal_id))?;

    let links = deal.find_related(DealContact).all(conn).await?;

    let mut contacts = Vec::with_capacity(links.len());
    for link in links {
        contacts.push(sync_contact_value_in(conn, link.contact_id).await?);
    }

    tracing::debug!(
        deal_id = %deal_id,
        contacts = contacts.len(),
        "Synced contact deal values"
    );

    Ok(contacts)
}

/// Re-sums one contact's `deal_value` and `deal_closed_date` over its won deals.
pub async fn sync_contact_value_in<C>(conn: &C, contact_id: Uuid) -> Result<contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    let contact = Contact::find_by_id(contact_id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("contact", contact_id))?;

    let won = contact
        .find_related(Deal)
        .filter(deal::Column::Stage.eq(DealStage::ClosedWon))
        .all(conn)
        .await?;

    let (value, closed_date) = won_summary(won.iter())?;
    counter!("crm_contact_value_syncs_total").increment(1);

    store_contact_summary(conn, contact, value, closed_date).await
}

/// Re-sums every contact in one pass over the won deals and links.
pub async fn sync_all_contact_values_in<C>(conn: &C) -> Result<SyncReport, CrmError>
where
    C: ConnectionTrait,
{
    let won: HashMap<Uuid, deal::Model> = Deal::find()
        .filter(deal::Column::Stage.eq(DealStage::ClosedWon))
        .all(conn)
        .await?
        .into_iter()
        .map(|deal| (deal.id, deal))
        .collect();

    let won_ids: Vec<Uuid> = won.keys().copied().collect();
    let mut won_by_contact: HashMap<Uuid, Vec<&deal::Model>> = HashMap::new();
    if !won_ids.is_empty() {
        let links = DealContact::find()
            .filter(deal_contact::Column::DealId.is_in(won_ids))
            .all(conn)
            .await?;
        for link in links {
            if let Some(deal) = won.get(&link.deal_id) {
                won_by_contact.entry(link.contact_id).or_default().push(deal);
            }
        }
    }

    let contacts = Contact::find().all(conn).await?;
    let mut report = SyncReport {
        contacts_scanned: contacts.len(),
        contacts_updated: 0,
    };

    for contact in contacts {
        let deals = won_by_contact.remove(&contact.id).unwrap_or_default();
        let (value, closed_date) = won_summary(deals.into_iter())?;

        if contact.deal_value_cents != value.cents() || contact.deal_closed_date != closed_date {
            store_contact_summary(conn, contact, value, closed_date).await?;
            report.contacts_updated += 1;
        }
    }

    counter!("crm_contact_value_syncs_total").increment(report.contacts_scanned as u64);
    tracing::info!(
        contacts_scanned = report.contacts_scanned,
        contacts_updated = report.contacts_updated,
        "Synced all contact deal values"
    );

    Ok(report)
}

fn won_summary<'a, I>(mut deals: I) -> Result<(Money, Option<NaiveDate>), MoneyError>
where
    I: Iterator<Item = &'a deal::Model>,
{
    deals.try_fold((Money::ZERO, None), |(value, latest), deal| {
        Ok((
            value.checked_add(deal.value())?,
            latest.max(deal.actual_close_date),
        ))
    })
}

async fn store_contact_summary<C>(
    conn: &C,
    contact: contact::Model,
    value: Money,
    closed_date: Option<NaiveDate>,
) -> Result<contact::Model, CrmError>
where
    C: ConnectionTrait,
{
    if contact.deal_value_cents == value.cents() && contact.deal_closed_date == closed_date {
        return Ok(contact);
    }

    let mut active = contact.into_active_model();
    active.deal_value_cents = Set(value.cents());
    active.deal_closed_date = Set(closed_date);
    Ok(active.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn won_deal(cents: i64, closed: Option<NaiveDate>) -> deal::Model {
        let now = Utc::now().fixed_offset();
        deal::Model {
            id: Uuid::new_v4(),
            name: "Deal".to_string(),
            value_cents: cents,
            stage: DealStage::ClosedWon,
            salesperson_id: None,
            company_id: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            reported_source: None,
            expected_close_date: None,
            actual_close_date: closed,
            close_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn won_summary_sums_values_and_keeps_latest_date() {
        let early = NaiveDate::from_ymd_opt(2024, 1, 5);
        let late = NaiveDate::from_ymd_opt(2024, 3, 9);
        let deals = [won_deal(1_000_000, early), won_deal(250_050, late)];

        let (value, closed) = won_summary(deals.iter()).unwrap();
        assert_eq!(value, Money::from_cents(1_250_050));
        assert_eq!(closed, late);
    }

    #[test]
    fn won_summary_of_nothing_is_zero() {
        let (value, closed) = won_summary(std::iter::empty()).unwrap();
        assert_eq!(value, Money::ZERO);
        assert_eq!(closed, None);
    }

    #[test]
    fn won_summary_reports_overflow() {
        let deals = [won_deal(i64::MAX, None), won_deal(1, None)];

        let result = won_summary(deals.iter());

        assert_eq!(result, Err(MoneyError::Overflow));
    }
}
