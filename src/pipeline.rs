//! # Pipeline State Machine
//!
//! A deal may move between any two of the five stages. Entering a closed
//! stage stamps `actual_close_date` (today unless the caller supplies one);
//! entering an open stage clears it. Whenever `closed_won` is entered or left
//! the linked contacts are re-summed, so reopening a won deal removes its value
//! from their aggregates.

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::aggregation::sync_contact_value_for_deal_in;
use crate::error::CrmError;
use crate::models::{Deal, DealStage, contact, deal};

/// Today's date in UTC; the date every automatic stamp uses.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Result of a stage transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub deal: deal::Model,
    pub previous_stage: DealStage,
    /// Contacts whose aggregate was recomputed; empty unless `closed_won`
    /// was entered or left.
    pub resynced_contacts: Vec<contact::Model>,
}

impl TransitionOutcome {
    pub fn changed_stage(&self) -> bool {
        self.previous_stage != self.deal.stage
    }
}

#[derive(Clone)]
pub struct PipelineService {
    db: DatabaseConnection,
}

impl PipelineService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Moves a deal to `new_stage`.
    ///
    /// The stage name is validated before anything is read or written, so an
    /// unknown name leaves the deal untouched.
    pub async fn transition(
        &self,
        deal_id: Uuid,
        new_stage: &str,
        close_date: Option<NaiveDate>,
    ) -> Result<TransitionOutcome, CrmError> {
        let stage: DealStage = new_stage.parse()?;

        let txn = self.db.begin().await?;
        let outcome = transition_in(&txn, deal_id, stage, close_date).await?;
        txn.commit().await?;

        Ok(outcome)
    }

    /// Sets or clears the free-text close reason. Not tied to the stage.
    pub async fn set_close_reason(
        &self,
        deal_id: Uuid,
        reason: Option<String>,
    ) -> Result<deal::Model, CrmError> {
        let deal = Deal::find_by_id(deal_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("deal", deal_id))?;

        let mut active = deal.into_active_model();
        active.close_reason = Set(reason.filter(|r| !r.trim().is_empty()));
        active.updated_at = Set(Utc::now().fixed_offset());
        Ok(active.update(&self.db).await?)
    }
}

/// Transition on a caller-supplied connection (usually an open transaction).
pub async fn transition_in<C>(
    conn: &C,
    deal_id: Uuid,
    stage: DealStage,
    close_date: Option<NaiveDate>,
) -> Result<TransitionOutcome, CrmError>
where
    C: ConnectionTrait,
{
    let deal = Deal::find_by_id(deal_id)
        .one(conn)
        .await?
        .ok_or_else(|| CrmError::not_found("deal", deal_id))?;
    let previous_stage = deal.stage;

    if previous_stage == stage && close_date.is_none() {
        return Ok(TransitionOutcome {
            deal,
            previous_stage,
            resynced_contacts: Vec::new(),
        });
    }

    let actual_close_date = if stage.is_closed() {
        Some(close_date.unwrap_or_else(today))
    } else {
        None
    };

    let mut active = deal.into_active_model();
    active.stage = Set(stage);
    active.actual_close_date = Set(actual_close_date);
    active.updated_at = Set(Utc::now().fixed_offset());
    let deal = active.update(conn).await?;

    let resynced_contacts =
        if previous_stage == DealStage::ClosedWon || stage == DealStage::ClosedWon {
            sync_contact_value_for_deal_in(conn, deal_id).await?
        } else {
            Vec::new()
        };

    counter!("crm_deal_transitions_total", "stage" => stage.as_str()).increment(1);
    tracing::info!(
        deal_id = %deal_id,
        from = previous_stage.as_str(),
        to = stage.as_str(),
        close_date = ?deal.actual_close_date,
        contacts_resynced = resynced_contacts.len(),
        "Deal stage changed"
    );

    Ok(TransitionOutcome {
        deal,
        previous_stage,
        resynced_contacts,
    })
}
