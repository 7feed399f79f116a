//! # Pipeline Analytics
//!
//! Read-only views over the deal table. Date ranges are interpreted per
//! stage: open deals are matched on the day they were created, closed deals
//! on their `actual_close_date`. Both bounds are inclusive.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::error::CrmError;
use crate::models::{Contact, Deal, DealContact, DealStage, deal, deal_contact};
use crate::money::{Money, MoneyError};

/// Filters shared by the board and the summary
#[derive(Debug, Clone, Default)]
pub struct PipelineFilter {
    pub salesperson_id: Option<Uuid>,
    /// Restrict to one stage
    pub stage: Option<DealStage>,
    /// Substring match on the deal name
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl PipelineFilter {
    /// The date the range is checked against for this deal.
    fn reporting_date(deal: &deal::Model) -> Option<NaiveDate> {
        if deal.stage.is_closed() {
            deal.actual_close_date
        } else {
            Some(deal.created_at.date_naive())
        }
    }

    fn in_range(&self, deal: &deal::Model) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(date) = Self::reporting_date(deal) else {
            return false;
        };
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }
}

/// A deal as shown on the board
#[derive(Debug, Clone)]
pub struct BoardDeal {
    pub deal: deal::Model,
    /// Full names of the linked contacts
    pub contact_names: Vec<String>,
}

/// Per-stage tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTotals {
    pub count: u64,
    pub value: Money,
}

/// Headline deal numbers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DealSummary {
    pub won_value: Money,
    pub won_count: u64,
    pub lost_count: u64,
    /// Won share of closed deals, percent with one decimal
    pub win_rate: Decimal,
    /// Mean value of won deals
    pub average_won_value: Money,
    /// Value of deals still open
    pub pipeline_value: Money,
    pub total_deals: u64,
    pub by_stage: BTreeMap<DealStage, StageTotals>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: DatabaseConnection,
}

impl AnalyticsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Deals grouped by stage, most recently updated first. Every stage is
    /// present in the result, empty when nothing matches.
    pub async fn pipeline_board(
        &self,
        filter: &PipelineFilter,
    ) -> Result<BTreeMap<DealStage, Vec<BoardDeal>>, CrmError> {
        let deals = self.load(filter).await?;

        let ids: Vec<Uuid> = deals.iter().map(|d| d.id).collect();
        let mut names: HashMap<Uuid, Vec<String>> = HashMap::new();
        if !ids.is_empty() {
            let links = DealContact::find()
                .filter(deal_contact::Column::DealId.is_in(ids))
                .find_also_related(Contact)
                .order_by_asc(deal_contact::Column::AddedAt)
                .all(&self.db)
                .await?;
            for (link, contact) in links {
                if let Some(contact) = contact {
                    names.entry(link.deal_id).or_default().push(contact.full_name());
                }
            }
        }

        let mut board: BTreeMap<DealStage, Vec<BoardDeal>> =
            DealStage::ALL.into_iter().map(|s| (s, Vec::new())).collect();
        for deal in deals {
            let contact_names = names.remove(&deal.id).unwrap_or_default();
            board
                .entry(deal.stage)
                .or_default()
                .push(BoardDeal { deal, contact_names });
        }

        Ok(board)
    }

    pub async fn deal_summary(&self, filter: &PipelineFilter) -> Result<DealSummary, CrmError> {
        let deals = self.load(filter).await?;
        Ok(summarize(&deals)?)
    }

    /// Deals matching the filter, ordered by `updated_at` descending.
    async fn load(&self, filter: &PipelineFilter) -> Result<Vec<deal::Model>, CrmError> {
        let mut select = Deal::find();
        if let Some(salesperson_id) = filter.salesperson_id {
            select = select.filter(deal::Column::SalespersonId.eq(salesperson_id));
        }
        if let Some(stage) = filter.stage {
            select = select.filter(deal::Column::Stage.eq(stage));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            select = select.filter(deal::Column::Name.like(format!("%{}%", search.trim())));
        }

        let deals = select
            .order_by_desc(deal::Column::UpdatedAt)
            .all(&self.db)
            .await?;

        Ok(deals.into_iter().filter(|d| filter.in_range(d)).collect())
    }
}

/// Tallies already-filtered deals.
pub fn summarize(deals: &[deal::Model]) -> Result<DealSummary, MoneyError> {
    let mut summary = DealSummary {
        by_stage: DealStage::ALL
            .into_iter()
            .map(|s| (s, StageTotals::default()))
            .collect(),
        ..DealSummary::default()
    };

    for deal in deals {
        let tally = summary.by_stage.entry(deal.stage).or_default();
        tally.count += 1;
        tally.value = tally.value.checked_add(deal.value())?;

        match deal.stage {
            DealStage::ClosedWon => {
                summary.won_count += 1;
                summary.won_value = summary.won_value.checked_add(deal.value())?;
            }
            DealStage::ClosedLost => summary.lost_count += 1,
            _ => summary.pipeline_value = summary.pipeline_value.checked_add(deal.value())?,
        }
    }

    summary.total_deals = deals.len() as u64;
    summary.win_rate = win_rate(summary.won_count, summary.lost_count);
    if summary.won_count > 0 {
        let mean = summary.won_value.to_decimal() / Decimal::from(summary.won_count);
        summary.average_won_value = Money::from_decimal(mean)?;
    }

    Ok(summary)
}

fn win_rate(won: u64, lost: u64) -> Decimal {
    let closed = won + lost;
    if closed == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(won) * Decimal::ONE_HUNDRED / Decimal::from(closed))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sample_deal(stage: DealStage, cents: i64, created: NaiveDate, closed: Option<NaiveDate>) -> deal::Model {
        let created_at = Utc
            .from_utc_datetime(&created.and_hms_opt(15, 30, 0).unwrap())
            .fixed_offset();
        deal::Model {
            id: Uuid::new_v4(),
            name: "Deal".to_string(),
            value_cents: cents,
            stage,
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
            created_at,
            updated_at: created_at,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn summary_splits_won_lost_and_open() {
        let deals = vec![
            sample_deal(DealStage::ClosedWon, 1_000_000, date(2025, 1, 1), Some(date(2025, 2, 1))),
            sample_deal(DealStage::ClosedWon, 500_000, date(2025, 1, 1), Some(date(2025, 2, 3))),
            sample_deal(DealStage::ClosedLost, 700_000, date(2025, 1, 1), Some(date(2025, 2, 4))),
            sample_deal(DealStage::Proposal, 250_000, date(2025, 2, 1), None),
        ];

        let summary = summarize(&deals).unwrap();
        assert_eq!(summary.won_count, 2);
        assert_eq!(summary.won_value, Money::from_cents(1_500_000));
        assert_eq!(summary.lost_count, 1);
        assert_eq!(summary.win_rate, dec!(66.7));
        assert_eq!(summary.average_won_value, Money::from_cents(750_000));
        assert_eq!(summary.pipeline_value, Money::from_cents(250_000));
        assert_eq!(summary.total_deals, 4);
        assert_eq!(summary.by_stage[&DealStage::Proposal].count, 1);
        assert_eq!(summary.by_stage[&DealStage::NewDeal].count, 0);
    }

    #[test]
    fn win_rate_without_closed_deals_is_zero() {
        assert_eq!(win_rate(0, 0), Decimal::ZERO);
        assert_eq!(win_rate(1, 0), dec!(100));
        assert_eq!(win_rate(1, 2), dec!(33.3));
    }

    #[test]
    fn open_deals_use_created_day_closed_deals_use_close_date() {
        let filter = PipelineFilter {
            date_from: Some(date(2025, 3, 1)),
            date_to: Some(date(2025, 3, 31)),
            ..Default::default()
        };

        // Created before the range but closed inside it.
        let won = sample_deal(DealStage::ClosedWon, 100, date(2025, 1, 10), Some(date(2025, 3, 5)));
        assert!(filter.in_range(&won));

        // Created on the last day of the range, late in the day.
        let open = sample_deal(DealStage::NewDeal, 100, date(2025, 3, 31), None);
        assert!(filter.in_range(&open));

        // Created inside the range but closed after it.
        let lost = sample_deal(DealStage::ClosedLost, 100, date(2025, 3, 2), Some(date(2025, 4, 1)));
        assert!(!filter.in_range(&lost));
    }

    #[test]
    fn closed_deal_without_date_is_outside_any_range() {
        let filter = PipelineFilter {
            date_from: Some(date(2025, 1, 1)),
            ..Default::default()
        };
        let legacy = sample_deal(DealStage::ClosedWon, 100, date(2025, 2, 1), None);
        assert!(!filter.in_range(&legacy));
        assert!(PipelineFilter::default().in_range(&legacy));
    }
}
