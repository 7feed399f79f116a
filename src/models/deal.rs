//! Deal entity model and pipeline stages
//!
//! A deal's `stage` and `actual_close_date` move together: the close date is
//! set exactly when the stage is closed. Only the pipeline state machine
//! writes either column.

use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CrmError;
use crate::money::Money;

/// Pipeline stage of a deal
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    #[sea_orm(string_value = "new_deal")]
    NewDeal,
    #[sea_orm(string_value = "proposal")]
    Proposal,
    #[sea_orm(string_value = "negotiation")]
    Negotiation,
    #[sea_orm(string_value = "closed_won")]
    ClosedWon,
    #[sea_orm(string_value = "closed_lost")]
    ClosedLost,
}

impl DealStage {
    /// Board order
    pub const ALL: [DealStage; 5] = [
        DealStage::NewDeal,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DealStage::NewDeal => "new_deal",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DealStage::NewDeal => "New Deal",
            DealStage::Proposal => "Proposal",
            DealStage::Negotiation => "Negotiation",
            DealStage::ClosedWon => "Closed Won",
            DealStage::ClosedLost => "Closed Lost",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

impl FromStr for DealStage {
    type Err = CrmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DealStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == value)
            .ok_or_else(|| CrmError::InvalidStage(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Deal value in cents; mirrors the linked quote's total after recalculation
    pub value_cents: i64,

    pub stage: DealStage,

    pub salesperson_id: Option<Uuid>,
    pub company_id: Option<Uuid>,

    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,

    /// How the customer says they found us
    pub reported_source: Option<String>,

    pub expected_close_date: Option<Date>,

    /// Set if and only if the stage is closed
    pub actual_close_date: Option<Date>,

    /// Free text, independent of the stage
    pub close_reason: Option<String>,

    pub notes: Option<String>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn value(&self) -> Money {
        Money::from_cents(self.value_cents)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(
        belongs_to = "super::salesperson::Entity",
        from = "Column::SalespersonId",
        to = "super::salesperson::Column::Id"
    )]
    Salesperson,
    #[sea_orm(has_many = "super::deal_contact::Entity")]
    DealContact,
    #[sea_orm(has_many = "super::quote::Entity")]
    Quote,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::salesperson::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Salesperson.def()
    }
}

impl Related<super::deal_contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DealContact.def()
    }
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        super::deal_contact::Relation::Contact.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::deal_contact::Relation::Deal.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_known_stage() {
        for stage in DealStage::ALL {
            assert_eq!(stage.as_str().parse::<DealStage>().unwrap(), stage);
        }
    }

    #[test]
    fn rejects_unknown_stage() {
        let err = "bogus_stage".parse::<DealStage>().unwrap_err();
        assert!(matches!(err, CrmError::InvalidStage(ref s) if s == "bogus_stage"));
        assert!("Closed_Won".parse::<DealStage>().is_err());
    }

    #[test]
    fn only_terminal_stages_are_closed() {
        let closed: Vec<_> = DealStage::ALL.into_iter().filter(|s| s.is_closed()).collect();
        assert_eq!(closed, vec![DealStage::ClosedWon, DealStage::ClosedLost]);
    }
}
