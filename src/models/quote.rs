//! Quote entity model
//!
//! `subtotal_cents`, `discount_amount_cents`, `tax_amount_cents` and
//! `total_cents` are derived from the quote's line items and its two
//! percentages. They are written only by the aggregation engine.

use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::CrmError;
use crate::money::{Money, Percent};

/// Document lifecycle of a quote; independent of the deal pipeline
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "invoiced")]
    Invoiced,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "declined")]
    Declined,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 7] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Invoiced,
        QuoteStatus::Paid,
        QuoteStatus::Declined,
        QuoteStatus::Expired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Invoiced => "invoiced",
            QuoteStatus::Paid => "paid",
            QuoteStatus::Declined => "declined",
            QuoteStatus::Expired => "expired",
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = CrmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        QuoteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| CrmError::validation(format!("unknown quote status '{value}'")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// `<prefix>-<year>-<sequence>` (unique)
    #[sea_orm(unique)]
    pub quote_number: String,

    pub title: Option<String>,
    pub status: QuoteStatus,

    pub deal_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,

    /// Snapshot of the salesperson at quote creation
    pub salesperson_name: Option<String>,
    pub salesperson_email: Option<String>,
    pub salesperson_phone: Option<String>,

    /// Snapshot of the customer at quote creation
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,

    pub subtotal_cents: i64,
    pub discount_bps: i64,
    pub discount_amount_cents: i64,
    pub tax_bps: i64,
    pub tax_amount_cents: i64,
    pub total_cents: i64,

    pub quote_date: Option<Date>,
    pub expiry_date: Option<Date>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub payment_link: Option<String>,

    /// Stamped when the status first becomes `paid`
    pub payment_date: Option<Date>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    pub fn discount_percent(&self) -> Percent {
        Percent::from_bps(self.discount_bps)
    }

    pub fn discount_amount(&self) -> Money {
        Money::from_cents(self.discount_amount_cents)
    }

    pub fn tax_percent(&self) -> Percent {
        Percent::from_bps(self.tax_bps)
    }

    pub fn tax_amount(&self) -> Money {
        Money::from_cents(self.tax_amount_cents)
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::deal::Entity",
        from = "Column::DealId",
        to = "super::deal::Column::Id"
    )]
    Deal,
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    #[sea_orm(has_many = "super::quote_item::Entity")]
    QuoteItem,
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::quote_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuoteItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
