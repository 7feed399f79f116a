//! Contact entity model
//!
//! A lead or customer. `deal_value_cents` is derived: it always equals the sum
//! of `value_cents` over the `closed_won` deals the contact is linked to, and
//! is only ever written by the aggregation engine.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use crate::money::Money;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub first_name: String,
    pub last_name: String,

    /// Identity of the contact (unique)
    #[sea_orm(unique)]
    pub email: String,

    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,

    /// Marketing attribution captured at lead creation
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub landing_page: Option<String>,
    pub referrer: Option<String>,

    pub notes: Option<String>,

    /// Sum of the contact's won deals, in cents (derived)
    pub deal_value_cents: i64,

    /// Latest close date among the contact's won deals (derived)
    pub deal_closed_date: Option<Date>,

    /// Last time anything touched this contact
    pub last_activity_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn deal_value(&self) -> Money {
        Money::from_cents(self.deal_value_cents)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
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
    #[sea_orm(has_many = "super::deal_contact::Entity")]
    DealContact,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::deal_contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DealContact.def()
    }
}

impl Related<super::deal::Entity> for Entity {
    fn to() -> RelationDef {
        super::deal_contact::Relation::Deal.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::deal_contact::Relation::Contact.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
