//! Test utilities for database testing.
//!
//! Sets up in-memory SQLite databases with migrations applied, plus small
//! fixtures for the entities most tests need.

use anyhow::Result;
use crm::models::{contact, deal, quote};
use crm::money::{Money, Percent, Quantity};
use crm::repositories::contact::CreateContactRequest;
use crm::repositories::deal::CreateDealRequest;
use crm::repositories::quote::{CreateQuoteItemRequest, CreateQuoteRequest};
use crm::repositories::{ContactRepository, DealRepository, QuoteRepository};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

#[allow(dead_code)]
pub fn dollars(whole: i64) -> Money {
    Money::from_cents(whole * 100)
}

#[allow(dead_code)]
pub fn percent(whole: i64) -> Percent {
    Percent::from_bps(whole * 100)
}

/// Inserts a contact named after the local part of `email`.
#[allow(dead_code)]
pub async fn create_test_contact(db: &DatabaseConnection, email: &str) -> Result<contact::Model> {
    let first_name = email.split('@').next().unwrap_or("Test").to_string();
    let contact = ContactRepository::new(db.clone())
        .create(CreateContactRequest {
            first_name,
            last_name: "Tester".to_string(),
            email: email.to_string(),
            ..Default::default()
        })
        .await?;
    Ok(contact)
}

/// Inserts an open deal with the given value, linked to `contacts`.
#[allow(dead_code)]
pub async fn create_test_deal(
    db: &DatabaseConnection,
    name: &str,
    value: Money,
    contacts: &[&contact::Model],
) -> Result<deal::Model> {
    let deals = DealRepository::new(db.clone());
    let deal = deals
        .create(CreateDealRequest {
            value,
            ..CreateDealRequest::new(name)
        })
        .await?;
    for contact in contacts {
        deals.add_contact(deal.id, contact.id, None).await?;
    }
    Ok(deal)
}

/// Inserts a quote on `deal` with discount and tax percentages and one line
/// item per `(quantity, unit_price)` pair.
#[allow(dead_code)]
pub async fn create_test_quote(
    db: &DatabaseConnection,
    deal: &deal::Model,
    discount: Percent,
    tax: Percent,
    items: &[(i64, Money)],
) -> Result<quote::Model> {
    let quotes = QuoteRepository::new(db.clone());
    let quote = quotes
        .create(CreateQuoteRequest {
            title: Some(format!("Quote for {}", deal.name)),
            deal_id: Some(deal.id),
            discount,
            tax,
            ..Default::default()
        })
        .await?;

    for (index, (quantity, unit_price)) in items.iter().enumerate() {
        quotes
            .add_item(
                quote.id,
                CreateQuoteItemRequest {
                    product_name: Some(format!("Item {}", index + 1)),
                    quantity: Quantity::from_milli(quantity * 1000),
                    unit_price: Some(*unit_price),
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok(quotes
        .get(quote.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("quote vanished"))?)
}
