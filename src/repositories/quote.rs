//! # Quote Repository
//!
//! Quotes and their line items. Creating a quote snapshots the salesperson
//! and customer, and provisions a `new_deal` deal when none is given. Every
//! line item write is followed, in the same transaction, by a recalculation
//! of the quote totals (which in turn moves the linked deal's value).

use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use super::contact::touch_activity_in;
use super::deal::{CreateDealRequest, create_in as create_deal_in};
use super::{apply, non_blank};
use crate::aggregation::{line_total, recalculate_quote_totals_in};
use crate::error::CrmError;
use crate::models::{
    Company, Deal, Product, Quote, QuoteItem, QuoteStatus, Salesperson, quote, quote_item,
};
use crate::money::{Money, Percent, Quantity};
use crate::pipeline::today;

pub const DEFAULT_NUMBER_PREFIX: &str = "Q";

/// Request data for creating a quote
#[derive(Debug, Clone)]
pub struct CreateQuoteRequest {
    pub title: Option<String>,
    pub deal_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub salesperson_id: Option<Uuid>,
    /// Explicit customer fields win over the contact/company snapshot
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,
    pub discount: Percent,
    pub tax: Percent,
    pub quote_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    /// Provision a deal when `deal_id` is absent
    pub auto_create_deal: bool,
    /// Attribution copied onto an auto-created deal
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub reported_source: Option<String>,
}

impl Default for CreateQuoteRequest {
    fn default() -> Self {
        Self {
            title: None,
            deal_id: None,
            contact_id: None,
            company_id: None,
            salesperson_id: None,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            customer_company: None,
            discount: Percent::ZERO,
            tax: Percent::ZERO,
            quote_date: None,
            expiry_date: None,
            notes: None,
            terms: None,
            auto_create_deal: true,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            reported_source: None,
        }
    }
}

/// Partial update for a quote
#[derive(Debug, Clone, Default)]
pub struct UpdateQuoteRequest {
    pub title: Option<Option<String>>,
    pub deal_id: Option<Option<Uuid>>,
    pub contact_id: Option<Option<Uuid>>,
    pub company_id: Option<Option<Uuid>>,
    pub customer_name: Option<Option<String>>,
    pub customer_email: Option<Option<String>>,
    pub customer_phone: Option<Option<String>>,
    pub customer_company: Option<Option<String>>,
    pub discount: Option<Percent>,
    pub tax: Option<Percent>,
    pub quote_date: Option<Option<NaiveDate>>,
    pub expiry_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
    pub terms: Option<Option<String>>,
    pub payment_link: Option<Option<String>>,
    /// Becoming `paid` for the first time stamps the payment date
    pub status: Option<QuoteStatus>,
}

/// Request data for adding a line item
#[derive(Debug, Clone, Default)]
pub struct CreateQuoteItemRequest {
    /// Catalog product; fills whichever of name, SKU, description and price
    /// the request leaves empty
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub quantity: Quantity,
    pub unit_price: Option<Money>,
    pub discount: Percent,
    /// Defaults to the end of the list
    pub sort_order: Option<i32>,
}

/// Partial update for a line item
#[derive(Debug, Clone, Default)]
pub struct UpdateQuoteItemRequest {
    pub product_name: Option<String>,
    pub sku: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub quantity: Option<Quantity>,
    pub unit_price: Option<Money>,
    pub discount: Option<Percent>,
    pub sort_order: Option<i32>,
}

/// A quote with its line items in display order
#[derive(Debug, Clone)]
pub struct QuoteWithItems {
    pub quote: quote::Model,
    pub items: Vec<quote_item::Model>,
}

/// Repository for quote and line item database operations
#[derive(Debug, Clone)]
pub struct QuoteRepository {
    db: DatabaseConnection,
    number_prefix: String,
}

impl QuoteRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
        }
    }

    /// Use `prefix` for newly generated quote numbers
    pub fn with_number_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.number_prefix = prefix.into();
        self
    }

    /// Create a quote in `draft` status.
    ///
    /// Totals start at zero; they are computed as items are added.
    pub async fn create(&self, request: CreateQuoteRequest) -> Result<quote::Model, CrmError> {
        validate_percent("Discount", request.discount)?;
        validate_percent("Tax", request.tax)?;

        let txn = self.db.begin().await?;

        let quote_number = next_quote_number(&txn, &self.number_prefix, today().year()).await?;

        let (salesperson_name, salesperson_email, salesperson_phone) =
            match request.salesperson_id {
                Some(id) => {
                    let salesperson = Salesperson::find_by_id(id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| CrmError::not_found("salesperson", id))?;
                    (
                        Some(salesperson.name),
                        salesperson.email,
                        salesperson.phone,
                    )
                }
                None => (None, None, None),
            };

        let mut customer_company = non_blank(request.customer_company);
        if let Some(id) = request.company_id {
            let company = Company::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| CrmError::not_found("company", id))?;
            customer_company.get_or_insert(company.name);
        }

        let mut customer_name = non_blank(request.customer_name);
        let mut customer_email = non_blank(request.customer_email);
        let mut customer_phone = non_blank(request.customer_phone);
        if let Some(id) = request.contact_id {
            let contact = touch_activity_in(&txn, id).await?;
            if customer_name.is_none() {
                customer_name = non_blank(Some(contact.full_name()));
                customer_email = customer_email.or(Some(contact.email));
                customer_phone = customer_phone.or(contact.phone);
            }
        }

        let title = non_blank(request.title);

        let deal_id = match request.deal_id {
            Some(id) => {
                Deal::find_by_id(id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| CrmError::not_found("deal", id))?;
                Some(id)
            }
            None if request.auto_create_deal => {
                let name = customer_company
                    .clone()
                    .or_else(|| title.clone())
                    .unwrap_or_else(|| format!("Quote {quote_number}"));
                let deal = create_deal_in(
                    &txn,
                    CreateDealRequest {
                        salesperson_id: request.salesperson_id,
                        company_id: request.company_id,
                        contact_id: request.contact_id,
                        utm_source: request.utm_source,
                        utm_medium: request.utm_medium,
                        utm_campaign: request.utm_campaign,
                        reported_source: request.reported_source,
                        ..CreateDealRequest::new(name)
                    },
                )
                .await?;
                Some(deal.id)
            }
            None => None,
        };

        let now = Utc::now().fixed_offset();
        let quote = quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            quote_number: Set(quote_number.clone()),
            title: Set(title),
            status: Set(QuoteStatus::Draft),
            deal_id: Set(deal_id),
            contact_id: Set(request.contact_id),
            company_id: Set(request.company_id),
            salesperson_id: Set(request.salesperson_id),
            salesperson_name: Set(salesperson_name),
            salesperson_email: Set(salesperson_email),
            salesperson_phone: Set(salesperson_phone),
            customer_name: Set(customer_name),
            customer_email: Set(customer_email),
            customer_phone: Set(customer_phone),
            customer_company: Set(customer_company),
            subtotal_cents: Set(0),
            discount_bps: Set(request.discount.bps()),
            discount_amount_cents: Set(0),
            tax_bps: Set(request.tax.bps()),
            tax_amount_cents: Set(0),
            total_cents: Set(0),
            quote_date: Set(Some(request.quote_date.unwrap_or_else(today))),
            expiry_date: Set(request.expiry_date),
            notes: Set(non_blank(request.notes)),
            terms: Set(non_blank(request.terms)),
            payment_link: Set(None),
            payment_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(CrmError::on_write("quote", quote_number))?;

        txn.commit().await?;

        tracing::info!(
            quote_id = %quote.id,
            quote_number = %quote.quote_number,
            deal_id = ?quote.deal_id,
            "Created quote"
        );
        Ok(quote)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<quote::Model>, CrmError> {
        Ok(Quote::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get_with_items(&self, id: Uuid) -> Result<Option<QuoteWithItems>, CrmError> {
        let Some(quote) = Quote::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let items = quote
            .find_related(QuoteItem)
            .order_by_asc(quote_item::Column::SortOrder)
            .order_by_asc(quote_item::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(Some(QuoteWithItems { quote, items }))
    }

    /// Quotes, newest first, optionally filtered by status and salesperson.
    pub async fn list(
        &self,
        status: Option<QuoteStatus>,
        salesperson_id: Option<Uuid>,
    ) -> Result<Vec<quote::Model>, CrmError> {
        let mut select = Quote::find();
        if let Some(status) = status {
            select = select.filter(quote::Column::Status.eq(status));
        }
        if let Some(salesperson_id) = salesperson_id {
            select = select.filter(quote::Column::SalespersonId.eq(salesperson_id));
        }
        Ok(select
            .order_by_desc(quote::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn quotes_for_deal(&self, deal_id: Uuid) -> Result<Vec<quote::Model>, CrmError> {
        Ok(Quote::find()
            .filter(quote::Column::DealId.eq(deal_id))
            .order_by_desc(quote::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Apply a partial update. Changing either percentage or the linked deal
    /// recalculates the totals.
    ///
    /// A deal the quote is moved away from keeps its current value, as it
    /// does when the quote is deleted.
    pub async fn update(&self, id: Uuid, request: UpdateQuoteRequest) -> Result<quote::Model, CrmError> {
        if let Some(discount) = request.discount {
            validate_percent("Discount", discount)?;
        }
        if let Some(tax) = request.tax {
            validate_percent("Tax", tax)?;
        }

        let txn = self.db.begin().await?;

        let quote = Quote::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| CrmError::not_found("quote", id))?;

        if let Some(Some(deal_id)) = request.deal_id {
            Deal::find_by_id(deal_id)
                .one(&txn)
                .await?
                .ok_or_else(|| CrmError::not_found("deal", deal_id))?;
        }

        let needs_recalculation = request
            .discount
            .is_some_and(|d| d.bps() != quote.discount_bps)
            || request.tax.is_some_and(|t| t.bps() != quote.tax_bps)
            || request.deal_id.is_some_and(|d| d != quote.deal_id);
        let status_change = request.status.filter(|status| *status != quote.status);
        let stamp_payment =
            status_change == Some(QuoteStatus::Paid) && quote.payment_date.is_none();

        let mut active = quote.into_active_model();
        apply(&mut active.title, request.title);
        apply(&mut active.deal_id, request.deal_id);
        apply(&mut active.contact_id, request.contact_id);
        apply(&mut active.company_id, request.company_id);
        apply(&mut active.customer_name, request.customer_name);
        apply(&mut active.customer_email, request.customer_email);
        apply(&mut active.customer_phone, request.customer_phone);
        apply(&mut active.customer_company, request.customer_company);
        apply(&mut active.discount_bps, request.discount.map(Percent::bps));
        apply(&mut active.tax_bps, request.tax.map(Percent::bps));
        apply(&mut active.quote_date, request.quote_date);
        apply(&mut active.expiry_date, request.expiry_date);
        apply(&mut active.notes, request.notes);
        apply(&mut active.terms, request.terms);
        apply(&mut active.payment_link, request.payment_link);
        apply(&mut active.status, status_change);
        if stamp_payment {
            active.payment_date = Set(Some(today()));
        }
        active.updated_at = Set(Utc::now().fixed_offset());
        let mut quote = active.update(&txn).await?;

        if needs_recalculation {
            quote = recalculate_quote_totals_in(&txn, id).await?;
        }

        txn.commit().await?;
        if let Some(status) = status_change {
            tracing::info!(quote_id = %id, status = status.as_str(), "Quote status changed");
        }
        Ok(quote)
    }

    /// Move the quote through its document lifecycle. The first time it
    /// becomes `paid` the payment date is stamped.
    pub async fn set_status(&self, id: Uuid, status: QuoteStatus) -> Result<quote::Model, CrmError> {
        self.update(
            id,
            UpdateQuoteRequest {
                status: Some(status),
                ..UpdateQuoteRequest::default()
            },
        )
        .await
    }

    /// Delete a quote and its line items. Returns `false` if it did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(quote) = Quote::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        QuoteItem::delete_many()
            .filter(quote_item::Column::QuoteId.eq(id))
            .exec(&txn)
            .await?;
        quote.delete(&txn).await?;

        txn.commit().await?;
        tracing::info!(quote_id = %id, "Deleted quote");
        Ok(true)
    }

    /// Add a line item and recalculate the quote.
    pub async fn add_item(
        &self,
        quote_id: Uuid,
        request: CreateQuoteItemRequest,
    ) -> Result<quote_item::Model, CrmError> {
        let txn = self.db.begin().await?;

        Quote::find_by_id(quote_id)
            .one(&txn)
            .await?
            .ok_or_else(|| CrmError::not_found("quote", quote_id))?;

        let product = match request.product_id {
            Some(id) => Some(
                Product::find_by_id(id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| CrmError::not_found("product", id))?,
            ),
            None => None,
        };

        let mut product_name = non_blank(request.product_name);
        let mut sku = non_blank(request.sku);
        let mut description = non_blank(request.description);
        let mut unit_price = request.unit_price;
        if let Some(product) = product {
            product_name.get_or_insert(product.name);
            sku = sku.or(product.sku);
            description = description.or(product.description);
            unit_price = unit_price.or(Some(Money::from_cents(product.price_cents)));
        }

        let product_name =
            product_name.ok_or_else(|| CrmError::validation("Product name is required"))?;
        let unit_price = unit_price.unwrap_or(Money::ZERO);
        validate_item(request.quantity, unit_price, request.discount)?;
        let total = line_total(request.quantity, unit_price, request.discount)?;

        let sort_order = match request.sort_order {
            Some(order) => order,
            None => {
                let count = QuoteItem::find()
                    .filter(quote_item::Column::QuoteId.eq(quote_id))
                    .count(&txn)
                    .await?;
                i32::try_from(count).unwrap_or(i32::MAX)
            }
        };

        let item = quote_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            quote_id: Set(quote_id),
            product_id: Set(request.product_id),
            product_name: Set(product_name),
            sku: Set(sku),
            description: Set(description),
            quantity_milli: Set(request.quantity.milli()),
            unit_price_cents: Set(unit_price.cents()),
            discount_bps: Set(request.discount.bps()),
            line_total_cents: Set(total.cents()),
            sort_order: Set(sort_order),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&txn)
        .await?;

        recalculate_quote_totals_in(&txn, quote_id).await?;
        txn.commit().await?;

        Ok(item)
    }

    /// Edit a line item, recompute its line total and recalculate the quote.
    pub async fn update_item(
        &self,
        item_id: Uuid,
        request: UpdateQuoteItemRequest,
    ) -> Result<quote_item::Model, CrmError> {
        if request
            .product_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(CrmError::validation("Product name is required"));
        }

        let txn = self.db.begin().await?;

        let item = QuoteItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| CrmError::not_found("quote item", item_id))?;
        let quote_id = item.quote_id;

        let quantity = request.quantity.unwrap_or_else(|| item.quantity());
        let unit_price = request.unit_price.unwrap_or_else(|| item.unit_price());
        let discount = request.discount.unwrap_or_else(|| item.discount_percent());
        validate_item(quantity, unit_price, discount)?;
        let total = line_total(quantity, unit_price, discount)?;

        let mut active = item.into_active_model();
        apply(
            &mut active.product_name,
            request.product_name.map(|n| n.trim().to_string()),
        );
        apply(&mut active.sku, request.sku);
        apply(&mut active.description, request.description);
        apply(&mut active.sort_order, request.sort_order);
        active.quantity_milli = Set(quantity.milli());
        active.unit_price_cents = Set(unit_price.cents());
        active.discount_bps = Set(discount.bps());
        active.line_total_cents = Set(total.cents());
        let item = active.update(&txn).await?;

        recalculate_quote_totals_in(&txn, quote_id).await?;
        txn.commit().await?;

        Ok(item)
    }

    /// Remove a line item and recalculate the quote. Returns `false` if the
    /// item did not exist.
    pub async fn delete_item(&self, item_id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(item) = QuoteItem::find_by_id(item_id).one(&txn).await? else {
            return Ok(false);
        };
        let quote_id = item.quote_id;

        item.delete(&txn).await?;
        recalculate_quote_totals_in(&txn, quote_id).await?;
        txn.commit().await?;

        Ok(true)
    }
}

/// Next `<prefix>-<year>-<seq>` number, one past the highest sequence used
/// this year.
async fn next_quote_number<C>(conn: &C, prefix: &str, year: i32) -> Result<String, CrmError>
where
    C: ConnectionTrait,
{
    let stem = format!("{prefix}-{year}-");
    let numbers: Vec<String> = Quote::find()
        .select_only()
        .column(quote::Column::QuoteNumber)
        .filter(quote::Column::QuoteNumber.starts_with(&stem))
        .into_tuple()
        .all(conn)
        .await?;

    let next = highest_sequence(&stem, &numbers) + 1;
    Ok(format!("{stem}{next:04}"))
}

fn highest_sequence(stem: &str, numbers: &[String]) -> u32 {
    numbers
        .iter()
        .filter_map(|number| number.strip_prefix(stem)?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn validate_percent(label: &str, percent: Percent) -> Result<(), CrmError> {
    if !(0..=10_000).contains(&percent.bps()) {
        return Err(CrmError::validation(format!(
            "{label} must be between 0 and 100 percent"
        )));
    }
    Ok(())
}

fn validate_item(quantity: Quantity, unit_price: Money, discount: Percent) -> Result<(), CrmError> {
    if quantity.milli() < 0 {
        return Err(CrmError::validation("Quantity must not be negative"));
    }
    if unit_price < Money::ZERO {
        return Err(CrmError::validation("Unit price must not be negative"));
    }
    validate_percent("Discount", discount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_continues_from_highest_number() {
        let numbers = vec![
            "Q-2026-0002".to_string(),
            "Q-2026-0010".to_string(),
            "Q-2026-0009".to_string(),
        ];
        assert_eq!(highest_sequence("Q-2026-", &numbers), 10);
        assert_eq!(highest_sequence("Q-2026-", &[]), 0);
    }

    #[test]
    fn sequence_ignores_malformed_numbers() {
        let numbers = vec!["Q-2026-draft".to_string(), "Q-2026-0003".to_string()];
        assert_eq!(highest_sequence("Q-2026-", &numbers), 3);
    }

    #[test]
    fn sequence_past_four_digits_still_orders_numerically() {
        let numbers = vec!["Q-2026-9999".to_string(), "Q-2026-10000".to_string()];
        assert_eq!(highest_sequence("Q-2026-", &numbers), 10_000);
    }

    #[test]
    fn percentages_outside_zero_to_hundred_are_rejected() {
        assert!(validate_percent("Tax", Percent::from_bps(0)).is_ok());
        assert!(validate_percent("Tax", Percent::from_bps(10_000)).is_ok());
        assert!(matches!(
            validate_percent("Tax", Percent::from_bps(10_001)),
            Err(CrmError::Validation(_))
        ));
        assert!(validate_percent("Discount", Percent::from_bps(-1)).is_err());
    }

    #[test]
    fn negative_item_amounts_are_rejected() {
        assert!(validate_item(Quantity::ONE, Money::from_cents(100), Percent::ZERO).is_ok());
        assert!(validate_item(Quantity::from_milli(-1), Money::ZERO, Percent::ZERO).is_err());
        assert!(validate_item(Quantity::ONE, Money::from_cents(-1), Percent::ZERO).is_err());
    }
}
