//! # Product Repository
//!
//! Catalog maintenance. Products referenced by existing quote items are
//! usually deactivated rather than deleted; deleting one leaves the quote
//! items in place with their copied name and price.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{apply, like_pattern, non_blank};
use crate::error::CrmError;
use crate::models::{Product, QuoteItem, product, quote_item};
use crate::money::Money;

/// Request data for creating a product
#[derive(Debug, Clone, Default)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Money,
}

/// Partial update for a product
#[derive(Debug, Clone, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub sku: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub price: Option<Money>,
    pub is_active: Option<bool>,
}

/// Repository for product database operations
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: DatabaseConnection,
}

impl ProductRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create an active product. Fails with `DuplicateKey` on a taken SKU.
    pub async fn create(&self, request: CreateProductRequest) -> Result<product::Model, CrmError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CrmError::validation("Product name is required"));
        }
        if request.price < Money::ZERO {
            return Err(CrmError::validation("Price must not be negative"));
        }

        let sku = non_blank(request.sku);
        let now = Utc::now().fixed_offset();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.clone()),
            sku: Set(sku.clone()),
            description: Set(non_blank(request.description)),
            price_cents: Set(request.price.cents()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(CrmError::on_write("product", sku.unwrap_or(name)))?;

        tracing::info!(product_id = %product.id, sku = ?product.sku, "Created product");
        Ok(product)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<product::Model>, CrmError> {
        Ok(Product::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<product::Model>, CrmError> {
        Ok(Product::find()
            .filter(product::Column::Sku.eq(sku.trim()))
            .one(&self.db)
            .await?)
    }

    /// Products by name; inactive ones only when asked for.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<product::Model>, CrmError> {
        let mut select = Product::find();
        if !include_inactive {
            select = select.filter(product::Column::IsActive.eq(true));
        }
        Ok(select
            .order_by_asc(product::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// Active products whose name, SKU or description contains `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<product::Model>, CrmError> {
        let pattern = like_pattern(query);
        Ok(Product::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(product::Column::Name.like(&pattern))
                    .add(product::Column::Sku.like(&pattern))
                    .add(product::Column::Description.like(&pattern)),
            )
            .order_by_asc(product::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, CrmError> {
        let product = Product::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("product", id))?;

        if request
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(CrmError::validation("Product name is required"));
        }
        if request.price.is_some_and(|price| price < Money::ZERO) {
            return Err(CrmError::validation("Price must not be negative"));
        }

        let sku = request.sku.map(non_blank);
        let key = sku
            .clone()
            .flatten()
            .or_else(|| product.sku.clone())
            .unwrap_or_else(|| id.to_string());

        let mut active = product.into_active_model();
        apply(&mut active.name, request.name.map(|n| n.trim().to_string()));
        apply(&mut active.sku, sku);
        apply(&mut active.description, request.description);
        apply(&mut active.price_cents, request.price.map(Money::cents));
        apply(&mut active.is_active, request.is_active);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(&self.db)
            .await
            .map_err(CrmError::on_write("product", key))
    }

    /// Hide the product from pickers and searches.
    pub async fn deactivate(&self, id: Uuid) -> Result<product::Model, CrmError> {
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<product::Model, CrmError> {
        self.set_active(id, true).await
    }

    /// Delete a product. Quote items that referenced it keep their copied
    /// details and lose the reference. Returns `false` if it did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(product) = Product::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        QuoteItem::update_many()
            .col_expr(quote_item::Column::ProductId, Expr::value(Option::<Uuid>::None))
            .filter(quote_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        product.delete(&txn).await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<product::Model, CrmError> {
        let product = Product::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("product", id))?;

        let mut active = product.into_active_model();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().fixed_offset());
        Ok(active.update(&self.db).await?)
    }
}
