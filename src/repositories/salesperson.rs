//! # Salesperson Repository

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{apply, non_blank};
use crate::error::CrmError;
use crate::models::{Contact, Deal, Quote, Salesperson, contact, deal, quote, salesperson};

/// Request data for creating a salesperson
#[derive(Debug, Clone, Default)]
pub struct CreateSalespersonRequest {
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Partial update for a salesperson
#[derive(Debug, Clone, Default)]
pub struct UpdateSalespersonRequest {
    pub name: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

/// Repository for salesperson database operations
#[derive(Debug, Clone)]
pub struct SalespersonRepository {
    db: DatabaseConnection,
}

impl SalespersonRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a salesperson. Fails with `DuplicateKey` if the name is taken.
    pub async fn create(
        &self,
        request: CreateSalespersonRequest,
    ) -> Result<salesperson::Model, CrmError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CrmError::validation("Salesperson name is required"));
        }

        salesperson::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.clone()),
            first_name: Set(non_blank(request.first_name)),
            last_name: Set(non_blank(request.last_name)),
            email: Set(non_blank(request.email)),
            phone: Set(non_blank(request.phone)),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&self.db)
        .await
        .map_err(CrmError::on_write("salesperson", name))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<salesperson::Model>, CrmError> {
        Ok(Salesperson::find_by_id(id).one(&self.db).await?)
    }

    pub async fn list(&self) -> Result<Vec<salesperson::Model>, CrmError> {
        Ok(Salesperson::find()
            .order_by_asc(salesperson::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateSalespersonRequest,
    ) -> Result<salesperson::Model, CrmError> {
        let salesperson = Salesperson::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("salesperson", id))?;

        let name = request.name.map(|n| n.trim().to_string());
        if name.as_deref().is_some_and(str::is_empty) {
            return Err(CrmError::validation("Salesperson name is required"));
        }
        let key = name.clone().unwrap_or_else(|| salesperson.name.clone());

        let mut active = salesperson.into_active_model();
        apply(&mut active.name, name);
        apply(&mut active.first_name, request.first_name);
        apply(&mut active.last_name, request.last_name);
        apply(&mut active.email, request.email);
        apply(&mut active.phone, request.phone);

        active
            .update(&self.db)
            .await
            .map_err(CrmError::on_write("salesperson", key))
    }

    /// Delete a salesperson, unassigning their contacts, deals and quotes.
    /// Quotes keep the salesperson snapshot taken when they were created.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(salesperson) = Salesperson::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        Contact::update_many()
            .col_expr(contact::Column::SalespersonId, Expr::value(Option::<Uuid>::None))
            .filter(contact::Column::SalespersonId.eq(id))
            .exec(&txn)
            .await?;
        Deal::update_many()
            .col_expr(deal::Column::SalespersonId, Expr::value(Option::<Uuid>::None))
            .filter(deal::Column::SalespersonId.eq(id))
            .exec(&txn)
            .await?;
        Quote::update_many()
            .col_expr(quote::Column::SalespersonId, Expr::value(Option::<Uuid>::None))
            .filter(quote::Column::SalespersonId.eq(id))
            .exec(&txn)
            .await?;
        salesperson.delete(&txn).await?;

        txn.commit().await?;
        Ok(true)
    }
}
