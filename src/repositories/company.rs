//! # Company Repository

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{apply, like_pattern, non_blank};
use crate::error::CrmError;
use crate::models::{Company, Contact, Deal, Quote, company, contact, deal, quote};

/// Request data for creating a company
#[derive(Debug, Clone, Default)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for a company
#[derive(Debug, Clone, Default)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub state: Option<Option<String>>,
    pub zip: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Repository for company database operations
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    db: DatabaseConnection,
}

impl CompanyRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a company. Fails with `DuplicateKey` if the name is taken.
    pub async fn create(&self, request: CreateCompanyRequest) -> Result<company::Model, CrmError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CrmError::validation("Company name is required"));
        }

        let now = Utc::now().fixed_offset();
        let company = company::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.clone()),
            phone: Set(non_blank(request.phone)),
            email: Set(non_blank(request.email)),
            website: Set(non_blank(request.website)),
            address: Set(non_blank(request.address)),
            city: Set(non_blank(request.city)),
            state: Set(non_blank(request.state)),
            zip: Set(non_blank(request.zip)),
            notes: Set(non_blank(request.notes)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(CrmError::on_write("company", name))?;

        tracing::info!(company_id = %company.id, "Created company");
        Ok(company)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<company::Model>, CrmError> {
        Ok(Company::find_by_id(id).one(&self.db).await?)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<company::Model>, CrmError> {
        Ok(Company::find()
            .filter(company::Column::Name.eq(name.trim()))
            .one(&self.db)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<company::Model>, CrmError> {
        Ok(Company::find()
            .order_by_asc(company::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<company::Model>, CrmError> {
        Ok(Company::find()
            .filter(company::Column::Name.like(like_pattern(query)))
            .order_by_asc(company::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCompanyRequest,
    ) -> Result<company::Model, CrmError> {
        let company = Company::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CrmError::not_found("company", id))?;

        let name = request.name.map(|n| n.trim().to_string());
        if name.as_deref().is_some_and(str::is_empty) {
            return Err(CrmError::validation("Company name is required"));
        }
        let key = name.clone().unwrap_or_else(|| company.name.clone());

        let mut active = company.into_active_model();
        apply(&mut active.name, name);
        apply(&mut active.phone, request.phone);
        apply(&mut active.email, request.email);
        apply(&mut active.website, request.website);
        apply(&mut active.address, request.address);
        apply(&mut active.city, request.city);
        apply(&mut active.state, request.state);
        apply(&mut active.zip, request.zip);
        apply(&mut active.notes, request.notes);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(&self.db)
            .await
            .map_err(CrmError::on_write("company", key))
    }

    /// Delete a company, detaching its contacts, deals and quotes. Returns
    /// `false` if it did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CrmError> {
        let txn = self.db.begin().await?;

        let Some(company) = Company::find_by_id(id).one(&txn).await? else {
            return Ok(false);
        };

        Contact::update_many()
            .col_expr(contact::Column::CompanyId, Expr::value(Option::<Uuid>::None))
            .filter(contact::Column::CompanyId.eq(id))
            .exec(&txn)
            .await?;
        Deal::update_many()
            .col_expr(deal::Column::CompanyId, Expr::value(Option::<Uuid>::None))
            .filter(deal::Column::CompanyId.eq(id))
            .exec(&txn)
            .await?;
        Quote::update_many()
            .col_expr(quote::Column::CompanyId, Expr::value(Option::<Uuid>::None))
            .filter(quote::Column::CompanyId.eq(id))
            .exec(&txn)
            .await?;
        company.delete(&txn).await?;

        txn.commit().await?;
        tracing::info!(company_id = %id, "Deleted company");
        Ok(true)
    }

    pub async fn deals(&self, id: Uuid) -> Result<Vec<deal::Model>, CrmError> {
        Ok(Deal::find()
            .filter(deal::Column::CompanyId.eq(id))
            .order_by_desc(deal::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn contacts(&self, id: Uuid) -> Result<Vec<contact::Model>, CrmError> {
        Ok(Contact::find()
            .filter(contact::Column::CompanyId.eq(id))
            .order_by_asc(contact::Column::LastName)
            .order_by_asc(contact::Column::FirstName)
            .all(&self.db)
            .await?)
    }

    pub async fn quotes(&self, id: Uuid) -> Result<Vec<quote::Model>, CrmError> {
        Ok(Quote::find()
            .filter(quote::Column::CompanyId.eq(id))
            .order_by_desc(quote::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
