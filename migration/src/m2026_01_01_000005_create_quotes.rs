//! Migration to create the quotes and quote_items tables.
//!
//! Money columns hold integer cents, percentage columns hold basis points and
//! `quantity_milli` holds thousandths of a unit.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quotes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quotes::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Quotes::QuoteNumber)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Quotes::Title).text().null())
                    .col(
                        ColumnDef::new(Quotes::Status)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Quotes::DealId).uuid().null())
                    .col(ColumnDef::new(Quotes::ContactId).uuid().null())
                    .col(ColumnDef::new(Quotes::CompanyId).uuid().null())
                    .col(ColumnDef::new(Quotes::SalespersonId).uuid().null())
                    .col(ColumnDef::new(Quotes::SalespersonName).text().null())
                    .col(ColumnDef::new(Quotes::SalespersonEmail).text().null())
                    .col(ColumnDef::new(Quotes::SalespersonPhone).text().null())
                    .col(ColumnDef::new(Quotes::CustomerName).text().null())
                    .col(ColumnDef::new(Quotes::CustomerEmail).text().null())
                    .col(ColumnDef::new(Quotes::CustomerPhone).text().null())
                    .col(ColumnDef::new(Quotes::CustomerCompany).text().null())
                    .col(
                        ColumnDef::new(Quotes::SubtotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quotes::DiscountBps)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quotes::DiscountAmountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quotes::TaxBps)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quotes::TaxAmountCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Quotes::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Quotes::QuoteDate).date().null())
                    .col(ColumnDef::new(Quotes::ExpiryDate).date().null())
                    .col(ColumnDef::new(Quotes::Notes).text().null())
                    .col(ColumnDef::new(Quotes::Terms).text().null())
                    .col(ColumnDef::new(Quotes::PaymentLink).text().null())
                    .col(ColumnDef::new(Quotes::PaymentDate).date().null())
                    .col(
                        ColumnDef::new(Quotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Quotes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quotes_deal_id")
                            .from(Quotes::Table, Quotes::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quotes_contact_id")
                            .from(Quotes::Table, Quotes::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quotes_company_id")
                            .from(Quotes::Table, Quotes::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quotes_salesperson_id")
                            .from(Quotes::Table, Quotes::SalespersonId)
                            .to(Salespeople::Table, Salespeople::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_quotes_deal_id")
                    .table(Quotes::Table)
                    .col(Quotes::DealId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuoteItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuoteItems::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                    .col(ColumnDef::new(QuoteItems::ProductId).uuid().null())
                    .col(ColumnDef::new(QuoteItems::ProductName).text().not_null())
                    .col(ColumnDef::new(QuoteItems::Sku).text().null())
                    .col(ColumnDef::new(QuoteItems::Description).text().null())
                    .col(
                        ColumnDef::new(QuoteItems::QuantityMilli)
                            .big_integer()
                            .not_null()
                            .default(1000),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::UnitPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::DiscountBps)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::LineTotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuoteItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_items_quote_id")
                            .from(QuoteItems::Table, QuoteItems::QuoteId)
                            .to(Quotes::Table, Quotes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quote_items_product_id")
                            .from(QuoteItems::Table, QuoteItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_quote_items_quote_id")
                    .table(QuoteItems::Table)
                    .col(QuoteItems::QuoteId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_quote_items_quote_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QuoteItems::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_quotes_deal_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quotes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Quotes {
    Table,
    Id,
    QuoteNumber,
    Title,
    Status,
    DealId,
    ContactId,
    CompanyId,
    SalespersonId,
    SalespersonName,
    SalespersonEmail,
    SalespersonPhone,
    CustomerName,
    CustomerEmail,
    CustomerPhone,
    CustomerCompany,
    SubtotalCents,
    DiscountBps,
    DiscountAmountCents,
    TaxBps,
    TaxAmountCents,
    TotalCents,
    QuoteDate,
    ExpiryDate,
    Notes,
    Terms,
    PaymentLink,
    PaymentDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QuoteItems {
    Table,
    Id,
    QuoteId,
    ProductId,
    ProductName,
    Sku,
    Description,
    QuantityMilli,
    UnitPriceCents,
    DiscountBps,
    LineTotalCents,
    SortOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Contacts {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Companies {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Salespeople {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
}
