//! Migration to create the deals and deal_contacts tables.
//!
//! `deal_contacts` is the many-to-many join between deals and contacts and is
//! unique per `(deal_id, contact_id)` pair.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deals::Name).text().not_null())
                    .col(
                        ColumnDef::new(Deals::ValueCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Deals::Stage)
                            .text()
                            .not_null()
                            .default("new_deal"),
                    )
                    .col(ColumnDef::new(Deals::SalespersonId).uuid().null())
                    .col(ColumnDef::new(Deals::CompanyId).uuid().null())
                    .col(ColumnDef::new(Deals::UtmSource).text().null())
                    .col(ColumnDef::new(Deals::UtmMedium).text().null())
                    .col(ColumnDef::new(Deals::UtmCampaign).text().null())
                    .col(ColumnDef::new(Deals::ReportedSource).text().null())
                    .col(ColumnDef::new(Deals::ExpectedCloseDate).date().null())
                    .col(ColumnDef::new(Deals::ActualCloseDate).date().null())
                    .col(ColumnDef::new(Deals::CloseReason).text().null())
                    .col(ColumnDef::new(Deals::Notes).text().null())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_salesperson_id")
                            .from(Deals::Table, Deals::SalespersonId)
                            .to(Salespeople::Table, Salespeople::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_company_id")
                            .from(Deals::Table, Deals::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deals_stage")
                    .table(Deals::Table)
                    .col(Deals::Stage)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DealContacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealContacts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DealContacts::DealId).uuid().not_null())
                    .col(ColumnDef::new(DealContacts::ContactId).uuid().not_null())
                    .col(
                        ColumnDef::new(DealContacts::Role)
                            .text()
                            .not_null()
                            .default("primary"),
                    )
                    .col(
                        ColumnDef::new(DealContacts::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_contacts_deal_id")
                            .from(DealContacts::Table, DealContacts::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_contacts_contact_id")
                            .from(DealContacts::Table, DealContacts::ContactId)
                            .to(Contacts::Table, Contacts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deal_contacts_deal_contact")
                    .table(DealContacts::Table)
                    .col(DealContacts::DealId)
                    .col(DealContacts::ContactId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deal_contacts_contact_id")
                    .table(DealContacts::Table)
                    .col(DealContacts::ContactId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_deal_contacts_contact_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_deal_contacts_deal_contact")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(DealContacts::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_deals_stage").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
    Name,
    ValueCents,
    Stage,
    SalespersonId,
    CompanyId,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    ReportedSource,
    ExpectedCloseDate,
    ActualCloseDate,
    CloseReason,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DealContacts {
    Table,
    Id,
    DealId,
    ContactId,
    Role,
    AddedAt,
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
