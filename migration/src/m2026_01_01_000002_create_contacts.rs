//! Migration to create the contacts table.
//!
//! Contacts carry marketing attribution (UTM tags) and the derived
//! `deal_value_cents` aggregate maintained by the aggregation engine.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contacts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Contacts::FirstName).text().not_null())
                    .col(ColumnDef::new(Contacts::LastName).text().not_null())
                    .col(
                        ColumnDef::new(Contacts::Email)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Contacts::Phone).text().null())
                    .col(ColumnDef::new(Contacts::CompanyId).uuid().null())
                    .col(ColumnDef::new(Contacts::SalespersonId).uuid().null())
                    .col(ColumnDef::new(Contacts::UtmSource).text().null())
                    .col(ColumnDef::new(Contacts::UtmMedium).text().null())
                    .col(ColumnDef::new(Contacts::UtmCampaign).text().null())
                    .col(ColumnDef::new(Contacts::UtmTerm).text().null())
                    .col(ColumnDef::new(Contacts::UtmContent).text().null())
                    .col(ColumnDef::new(Contacts::LandingPage).text().null())
                    .col(ColumnDef::new(Contacts::Referrer).text().null())
                    .col(ColumnDef::new(Contacts::Notes).text().null())
                    .col(
                        ColumnDef::new(Contacts::DealValueCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Contacts::DealClosedDate).date().null())
                    .col(
                        ColumnDef::new(Contacts::LastActivityAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Contacts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Contacts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contacts_company_id")
                            .from(Contacts::Table, Contacts::CompanyId)
                            .to(Companies::Table, Companies::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contacts_salesperson_id")
                            .from(Contacts::Table, Contacts::SalespersonId)
                            .to(Salespeople::Table, Salespeople::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contacts_company_id")
                    .table(Contacts::Table)
                    .col(Contacts::CompanyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contacts_utm_source")
                    .table(Contacts::Table)
                    .col(Contacts::UtmSource)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_contacts_utm_source").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_contacts_company_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Contacts {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    Phone,
    CompanyId,
    SalespersonId,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    UtmTerm,
    UtmContent,
    LandingPage,
    Referrer,
    Notes,
    DealValueCents,
    DealClosedDate,
    LastActivityAt,
    CreatedAt,
    UpdatedAt,
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
