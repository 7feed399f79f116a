//! Database migrations for the CRM service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_01_000001_create_directory;
mod m2026_01_01_000002_create_contacts;
mod m2026_01_01_000003_create_products;
mod m2026_01_01_000004_create_deals;
mod m2026_01_01_000005_create_quotes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_01_000001_create_directory::Migration),
            Box::new(m2026_01_01_000002_create_contacts::Migration),
            Box::new(m2026_01_01_000003_create_products::Migration),
            Box::new(m2026_01_01_000004_create_deals::Migration),
            Box::new(m2026_01_01_000005_create_quotes::Migration),
        ]
    }
}
