//! # Data Models
//!
//! SeaORM entities for every table of the CRM schema.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod company;
pub mod contact;
pub mod deal;
pub mod deal_contact;
pub mod product;
pub mod quote;
pub mod quote_item;
pub mod salesperson;
pub mod user;

pub use company::Entity as Company;
pub use contact::Entity as Contact;
pub use deal::{DealStage, Entity as Deal};
pub use deal_contact::Entity as DealContact;
pub use product::Entity as Product;
pub use quote::{Entity as Quote, QuoteStatus};
pub use quote_item::Entity as QuoteItem;
pub use salesperson::Entity as Salesperson;
pub use user::{Entity as User, UserRole};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "crm".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
