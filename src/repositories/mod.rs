//! # Repository Layer
//!
//! Entity services. Each repository holds the injected connection pool,
//! takes explicit request structs for writes, and returns [`CrmError`] values.
//! Update requests use `Option<T>` for "leave unchanged" and, on nullable
//! columns, `Option<Option<T>>` so that `Some(None)` clears the column.
//!
//! [`CrmError`]: crate::error::CrmError

use sea_orm::{ActiveValue, Set, Value};

pub mod company;
pub mod contact;
pub mod deal;
pub mod product;
pub mod quote;
pub mod salesperson;
pub mod user;

pub use company::CompanyRepository;
pub use contact::ContactRepository;
pub use deal::DealRepository;
pub use product::ProductRepository;
pub use quote::QuoteRepository;
pub use salesperson::SalespersonRepository;
pub use user::UserRepository;

/// Writes `value` into `field` when present.
pub(crate) fn apply<V>(field: &mut ActiveValue<V>, value: Option<V>)
where
    V: Into<Value>,
{
    if let Some(value) = value {
        *field = Set(value);
    }
}

/// Trims free text and maps blank strings to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `%term%` for `LIKE` searches.
pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim())
}

pub(crate) const DEFAULT_PAGE_SIZE: u64 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_touches_present_values() {
        let mut field: ActiveValue<Option<String>> = ActiveValue::NotSet;
        apply(&mut field, None);
        assert!(matches!(field, ActiveValue::NotSet));

        apply(&mut field, Some(None));
        assert_eq!(field, Set(None));

        apply(&mut field, Some(Some("x".to_string())));
        assert_eq!(field, Set(Some("x".to_string())));
    }

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  a ".to_string())), Some("a".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }
}
