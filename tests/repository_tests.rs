//! Integration tests for the entity services.

mod test_utils;

use chrono::Datelike;
use crm::error::CrmError;
use crm::models::{DealStage, QuoteStatus, UserRole};
use crm::money::{Money, Quantity};
use crm::pipeline::today;
use crm::repositories::company::{CreateCompanyRequest, UpdateCompanyRequest};
use crm::repositories::contact::{CreateContactRequest, UpdateContactRequest};
use crm::repositories::deal::UpdateDealRequest;
use crm::repositories::product::{CreateProductRequest, UpdateProductRequest};
use crm::repositories::quote::{
    CreateQuoteItemRequest, CreateQuoteRequest, UpdateQuoteItemRequest, UpdateQuoteRequest,
};
use crm::repositories::salesperson::{CreateSalespersonRequest, UpdateSalespersonRequest};
use crm::repositories::user::{CreateUserRequest, UpdateUserRequest};
use crm::repositories::{
    CompanyRepository, ContactRepository, DealRepository, ProductRepository, QuoteRepository,
    SalespersonRepository, UserRepository,
};
use test_utils::*;
use uuid::Uuid;

fn contact_request(email: &str) -> CreateContactRequest {
    CreateContactRequest {
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        email: email.to_string(),
        ..Default::default()
    }
}

fn user_request(username: &str) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        password: "correct horse".to_string(),
        email: None,
        first_name: None,
        last_name: None,
        role: UserRole::Salesperson,
    }
}

#[tokio::test]
async fn duplicate_contact_email_is_duplicate_key() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contacts = ContactRepository::new(db.clone());
    contacts.create(contact_request("ann@example.com")).await?;

    let result = contacts.create(contact_request("  ANN@example.com ")).await;

    assert!(matches!(
        result,
        Err(CrmError::DuplicateKey { entity: "contact", ref key }) if key == "ann@example.com"
    ));
    assert_eq!(contacts.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_contact_email_is_rejected() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = ContactRepository::new(db)
        .create(contact_request("not-an-email"))
        .await;

    assert!(matches!(result, Err(CrmError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn update_of_missing_contact_is_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = ContactRepository::new(db)
        .update(
            Uuid::new_v4(),
            UpdateContactRequest {
                first_name: Some("Bo".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(CrmError::NotFound { entity: "contact", .. })));
    Ok(())
}

#[tokio::test]
async fn contact_update_clears_and_stamps_activity() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contacts = ContactRepository::new(db.clone());
    let contact = contacts
        .create(CreateContactRequest {
            phone: Some("555-0100".to_string()),
            ..contact_request("ann@example.com")
        })
        .await?;
    assert!(contact.last_activity_at.is_none());

    let updated = contacts
        .update(
            contact.id,
            UpdateContactRequest {
                phone: Some(None),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.phone, None);
    assert_eq!(updated.first_name, "Ann");
    assert!(updated.last_activity_at.is_some());
    Ok(())
}

#[tokio::test]
async fn contact_update_to_taken_email_is_duplicate_key() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contacts = ContactRepository::new(db.clone());
    contacts.create(contact_request("ann@example.com")).await?;
    let bo = contacts.create(contact_request("bo@example.com")).await?;

    let result = contacts
        .update(
            bo.id,
            UpdateContactRequest {
                email: Some("ANN@example.com".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(CrmError::DuplicateKey { entity: "contact", ref key }) if key == "ann@example.com"
    ));
    let bo = contacts.get(bo.id).await?.unwrap();
    assert_eq!(bo.email, "bo@example.com");
    Ok(())
}

#[tokio::test]
async fn contact_update_trims_names() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contacts = ContactRepository::new(db.clone());
    let contact = contacts.create(contact_request("ann@example.com")).await?;

    let updated = contacts
        .update(
            contact.id,
            UpdateContactRequest {
                first_name: Some("  Annie ".to_string()),
                last_name: Some(" Lee-Park  ".to_string()),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.first_name, "Annie");
    assert_eq!(updated.last_name, "Lee-Park");
    Ok(())
}

#[tokio::test]
async fn upsert_by_email_updates_existing_contact() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contacts = ContactRepository::new(db.clone());

    let (first, created) = contacts
        .upsert_by_email(contact_request("ann@example.com"))
        .await?;
    assert!(created);

    let (second, created) = contacts
        .upsert_by_email(CreateContactRequest {
            first_name: String::new(),
            phone: Some("555-0199".to_string()),
            ..contact_request("ann@example.com")
        })
        .await?;

    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.first_name, "Ann");
    assert_eq!(second.phone.as_deref(), Some("555-0199"));
    assert_eq!(contacts.count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn deleting_a_contact_keeps_its_deals() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[&contact]).await?;

    assert!(ContactRepository::new(db.clone()).delete(contact.id).await?);

    let details = DealRepository::new(db.clone())
        .get_with_relations(deal.id)
        .await?
        .unwrap();
    assert!(details.contacts.is_empty());
    Ok(())
}

#[tokio::test]
async fn linking_a_contact_twice_updates_the_role() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[&contact]).await?;
    let deals = DealRepository::new(db.clone());

    deals
        .add_contact(deal.id, contact.id, Some("decision maker"))
        .await?;

    let details = deals.get_with_relations(deal.id).await?.unwrap();
    assert_eq!(details.contacts.len(), 1);
    assert_eq!(details.contacts[0].role, "decision maker");

    let contacts = ContactRepository::new(db.clone());
    assert!(contacts.get(contact.id).await?.unwrap().last_activity_at.is_some());
    Ok(())
}

#[tokio::test]
async fn linking_a_missing_contact_is_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;

    let result = DealRepository::new(db)
        .add_contact(deal.id, Uuid::new_v4(), None)
        .await;

    assert!(matches!(result, Err(CrmError::NotFound { entity: "contact", .. })));
    Ok(())
}

#[tokio::test]
async fn removing_a_contact_from_a_won_deal_resyncs_it() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", dollars(900), &[&contact]).await?;
    crm::pipeline::PipelineService::new(db.clone())
        .transition(deal.id, "closed_won", None)
        .await?;

    let deals = DealRepository::new(db.clone());
    assert!(deals.remove_contact(deal.id, contact.id).await?);
    assert!(!deals.remove_contact(deal.id, contact.id).await?);

    let contact = ContactRepository::new(db.clone())
        .get(contact.id)
        .await?
        .unwrap();
    assert_eq!(contact.deal_value(), Money::ZERO);
    Ok(())
}

#[tokio::test]
async fn deleting_a_won_deal_resyncs_contacts_and_detaches_quotes() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", Money::ZERO, &[&contact]).await?;
    let quote = create_test_quote(&db, &deal, percent(0), percent(0), &[(1, dollars(300))]).await?;
    crm::pipeline::PipelineService::new(db.clone())
        .transition(deal.id, "closed_won", None)
        .await?;

    let contacts = ContactRepository::new(db.clone());
    assert_eq!(contacts.get(contact.id).await?.unwrap().deal_value(), dollars(300));

    assert!(DealRepository::new(db.clone()).delete(deal.id).await?);

    assert_eq!(contacts.get(contact.id).await?.unwrap().deal_value(), Money::ZERO);
    let quote = QuoteRepository::new(db.clone()).get(quote.id).await?.unwrap();
    assert_eq!(quote.deal_id, None);
    Ok(())
}

#[tokio::test]
async fn update_of_missing_deal_is_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = DealRepository::new(db)
        .update(Uuid::new_v4(), UpdateDealRequest::default())
        .await;

    assert!(matches!(result, Err(CrmError::NotFound { entity: "deal", .. })));
    Ok(())
}

#[tokio::test]
async fn quote_without_deal_provisions_one_named_after_company() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let company = CompanyRepository::new(db.clone())
        .create(CreateCompanyRequest {
            name: "Acme Storage".to_string(),
            ..Default::default()
        })
        .await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;

    let quote = QuoteRepository::new(db.clone())
        .create(CreateQuoteRequest {
            title: Some("Pallet racking".to_string()),
            company_id: Some(company.id),
            contact_id: Some(contact.id),
            ..Default::default()
        })
        .await?;

    assert_eq!(quote.status, QuoteStatus::Draft);
    assert_eq!(quote.customer_company.as_deref(), Some("Acme Storage"));
    assert_eq!(quote.customer_email.as_deref(), Some("ann@example.com"));
    assert_eq!(quote.quote_date, Some(today()));

    let details = DealRepository::new(db.clone())
        .get_with_relations(quote.deal_id.unwrap())
        .await?
        .unwrap();
    assert_eq!(details.deal.name, "Acme Storage");
    assert_eq!(details.deal.stage, DealStage::NewDeal);
    assert_eq!(details.deal.value(), Money::ZERO);
    assert_eq!(details.contacts.len(), 1);
    assert_eq!(details.quotes.len(), 1);
    Ok(())
}

#[tokio::test]
async fn quote_without_company_names_deal_after_title() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let quote = QuoteRepository::new(db.clone())
        .create(CreateQuoteRequest {
            title: Some("Spring order".to_string()),
            ..Default::default()
        })
        .await?;

    let deal = DealRepository::new(db.clone())
        .get(quote.deal_id.unwrap())
        .await?
        .unwrap();
    assert_eq!(deal.name, "Spring order");
    Ok(())
}

#[tokio::test]
async fn quote_can_opt_out_of_deal_creation() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let quote = QuoteRepository::new(db.clone())
        .create(CreateQuoteRequest {
            auto_create_deal: false,
            ..Default::default()
        })
        .await?;

    assert_eq!(quote.deal_id, None);
    assert!(DealRepository::new(db).list(None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn quote_numbers_increase_within_the_year() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let quotes = QuoteRepository::new(db.clone()).with_number_prefix("EST");
    let year = today().year();

    let first = quotes.create(CreateQuoteRequest::default()).await?;
    let second = quotes.create(CreateQuoteRequest::default()).await?;

    assert_eq!(first.quote_number, format!("EST-{year}-0001"));
    assert_eq!(second.quote_number, format!("EST-{year}-0002"));
    Ok(())
}

#[tokio::test]
async fn quote_with_missing_deal_is_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = QuoteRepository::new(db)
        .create(CreateQuoteRequest {
            deal_id: Some(Uuid::new_v4()),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(CrmError::NotFound { entity: "deal", .. })));
    Ok(())
}

#[tokio::test]
async fn item_requires_a_product_name() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let quotes = QuoteRepository::new(db.clone());
    let quote = quotes.create(CreateQuoteRequest::default()).await?;

    let result = quotes
        .add_item(
            quote.id,
            CreateQuoteItemRequest {
                unit_price: Some(dollars(5)),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(CrmError::Validation(ref m)) if m == "Product name is required"));
    let details = quotes.get_with_items(quote.id).await?.unwrap();
    assert!(details.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn item_fills_details_from_product() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let product = ProductRepository::new(db.clone())
        .create(CreateProductRequest {
            name: "Wire deck".to_string(),
            sku: Some("WD-4246".to_string()),
            description: Some("42 x 46 in".to_string()),
            price: Money::from_cents(4_250),
        })
        .await?;
    let quotes = QuoteRepository::new(db.clone());
    let quote = quotes.create(CreateQuoteRequest::default()).await?;

    let item = quotes
        .add_item(
            quote.id,
            CreateQuoteItemRequest {
                product_id: Some(product.id),
                quantity: Quantity::from_milli(2_500),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(item.product_name, "Wire deck");
    assert_eq!(item.sku.as_deref(), Some("WD-4246"));
    assert_eq!(item.unit_price(), Money::from_cents(4_250));
    assert_eq!(item.line_total(), Money::from_cents(10_625));
    assert_eq!(item.sort_order, 0);

    let quote = quotes.get(quote.id).await?.unwrap();
    assert_eq!(quote.total(), Money::from_cents(10_625));
    Ok(())
}

#[tokio::test]
async fn paid_status_stamps_payment_date() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let quotes = QuoteRepository::new(db.clone());
    let quote = quotes.create(CreateQuoteRequest::default()).await?;

    let sent = quotes.set_status(quote.id, QuoteStatus::Sent).await?;
    assert_eq!(sent.payment_date, None);

    let paid = quotes.set_status(quote.id, QuoteStatus::Paid).await?;
    assert_eq!(paid.payment_date, Some(today()));
    Ok(())
}

#[tokio::test]
async fn quote_update_applies_status_with_other_fields() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let quotes = QuoteRepository::new(db.clone());
    let quote = quotes.create(CreateQuoteRequest::default()).await?;

    let paid = quotes
        .update(
            quote.id,
            UpdateQuoteRequest {
                title: Some(Some("Spring order".to_string())),
                status: Some(QuoteStatus::Paid),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(paid.title.as_deref(), Some("Spring order"));
    assert_eq!(paid.status, QuoteStatus::Paid);
    assert_eq!(paid.payment_date, Some(today()));

    let result = quotes
        .update(
            quote.id,
            UpdateQuoteRequest {
                status: Some(QuoteStatus::Sent),
                deal_id: Some(Some(Uuid::new_v4())),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CrmError::NotFound { entity: "deal", .. })));

    let quote = quotes.get(quote.id).await?.unwrap();
    assert_eq!(quote.status, QuoteStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn moving_a_quote_leaves_the_old_deal_value() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let first = create_test_deal(&db, "First", Money::ZERO, &[]).await?;
    let second = create_test_deal(&db, "Second", Money::ZERO, &[]).await?;
    let quote = create_test_quote(&db, &first, percent(0), percent(0), &[(1, dollars(100))]).await?;
    let quotes = QuoteRepository::new(db.clone());

    quotes
        .update(
            quote.id,
            UpdateQuoteRequest {
                deal_id: Some(Some(second.id)),
                ..Default::default()
            },
        )
        .await?;

    let deals = DealRepository::new(db.clone());
    assert_eq!(deals.get(second.id).await?.unwrap().value(), dollars(100));
    assert_eq!(deals.get(first.id).await?.unwrap().value(), dollars(100));
    assert!(quotes.quotes_for_deal(first.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_quote_removes_its_items() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", Money::ZERO, &[]).await?;
    let quote = create_test_quote(&db, &deal, percent(0), percent(0), &[(1, dollars(10))]).await?;
    let quotes = QuoteRepository::new(db.clone());

    assert!(quotes.delete(quote.id).await?);
    assert!(!quotes.delete(quote.id).await?);
    assert!(quotes.get_with_items(quote.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_product_sku_is_duplicate_key() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let products = ProductRepository::new(db.clone());
    let request = CreateProductRequest {
        name: "Upright".to_string(),
        sku: Some("UP-96".to_string()),
        description: None,
        price: dollars(120),
    };
    products.create(request.clone()).await?;

    let result = products.create(request).await;

    assert!(matches!(result, Err(CrmError::DuplicateKey { entity: "product", .. })));
    Ok(())
}

#[tokio::test]
async fn inactive_products_are_hidden_by_default() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let products = ProductRepository::new(db.clone());
    let product = products
        .create(CreateProductRequest {
            name: "Beam".to_string(),
            price: dollars(40),
            ..Default::default()
        })
        .await?;

    products.deactivate(product.id).await?;
    assert!(products.list(false).await?.is_empty());
    assert_eq!(products.list(true).await?.len(), 1);

    products.activate(product.id).await?;
    assert_eq!(products.list(false).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_company_and_salesperson_names_are_rejected() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let companies = CompanyRepository::new(db.clone());
    let company = CreateCompanyRequest {
        name: "Acme".to_string(),
        ..Default::default()
    };
    companies.create(company.clone()).await?;
    assert!(matches!(
        companies.create(company).await,
        Err(CrmError::DuplicateKey { entity: "company", .. })
    ));

    let salespeople = SalespersonRepository::new(db.clone());
    let rep = CreateSalespersonRequest {
        name: "Sam Rivera".to_string(),
        ..Default::default()
    };
    salespeople.create(rep.clone()).await?;
    assert!(matches!(
        salespeople.create(rep).await,
        Err(CrmError::DuplicateKey { entity: "salesperson", .. })
    ));
    Ok(())
}

#[tokio::test]
async fn renaming_a_company_to_a_taken_name_is_duplicate_key() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let companies = CompanyRepository::new(db.clone());
    companies
        .create(CreateCompanyRequest {
            name: "Acme".to_string(),
            ..Default::default()
        })
        .await?;
    let globex = companies
        .create(CreateCompanyRequest {
            name: "Globex".to_string(),
            ..Default::default()
        })
        .await?;

    let result = companies
        .update(
            globex.id,
            UpdateCompanyRequest {
                name: Some(" Acme ".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(CrmError::DuplicateKey { entity: "company", ref key }) if key == "Acme"
    ));
    Ok(())
}

#[tokio::test]
async fn updates_of_missing_records_are_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let missing = Uuid::new_v4();

    let quote = QuoteRepository::new(db.clone())
        .update(missing, UpdateQuoteRequest::default())
        .await;
    assert!(matches!(quote, Err(CrmError::NotFound { entity: "quote", .. })));

    let item = QuoteRepository::new(db.clone())
        .update_item(
            missing,
            UpdateQuoteItemRequest {
                quantity: Some(Quantity::ONE),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(item, Err(CrmError::NotFound { entity: "quote item", .. })));

    let product = ProductRepository::new(db.clone())
        .update(
            missing,
            UpdateProductRequest {
                name: Some("Widget".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(product, Err(CrmError::NotFound { entity: "product", .. })));

    let company = CompanyRepository::new(db.clone())
        .update(
            missing,
            UpdateCompanyRequest {
                name: Some("Acme".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(company, Err(CrmError::NotFound { entity: "company", .. })));

    let salesperson = SalespersonRepository::new(db.clone())
        .update(
            missing,
            UpdateSalespersonRequest {
                name: Some("Sam Rivera".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        salesperson,
        Err(CrmError::NotFound { entity: "salesperson", .. })
    ));

    let user = UserRepository::new(db.clone())
        .update(
            missing,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(user, Err(CrmError::NotFound { entity: "user", .. })));
    Ok(())
}

#[tokio::test]
async fn deleting_a_company_detaches_its_records() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let companies = CompanyRepository::new(db.clone());
    let company = companies
        .create(CreateCompanyRequest {
            name: "Acme".to_string(),
            ..Default::default()
        })
        .await?;
    let contact = ContactRepository::new(db.clone())
        .create(CreateContactRequest {
            company_id: Some(company.id),
            ..contact_request("ann@example.com")
        })
        .await?;
    assert_eq!(companies.contacts(company.id).await?.len(), 1);

    assert!(companies.delete(company.id).await?);

    let contact = ContactRepository::new(db.clone())
        .get(contact.id)
        .await?
        .unwrap();
    assert_eq!(contact.company_id, None);
    Ok(())
}

#[tokio::test]
async fn users_are_case_insensitive_and_verify_passwords() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let users = UserRepository::new(db.clone());
    let user = users.create(user_request("Sam")).await?;
    assert_eq!(user.username, "sam");
    assert_ne!(user.password_hash, "correct horse");

    assert!(matches!(
        users.create(user_request("SAM")).await,
        Err(CrmError::DuplicateKey { entity: "user", .. })
    ));

    assert!(users.verify_password("SAM", "correct horse").await?.is_some());
    assert!(users.verify_password("sam", "wrong horse").await?.is_none());
    assert!(users.verify_password("nobody", "correct horse").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn short_passwords_are_rejected() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = UserRepository::new(db)
        .create(CreateUserRequest {
            password: "short".to_string(),
            ..user_request("sam")
        })
        .await;

    assert!(matches!(result, Err(CrmError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn deactivated_users_cannot_sign_in() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let users = UserRepository::new(db.clone());
    let user = users.create(user_request("sam")).await?;

    users
        .update(
            user.id,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;

    assert!(users.verify_password("sam", "correct horse").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn password_change_replaces_the_hash() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let users = UserRepository::new(db.clone());
    let user = users.create(user_request("sam")).await?;

    let updated = users
        .update(
            user.id,
            UpdateUserRequest {
                password: Some("battery staple".to_string()),
                ..Default::default()
            },
        )
        .await?;

    assert_ne!(updated.password_hash, user.password_hash);
    assert!(users.verify_password("sam", "correct horse").await?.is_none());
    assert!(users.verify_password("sam", "battery staple").await?.is_some());

    let logged_in = users.record_login(user.id).await?;
    assert!(logged_in.last_login_at.is_some());
    Ok(())
}
