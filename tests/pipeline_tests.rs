//! Integration tests for the pipeline state machine.

mod test_utils;

use chrono::NaiveDate;
use crm::error::CrmError;
use crm::models::DealStage;
use crm::money::Money;
use crm::pipeline::{PipelineService, today};
use crm::repositories::deal::CreateDealRequest;
use crm::repositories::{ContactRepository, DealRepository};
use test_utils::*;
use uuid::Uuid;

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

#[tokio::test]
async fn unknown_stage_leaves_deal_untouched() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;
    let pipeline = PipelineService::new(db.clone());
    pipeline.transition(deal.id, "closed_lost", Some(march(2))).await?;

    let result = pipeline.transition(deal.id, "bogus_stage", None).await;

    assert!(matches!(result, Err(CrmError::InvalidStage(ref s)) if s == "bogus_stage"));
    let deal = DealRepository::new(db.clone()).get(deal.id).await?.unwrap();
    assert_eq!(deal.stage, DealStage::ClosedLost);
    assert_eq!(deal.actual_close_date, Some(march(2)));
    Ok(())
}

#[tokio::test]
async fn transition_of_missing_deal_is_not_found() -> anyhow::Result<()> {
    let db = setup_test_db().await?;

    let result = PipelineService::new(db)
        .transition(Uuid::new_v4(), "proposal", None)
        .await;

    assert!(matches!(result, Err(CrmError::NotFound { entity: "deal", .. })));
    Ok(())
}

#[tokio::test]
async fn closing_stamps_today_by_default() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;

    let outcome = PipelineService::new(db.clone())
        .transition(deal.id, "closed_won", None)
        .await?;

    assert_eq!(outcome.previous_stage, DealStage::NewDeal);
    assert_eq!(outcome.deal.stage, DealStage::ClosedWon);
    assert_eq!(outcome.deal.actual_close_date, Some(today()));
    assert!(outcome.changed_stage());
    Ok(())
}

#[tokio::test]
async fn closing_uses_supplied_date() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;

    let outcome = PipelineService::new(db.clone())
        .transition(deal.id, "closed_lost", Some(march(15)))
        .await?;

    assert_eq!(outcome.deal.actual_close_date, Some(march(15)));
    assert!(outcome.resynced_contacts.is_empty());
    Ok(())
}

#[tokio::test]
async fn open_stages_never_carry_a_close_date() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;
    let pipeline = PipelineService::new(db.clone());

    let outcome = pipeline
        .transition(deal.id, "proposal", Some(march(1)))
        .await?;
    assert_eq!(outcome.deal.stage, DealStage::Proposal);
    assert_eq!(outcome.deal.actual_close_date, None);

    pipeline.transition(deal.id, "closed_won", Some(march(4))).await?;
    let outcome = pipeline.transition(deal.id, "negotiation", None).await?;
    assert_eq!(outcome.deal.actual_close_date, None);
    Ok(())
}

#[tokio::test]
async fn reopening_a_won_deal_removes_its_value_from_contacts() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", dollars(10_000), &[&contact]).await?;
    let pipeline = PipelineService::new(db.clone());
    let contacts = ContactRepository::new(db.clone());

    pipeline.transition(deal.id, "closed_won", Some(march(3))).await?;
    let won = contacts.get(contact.id).await?.unwrap();
    assert_eq!(won.deal_value(), dollars(10_000));
    assert_eq!(won.deal_closed_date, Some(march(3)));

    let outcome = pipeline.transition(deal.id, "negotiation", None).await?;
    assert_eq!(outcome.resynced_contacts.len(), 1);
    assert_eq!(outcome.resynced_contacts[0].deal_value(), Money::ZERO);

    let reopened = contacts.get(contact.id).await?.unwrap();
    assert_eq!(reopened.deal_value(), Money::ZERO);
    assert_eq!(reopened.deal_closed_date, None);
    Ok(())
}

#[tokio::test]
async fn won_to_lost_resyncs_contacts() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;
    let deal = create_test_deal(&db, "Acme", dollars(700), &[&contact]).await?;
    let pipeline = PipelineService::new(db.clone());

    pipeline.transition(deal.id, "closed_won", None).await?;
    let outcome = pipeline.transition(deal.id, "closed_lost", None).await?;

    assert_eq!(outcome.deal.actual_close_date, Some(today()));
    assert_eq!(outcome.resynced_contacts.len(), 1);
    let contact = ContactRepository::new(db.clone())
        .get(contact.id)
        .await?
        .unwrap();
    assert_eq!(contact.deal_value(), Money::ZERO);
    Ok(())
}

#[tokio::test]
async fn same_stage_without_date_is_a_no_op() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;
    let pipeline = PipelineService::new(db.clone());
    pipeline.transition(deal.id, "closed_won", Some(march(10))).await?;

    let outcome = pipeline.transition(deal.id, "closed_won", None).await?;

    assert!(!outcome.changed_stage());
    assert_eq!(outcome.deal.actual_close_date, Some(march(10)));
    Ok(())
}

#[tokio::test]
async fn same_closed_stage_with_date_moves_the_close_date() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;
    let pipeline = PipelineService::new(db.clone());
    pipeline.transition(deal.id, "closed_won", Some(march(10))).await?;

    let outcome = pipeline
        .transition(deal.id, "closed_won", Some(march(12)))
        .await?;

    assert_eq!(outcome.deal.actual_close_date, Some(march(12)));
    Ok(())
}

#[tokio::test]
async fn close_reason_is_independent_of_stage() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let deal = create_test_deal(&db, "Acme", dollars(100), &[]).await?;
    let pipeline = PipelineService::new(db.clone());

    let deal = pipeline
        .set_close_reason(deal.id, Some("Chose a competitor".to_string()))
        .await?;
    assert_eq!(deal.stage, DealStage::NewDeal);
    assert_eq!(deal.close_reason.as_deref(), Some("Chose a competitor"));

    let outcome = pipeline.transition(deal.id, "closed_lost", None).await?;
    assert_eq!(
        outcome.deal.close_reason.as_deref(),
        Some("Chose a competitor")
    );

    let deal = pipeline.set_close_reason(deal.id, None).await?;
    assert_eq!(deal.close_reason, None);
    Ok(())
}

#[tokio::test]
async fn deal_created_closed_is_stamped() -> anyhow::Result<()> {
    let db = setup_test_db().await?;
    let contact = create_test_contact(&db, "ann@example.com").await?;

    let deal = DealRepository::new(db.clone())
        .create(CreateDealRequest {
            value: dollars(2_000),
            stage: DealStage::ClosedWon,
            contact_id: Some(contact.id),
            ..CreateDealRequest::new("Walk-in")
        })
        .await?;

    assert_eq!(deal.actual_close_date, Some(today()));
    let contact = ContactRepository::new(db.clone())
        .get(contact.id)
        .await?
        .unwrap();
    assert_eq!(contact.deal_value(), dollars(2_000));
    Ok(())
}
