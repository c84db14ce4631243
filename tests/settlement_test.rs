mod common;

use anyhow::Result;
use common::{TripFixture, parse_date, test_service};
use rust_decimal_macros::dec;
use wander::application::{AppError, DEMO_TRIP, NewExpense, TripUpdate};
use wander::domain::{
    Amount, ExpenseProblem, MemberRole, PaymentProblem, SettlementError, TripStatus, is_settled,
};

#[tokio::test]
async fn test_three_way_dinner() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Porto", &["A", "B", "C"]).await?;
    let (a, b, c) = (fx.member("A"), fx.member("B"), fx.member("C"));

    fx.expense(&service, "A", dec!(90), &["A", "B", "C"]).await?;

    let balances = service.compute_balances(fx.trip.id).await?;
    assert_eq!(balances.get(a.id), Some(dec!(60)));
    assert_eq!(balances.get(b.id), Some(dec!(-30)));
    assert_eq!(balances.get(c.id), Some(dec!(-30)));

    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(transfers.len(), 2);
    assert!(transfers.iter().all(|t| t.to == a.id));
    assert_eq!(transfers.iter().map(|t| t.amount).sum::<Amount>(), dec!(60));

    // Ties keep member order: B before C
    assert_eq!(transfers[0].from, b.id);
    assert_eq!(transfers[1].from, c.id);

    Ok(())
}

#[tokio::test]
async fn test_payment_settles_the_debt() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Sintra", &["A", "B"]).await?;
    let (a, b) = (fx.member("A"), fx.member("B"));

    fx.expense(&service, "A", dec!(100), &["A", "B"]).await?;

    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from, b.id);
    assert_eq!(transfers[0].to, a.id);
    assert_eq!(transfers[0].amount, dec!(50));

    service
        .record_settlement_payment(fx.trip.id, b.id, a.id, dec!(50), parse_date("2024-05-08"))
        .await?;

    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert!(transfers.is_empty());

    let balances = service.compute_balances(fx.trip.id).await?;
    assert!(balances.is_settled());

    Ok(())
}

#[tokio::test]
async fn test_partial_payment_reduces_debt() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Faro", &["A", "B"]).await?;
    let (a, b) = (fx.member("A"), fx.member("B"));

    fx.expense(&service, "A", dec!(100), &["A", "B"]).await?;
    service
        .record_settlement_payment(fx.trip.id, b.id, a.id, dec!(20), parse_date("2024-05-08"))
        .await?;

    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, dec!(30));

    let payments = service.list_payments(fx.trip.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].from, b.id);

    Ok(())
}

#[tokio::test]
async fn test_overpayment_flips_direction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Braga", &["A", "B"]).await?;
    let (a, b) = (fx.member("A"), fx.member("B"));

    fx.expense(&service, "A", dec!(100), &["A", "B"]).await?;
    service
        .record_settlement_payment(fx.trip.id, b.id, a.id, dec!(70), parse_date("2024-05-08"))
        .await?;

    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from, a.id);
    assert_eq!(transfers[0].to, b.id);
    assert_eq!(transfers[0].amount, dec!(20));

    Ok(())
}

#[tokio::test]
async fn test_recompute_is_stable() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Evora", &["A", "B", "C", "D"]).await?;

    fx.expense(&service, "A", dec!(120), &["A", "B", "C", "D"]).await?;
    fx.expense(&service, "B", dec!(45.50), &["B", "C"]).await?;
    fx.expense(&service, "D", dec!(10), &["A", "D"]).await?;

    let first = service.compute_settlement(fx.trip.id).await?;
    let second = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(first, second);

    let balances = service.compute_balances(fx.trip.id).await?;
    assert!(is_settled(balances.total().unwrap()));
    assert!(balances.apply(&first).is_settled());

    Ok(())
}

#[tokio::test]
async fn test_expense_without_participants_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Coimbra", &["A", "B", "C"]).await?;

    let result = fx.expense(&service, "A", dec!(30), &[]).await;
    let err = result.unwrap_err().downcast::<AppError>()?;
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidExpense {
            problem: ExpenseProblem::NoParticipants,
            ..
        })
    ));

    // Nothing was stored, so balances stay at zero
    assert!(service.list_expenses(fx.trip.id).await?.is_empty());
    let balances = service.compute_balances(fx.trip.id).await?;
    assert!(balances.iter().all(|(_, b)| b.is_zero()));

    Ok(())
}

#[tokio::test]
async fn test_expense_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Aveiro", &["A", "B"]).await?;
    let other = TripFixture::create(&service, "Elsewhere", &["Z"]).await?;
    let a = fx.member("A");

    let err = service
        .add_expense(
            fx.trip.id,
            NewExpense {
                payer: a.id,
                amount: dec!(0),
                participants: vec![a.id],
                date: parse_date("2024-05-02"),
                category: String::new(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidExpense {
            problem: ExpenseProblem::NonPositiveAmount,
            ..
        })
    ));

    let stranger = other.member("Z");
    let err = service
        .add_expense(
            fx.trip.id,
            NewExpense {
                payer: a.id,
                amount: dec!(10),
                participants: vec![a.id, stranger.id],
                date: parse_date("2024-05-02"),
                category: String::new(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidExpense {
            problem: ExpenseProblem::UnknownParticipant(id),
            ..
        }) if id == stranger.id
    ));

    let err = service
        .add_expense(
            fx.trip.id,
            NewExpense {
                payer: a.id,
                amount: dec!(10),
                participants: vec![a.id, a.id],
                date: parse_date("2024-05-02"),
                category: String::new(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidExpense {
            problem: ExpenseProblem::DuplicateParticipant(_),
            ..
        })
    ));

    Ok(())
}

#[tokio::test]
async fn test_payment_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Tavira", &["A", "B"]).await?;
    let other = TripFixture::create(&service, "Elsewhere", &["Z"]).await?;
    let (a, b) = (fx.member("A"), fx.member("B"));
    let day = parse_date("2024-05-08");

    let err = service
        .record_settlement_payment(fx.trip.id, a.id, a.id, dec!(10), day)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidPayment {
            problem: PaymentProblem::SelfPayment,
            ..
        })
    ));

    let err = service
        .record_settlement_payment(fx.trip.id, a.id, b.id, dec!(-5), day)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidPayment {
            problem: PaymentProblem::NonPositiveAmount,
            ..
        })
    ));

    let err = service
        .record_settlement_payment(fx.trip.id, other.member("Z").id, b.id, dec!(5), day)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::InvalidPayment {
            problem: PaymentProblem::UnknownSender(_),
            ..
        })
    ));

    assert!(service.list_payments(fx.trip.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_trip_without_members_cannot_settle() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Empty", &[]).await?;

    let err = service.compute_settlement(fx.trip.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Settlement(SettlementError::EmptyMembers)
    ));

    Ok(())
}

#[tokio::test]
async fn test_archived_trip_freezes_expenses_but_accepts_payments() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Madeira", &["A", "B"]).await?;
    let (a, b) = (fx.member("A"), fx.member("B"));

    let expense = fx.expense(&service, "A", dec!(40), &["A", "B"]).await?;
    service
        .update_trip(
            "Madeira",
            TripUpdate {
                status: Some(TripStatus::Archived),
                ..TripUpdate::default()
            },
        )
        .await?;

    let err = fx.expense(&service, "B", dec!(10), &["A"]).await.unwrap_err();
    assert!(matches!(
        err.downcast::<AppError>()?,
        AppError::TripArchived(_)
    ));
    let err = service.delete_expense(expense.id).await.unwrap_err();
    assert!(matches!(err, AppError::TripArchived(_)));

    // Reading still works
    let transfers = service.compute_settlement(fx.trip.id).await?;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].amount, dec!(20));

    // The open debt can still be paid off
    service
        .record_settlement_payment(fx.trip.id, b.id, a.id, dec!(20), parse_date("2024-05-08"))
        .await?;
    assert!(service.compute_settlement(fx.trip.id).await?.is_empty());

    // Archived trips are hidden from the default listing
    assert!(service.list_trips(false).await?.is_empty());
    assert_eq!(service.list_trips(true).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_trip_and_member_names_are_unique() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let fx = TripFixture::create(&service, "Douro", &["A"]).await?;

    let err = TripFixture::create(&service, "Douro", &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast::<AppError>()?,
        AppError::TripAlreadyExists(_)
    ));

    let err = service
        .add_member(fx.trip.id, "A".to_string(), MemberRole::Viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MemberAlreadyExists(_)));

    let renamed = service
        .rename_member(fx.trip.id, "A", "Alice".to_string())
        .await?;
    assert_eq!(renamed.id, fx.member("A").id);
    assert_eq!(service.get_member(fx.trip.id, "Alice").await?.id, renamed.id);
    assert!(matches!(
        service.get_member(fx.trip.id, "A").await.unwrap_err(),
        AppError::MemberNotFound(_)
    ));

    Ok(())
}

#[tokio::test]
async fn test_demo_trip() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let trip = service.seed_demo().await?;
    assert_eq!(trip.name, DEMO_TRIP);

    let diego = service.get_member(trip.id, "Diego García").await?;
    let sofia = service.get_member(trip.id, "Sofía Martínez").await?;
    let marcos = service.get_member(trip.id, "Marcos Ruiz").await?;
    assert_eq!(diego.role, MemberRole::Admin);

    let balances = service.compute_balances(trip.id).await?;
    assert_eq!(balances.get(diego.id), Some(dec!(443.5)));
    assert_eq!(balances.get(sofia.id), Some(dec!(-158.5)));
    assert_eq!(balances.get(marcos.id), Some(dec!(-285)));

    let transfers = service.compute_settlement(trip.id).await?;
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].from, marcos.id);
    assert_eq!(transfers[0].to, diego.id);
    assert_eq!(transfers[0].amount, dec!(285));
    assert_eq!(transfers[1].from, sofia.id);
    assert_eq!(transfers[1].to, diego.id);
    assert_eq!(transfers[1].amount, dec!(158.5));

    Ok(())
}
