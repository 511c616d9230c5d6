use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tripnest_booking::{
    AvailabilityChecker, DateRangeSelector, MockPaymentGateway, ReservationManager, Selection, TapOutcome,
};
use tripnest_core::repository::{Query, RecordStore, RESERVATIONS};
use tripnest_core::rules::{BookingRules, CancelledPolicy};
use tripnest_core::session::UserContext;
use tripnest_core::{BookingError, ErrorKind};
use tripnest_shared::{NewReservation, ReservationEvent, ReservationStatus};
use tripnest_store::MemoryRecordStore;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn setup(gateway: MockPaymentGateway) -> (Arc<MemoryRecordStore>, Arc<MockPaymentGateway>, ReservationManager) {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(gateway);
    let manager = ReservationManager::new(store.clone(), gateway.clone(), BookingRules::default());
    (store, gateway, manager)
}

#[tokio::test]
async fn test_booked_stay_blocks_overlapping_selection() {
    let (store, _, manager) = setup(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");
    manager
        .create(&ctx, NewReservation::new("destX", day(10), day(15), 2, 500.0))
        .await
        .unwrap();

    let mut selector = DateRangeSelector::new("destX", day(1), manager.checker());
    selector.reload(&*store).await.unwrap();

    assert!(matches!(selector.tap(day(12)), TapOutcome::Disabled));
    selector.tap(day(9));
    assert!(matches!(selector.tap(day(16)), TapOutcome::Rejected(_)));
    assert_eq!(selector.selection(), Selection::None);

    selector.tap(day(15));
    assert!(matches!(selector.tap(day(17)), TapOutcome::Completed { .. }));

    let err = manager
        .create(&UserContext::new("user2"), NewReservation::new("destX", day(12), day(14), 1, 200.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictError);
    assert!(err.orphaned_reservation().is_none());

    manager
        .create(&UserContext::new("user2"), NewReservation::new("destX", day(15), day(17), 1, 200.0))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_pay_confirm() {
    let (_, gateway, manager) = setup(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");

    let created = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap();
    assert_eq!(created.reservation.status, ReservationStatus::Pending);
    assert_eq!(created.payment.amount, 40000);
    assert_eq!(
        created.reservation.payment_reference.as_deref(),
        Some(created.payment.reference.as_str())
    );

    let confirmed = manager
        .checkout(&ctx, &created.reservation.id, &created.payment, "pm_card_visa")
        .await
        .unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.payment_reference.as_deref(), Some(created.payment.reference.as_str()));

    // retried checkout must not charge again
    manager
        .checkout(&ctx, &created.reservation.id, &created.payment, "pm_card_visa")
        .await
        .unwrap();
    assert_eq!(gateway.confirmations(), 1);
}

#[tokio::test]
async fn test_confirmed_reservation_cannot_be_cancelled() {
    let (_, _, manager) = setup(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");
    let created = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap();
    manager
        .confirm(&ctx, &created.reservation.id, &created.payment.reference)
        .await
        .unwrap();

    let err = manager.cancel(&ctx, &created.reservation.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: ReservationStatus::Confirmed,
            to: ReservationStatus::Cancelled
        }
    ));
    let stored = manager.get(&ctx, &created.reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_twice_is_one_confirmation() {
    let (store, _, manager) = setup(MockPaymentGateway::new());
    let mut events = manager.subscribe();
    let ctx = UserContext::new("user1");
    let created = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap();
    let id = created.reservation.id.clone();

    let first = manager.confirm(&ctx, &id, "pi_123").await.unwrap();
    let second = manager.confirm(&ctx, &id, "pi_123").await.unwrap();
    assert_eq!(first, second);

    let rows = store
        .query(&Query::table(RESERVATIONS).where_eq("id", id.as_str()))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "confirmed");
    assert_eq!(rows[0]["payment_reference"], "pi_123");

    let mut confirmations = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ReservationEvent::Confirmed { .. }) {
            confirmations += 1;
        }
    }
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_created_reservation_is_listed_newest_first() {
    let (_, _, manager) = setup(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");

    let older = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(3), 1, 100.0))
        .await
        .unwrap();
    let newer = manager
        .create(&ctx, NewReservation::new("destY", day(1), day(3), 1, 100.0))
        .await
        .unwrap();
    manager
        .create(&UserContext::new("user2"), NewReservation::new("destZ", day(1), day(3), 1, 100.0))
        .await
        .unwrap();

    let listed = manager.list(&ctx).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.reservation.id);
    assert_eq!(listed[1].id, older.reservation.id);
    assert!(listed.iter().all(|r| r.status == ReservationStatus::Pending));
}

#[tokio::test]
async fn test_decline_leaves_reservation_pending() {
    let (_, _, manager) = setup(MockPaymentGateway::declining("insufficient_funds"));
    let ctx = UserContext::new("user1");
    let created = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap();

    let err = manager
        .checkout(&ctx, &created.reservation.id, &created.payment, "pm_card_declined")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentDeclined);

    let stored = manager.get(&ctx, &created.reservation.id).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_gateway_failure_reports_unconfirmed_reservation() {
    let (_, _, manager) = setup(MockPaymentGateway::failing());
    let ctx = UserContext::new("user1");

    let err = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GatewayError);
    let orphan = err.orphaned_reservation().unwrap().to_string();

    let stored = manager.get(&ctx, &orphan).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Pending);
    assert!(stored.payment_reference.is_none());

    // left to the sweeper once the ttl has passed
    let expired = manager
        .expire_abandoned(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(expired, vec![orphan.clone()]);
    let stored = manager.get(&ctx, &orphan).await.unwrap();
    assert_eq!(stored.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn test_store_failure_is_store_unavailable() {
    let (store, gateway, manager) = setup(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");

    store.fail_next(1);
    let err = manager
        .create(&ctx, NewReservation::new("destX", day(1), day(5), 2, 400.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert_eq!(gateway.intents_created(), 0);

    store.fail_next(1);
    let err = manager.list(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
}

#[tokio::test]
async fn test_cancelled_stay_frees_dates_only_when_configured() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ctx = UserContext::new("user1");

    let blocking = ReservationManager::new(store.clone(), gateway.clone(), BookingRules::default());
    let created = blocking
        .create(&ctx, NewReservation::new("destX", day(10), day(15), 2, 500.0))
        .await
        .unwrap();
    blocking.cancel(&ctx, &created.reservation.id).await.unwrap();

    let err = blocking
        .create(&ctx, NewReservation::new("destX", day(11), day(12), 1, 100.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictError);

    let rules = BookingRules {
        cancelled_reservations: CancelledPolicy::Ignore,
        ..BookingRules::default()
    };
    let ignoring = ReservationManager::new(store.clone(), gateway, rules);
    ignoring
        .create(&ctx, NewReservation::new("destX", day(11), day(12), 1, 100.0))
        .await
        .unwrap();

    let checker = AvailabilityChecker::new(CancelledPolicy::Ignore);
    let spans = checker.load(&*store, "destX").await.unwrap();
    assert_eq!(spans.len(), 1);
}
