//! End-to-end engine scenarios: the full booking-to-payment lifecycle,
//! settlement guarantees, and behavior under concurrent callers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use qpay::collab::{StaticCredentials, StaticDirectory};
use qpay::engine::{NewBooking, RequestError, SettleArgs, SettlementError};
use qpay::model::RequestStatus;
use qpay::{Amount, BookingStatus, Engine, UserId};

fn register(engine: &mut Engine, pin: &str, balance: f64) -> UserId {
    let owner = Uuid::new_v4();
    engine.register_wallet(owner, pin).unwrap();
    if balance > 0.0 {
        engine.deposit(owner, Amount::from_float(balance)).unwrap();
    }
    owner
}

fn new_booking(provider: UserId, charge: f64) -> NewBooking {
    NewBooking {
        service_provider_id: provider,
        title: "Garden maintenance".to_string(),
        description: "Hedges and lawn".to_string(),
        booking_date: Utc::now(),
        charge: Amount::from_float(charge),
    }
}

fn pay_request(receiver: UserId, pin: &str, request_id: Uuid) -> SettleArgs {
    SettleArgs {
        receiver,
        pin: pin.to_string(),
        amount: None,
        booking_id: None,
        request_id: Some(request_id),
        idempotency_key: None,
    }
}

#[test]
fn full_lifecycle_from_booking_to_receipt() {
    let mut engine = Engine::new();
    let user = register(&mut engine, "1234", 150.0);
    let provider = register(&mut engine, "5678", 0.0);
    engine.set_discount(provider, 25).unwrap();

    // book, confirm, complete
    let booking_id = engine.create_booking(user, new_booking(provider, 200.0)).unwrap().id;
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Confirmed)
        .unwrap();
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Completed)
        .unwrap();

    // provider asks for the charge
    let request_id = engine
        .create_request(provider, booking_id, Amount::from_float(200.0), "full charge".to_string())
        .unwrap()
        .id;
    assert_eq!(
        engine.booking(user, booking_id).unwrap().status,
        BookingStatus::Requested
    );

    // user pays; 25% discount brings 200.00 to 150.00
    let txn_id = engine.settle(user, pay_request(provider, "1234", request_id)).unwrap().id;

    assert_eq!(engine.wallet(user).unwrap().balance(), Amount::ZERO);
    assert_eq!(
        engine.wallet(provider).unwrap().balance(),
        Amount::from_float(150.0)
    );
    assert_eq!(
        engine.booking(user, booking_id).unwrap().status,
        BookingStatus::Paid
    );
    let requests = engine.requests_for(user);
    assert_eq!(requests[0].status, RequestStatus::Paid);

    // record carries the pricing breakdown
    let record = &engine.history(user, 1, 10).items[0];
    assert_eq!(record.id, txn_id);
    assert_eq!(record.base_amount, Amount::from_float(200.0));
    assert_eq!(record.discount_applied, 25);
    assert_eq!(record.final_amount, Amount::from_float(150.0));
    assert_eq!(record.booking_id, Some(booking_id));
    assert_eq!(record.request_id, Some(request_id));

    // receipt renders from the same record
    let mut directory = StaticDirectory::new();
    directory.insert(user, "Amina");
    directory.insert(provider, "Bilal's Plumbing");
    let text = engine.receipt(user, txn_id, &directory).unwrap().render();
    assert!(text.contains("from:         Amina"));
    assert!(text.contains("to:           Bilal's Plumbing"));
    assert!(text.contains("base amount:  200.00"));
    assert!(text.contains("discount:     25%"));
    assert!(text.contains("final amount: 150.00"));
}

#[test]
fn statuses_only_move_forward() {
    let mut engine = Engine::new();
    let user = Uuid::new_v4();
    let provider = Uuid::new_v4();
    let id = engine.create_booking(user, new_booking(provider, 50.0)).unwrap().id;

    // cannot skip ahead from pending
    for to in [BookingStatus::Completed, BookingStatus::Requested, BookingStatus::Paid] {
        assert!(engine.update_booking_status(provider, id, to).is_err());
    }

    engine.update_booking_status(provider, id, BookingStatus::Confirmed).unwrap();

    // cannot go back
    assert!(engine.update_booking_status(provider, id, BookingStatus::Pending).is_err());

    engine.update_booking_status(provider, id, BookingStatus::Completed).unwrap();

    // completed is past the point of cancelling
    assert!(engine.update_booking_status(provider, id, BookingStatus::Cancelled).is_err());
    assert_eq!(engine.booking(user, id).unwrap().status, BookingStatus::Completed);
}

#[test]
fn double_settlement_of_one_request_charges_once() {
    let mut engine = Engine::new();
    let user = register(&mut engine, "1234", 500.0);
    let provider = register(&mut engine, "5678", 0.0);
    let booking_id = engine.create_booking(user, new_booking(provider, 100.0)).unwrap().id;
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Confirmed)
        .unwrap();
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Completed)
        .unwrap();
    let request_id = engine
        .create_request(provider, booking_id, Amount::from_float(100.0), String::new())
        .unwrap()
        .id;

    engine.settle(user, pay_request(provider, "1234", request_id)).unwrap();
    let second = engine.settle(user, pay_request(provider, "1234", request_id));
    assert!(matches!(second, Err(SettlementError::AlreadyPaid(_))));

    assert_eq!(engine.wallet(user).unwrap().balance(), Amount::from_float(400.0));
    assert_eq!(engine.wallet(provider).unwrap().balance(), Amount::from_float(100.0));
    assert_eq!(engine.history(user, 1, 10).total, 1);
}

#[test]
fn wrong_pin_leaves_no_trace() {
    let mut engine = Engine::new();
    let user = register(&mut engine, "1234", 100.0);
    let provider = register(&mut engine, "5678", 0.0);

    let args = SettleArgs {
        receiver: provider,
        pin: "4321".to_string(),
        amount: Some(Amount::from_float(50.0)),
        booking_id: None,
        request_id: None,
        idempotency_key: None,
    };
    assert!(matches!(
        engine.settle(user, args),
        Err(SettlementError::InvalidPin)
    ));

    assert_eq!(engine.wallet(user).unwrap().balance(), Amount::from_float(100.0));
    assert_eq!(engine.wallet(provider).unwrap().balance(), Amount::ZERO);
    assert_eq!(engine.history(user, 1, 10).total, 0);
    assert_eq!(engine.history(provider, 1, 10).total, 0);
}

#[test]
fn pin_reset_then_settle_with_new_pin() {
    let mut engine = Engine::new();
    let user = register(&mut engine, "1234", 100.0);
    let provider = register(&mut engine, "5678", 0.0);
    let mut creds = StaticCredentials::new();
    creds.insert(user, "correct horse");

    engine.reset_pin(user, "correct horse", "9999", &creds).unwrap();

    let args = SettleArgs {
        receiver: provider,
        pin: "9999".to_string(),
        amount: Some(Amount::from_float(40.0)),
        booking_id: None,
        request_id: None,
        idempotency_key: None,
    };
    engine.settle(user, args).unwrap();
    assert_eq!(engine.wallet(user).unwrap().balance(), Amount::from_float(60.0));
}

#[tokio::test]
async fn concurrent_settlements_cannot_overdraw() {
    let mut engine = Engine::new();
    let payer = register(&mut engine, "1234", 100.0);
    let first = register(&mut engine, "1111", 0.0);
    let second = register(&mut engine, "2222", 0.0);
    let engine = Arc::new(Mutex::new(engine));

    let mut handles = Vec::new();
    for receiver in [first, second] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let args = SettleArgs {
                receiver,
                pin: "1234".to_string(),
                amount: Some(Amount::from_float(60.0)),
                booking_id: None,
                request_id: None,
                idempotency_key: None,
            };
            engine.lock().await.settle(payer, args).map(|r| r.id)
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(SettlementError::InsufficientBalance { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);

    let engine = engine.lock().await;
    assert_eq!(engine.wallet(payer).unwrap().balance(), Amount::from_float(40.0));
    assert_eq!(engine.history(payer, 1, 10).total, 1);
}

#[tokio::test]
async fn concurrent_request_creation_has_one_winner() {
    let mut engine = Engine::new();
    let user = Uuid::new_v4();
    let provider = Uuid::new_v4();
    let booking_id = engine.create_booking(user, new_booking(provider, 80.0)).unwrap().id;
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Confirmed)
        .unwrap();
    engine
        .update_booking_status(provider, booking_id, BookingStatus::Completed)
        .unwrap();
    let engine = Arc::new(Mutex::new(engine));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .lock()
                .await
                .create_request(provider, booking_id, Amount::from_float(80.0), String::new())
                .map(|r| r.id)
        }));
    }

    let mut ok = 0;
    let mut duplicate = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(RequestError::DuplicateRequest(_)) => duplicate += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(duplicate, 1);

    let engine = engine.lock().await;
    assert_eq!(engine.requests_for(user).len(), 1);
}

#[tokio::test]
async fn client_retry_with_idempotency_key_is_safe() {
    let mut engine = Engine::new();
    let payer = register(&mut engine, "1234", 100.0);
    let receiver = register(&mut engine, "5678", 0.0);
    let engine = Arc::new(Mutex::new(engine));

    // The client timed out and resubmits the same transfer twice
    let mut ids = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        let id = tokio::spawn(async move {
            let args = SettleArgs {
                receiver,
                pin: "1234".to_string(),
                amount: Some(Amount::from_float(75.0)),
                booking_id: None,
                request_id: None,
                idempotency_key: Some("client-retry-7".to_string()),
            };
            engine.lock().await.settle(payer, args).map(|r| r.id)
        })
        .await
        .unwrap()
        .unwrap();
        ids.push(id);
    }

    assert_eq!(ids[0], ids[1]);
    let engine = engine.lock().await;
    assert_eq!(engine.wallet(payer).unwrap().balance(), Amount::from_float(25.0));
    assert_eq!(engine.wallet(receiver).unwrap().balance(), Amount::from_float(75.0));
}
