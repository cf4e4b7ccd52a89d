use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use settle_common::Money;
use settlement_engine::{
    db_types::{IntentEvent, Page, PaymentIntent, PaymentStatus, PayoutStatus},
    test_utils::prepare_env::drop_database,
    HistoryApi,
    SqliteDatabase,
};

use super::{
    helpers::{sandbox_api, send_request, with_identity},
    mocks::MockIntentManager,
};
use crate::{
    auth::Role,
    config::ServerOptions,
    integrations::momo::MobileMoneyGateway,
    routes::{InitiatePaymentRoute, PaymentEventsRoute, PaymentHistoryRoute, PaymentStatusRoute},
    server::ServerSettlementApi,
};

#[actix_web::test]
async fn payment_status_requires_identity() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/payment-status/1"), configure_history).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("NotAuthenticated"), "{body}");
}

#[actix_web::test]
async fn payment_status_for_the_payer() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/1"), "alice", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::OK);
    let payment: PaymentIntent = serde_json::from_str(&body).expect("a payment");
    assert_eq!(payment, sample_intent(1));
}

#[actix_web::test]
async fn payment_status_for_the_payee() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/1"), "bob", Role::User);
    let (status, _) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn payment_status_for_a_stranger() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/1"), "mallory", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("NotAuthorized"), "{body}");
}

#[actix_web::test]
async fn admins_can_see_any_payment() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/1"), "root", Role::Admin);
    let (status, _) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn unknown_payment() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/42"), "alice", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("NotFound"), "{body}");
}

#[actix_web::test]
async fn malformed_payment_id() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/abc"), "alice", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("ValidationError"), "{body}");
}

#[actix_web::test]
async fn payment_events() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-status/1/events"), "bob", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<IntentEvent> = serde_json::from_str(&body).expect("a list of events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].to_state, "Completed");

    let req = with_identity(TestRequest::get().uri("/payment-status/1/events"), "mallory", Role::User);
    let (status, _) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn payment_history_is_paged() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/payment-history?page=2&per_page=5"), "alice", Role::User);
    let (status, body) = send_request(req, configure_history).await;
    assert_eq!(status, StatusCode::OK);
    let page: Page<PaymentIntent> = serde_json::from_str(&body).expect("a page");
    assert_eq!(page.page, 2);
    assert_eq!(page.per_page, 5);
    assert_eq!(page.total, 6);
    assert_eq!(page.items.len(), 1);
}

#[actix_web::test]
async fn initiate_payment() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let req = with_identity(TestRequest::post().uri("/initiate-payment"), "alice", Role::User).set_json(json!({
        "job_id": "job-1",
        "application_id": "app-1",
        "amount": "1000",
        "payer_contact": "2250700000001",
        "payee_contact": "2250700000002",
        "description": "Garden work"
    }));
    let (status, body) = send_request(req, configure_payments(api.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let payment: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(payment["split"]["payee_amount"], 950);
    assert_eq!(payment["split"]["commission"], 50);
    assert_eq!(payment["status"], "AwaitingCollectionResult");
    let correlation_id = payment["collection_correlation_id"].as_str().expect("a correlation id");
    assert!(correlation_id.starts_with("sandbox-col-"));

    // The job can only be paid for once
    let req = with_identity(TestRequest::post().uri("/initiate-payment"), "alice", Role::User).set_json(json!({
        "job_id": "job-1",
        "application_id": "app-1",
        "amount": 1000,
        "payer_contact": "2250700000001",
        "payee_contact": "2250700000002"
    }));
    let (status, body) = send_request(req, configure_payments(api)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("AlreadyPaid"), "{body}");
    drop_database(&url).await;
}

#[actix_web::test]
async fn only_the_job_owner_can_pay() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let req = with_identity(TestRequest::post().uri("/initiate-payment"), "mallory", Role::User).set_json(json!({
        "job_id": "job-1",
        "application_id": "app-1",
        "amount": 1000,
        "payer_contact": "2250700000001",
        "payee_contact": "2250700000002"
    }));
    let (status, body) = send_request(req, configure_payments(api)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("NotAuthorized"), "{body}");
    drop_database(&url).await;
}

#[actix_web::test]
async fn invalid_amounts_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    for amount in [json!("ten"), json!(0), json!(-5)] {
        let req = with_identity(TestRequest::post().uri("/initiate-payment"), "alice", Role::User).set_json(json!({
            "job_id": "job-1",
            "application_id": "app-1",
            "amount": amount,
            "payer_contact": "2250700000001",
            "payee_contact": "2250700000002"
        }));
        let (status, body) = send_request(req, configure_payments(api.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{amount}");
        assert!(body.contains("InvalidAmount"), "{body}");
    }
    drop_database(&url).await;
}

#[actix_web::test]
async fn malformed_payment_request() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let req = with_identity(TestRequest::post().uri("/initiate-payment"), "alice", Role::User)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"job_id": "job-1", "amount": "#);
    let (status, body) = send_request(req, configure_payments(api)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("ValidationError"), "{body}");
    drop_database(&url).await;
}

fn configure_payments(api: ServerSettlementApi) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(InitiatePaymentRoute::<SqliteDatabase, MobileMoneyGateway>::new())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(ServerOptions { currency_decimals: 0 }));
    }
}

fn configure_history(cfg: &mut ServiceConfig) {
    let mut db = MockIntentManager::new();
    db.expect_fetch_intent().returning(|id| Ok((id == 1).then(|| sample_intent(1))));
    db.expect_fetch_intent_events().returning(|id| {
        Ok(vec![IntentEvent {
            id: 10,
            intent_id: id,
            phase: "collection".into(),
            from_state: "AwaitingCollectionResult".into(),
            to_state: "Completed".into(),
            detail: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap(),
        }])
    });
    db.expect_fetch_intents_for_user()
        .withf(|user, p| user == "alice" && p.page == 2 && p.per_page == 5)
        .returning(|_, p| Ok(Page { items: vec![sample_intent(6)], page: p.page, per_page: p.per_page, total: 6 }));
    cfg.service(PaymentEventsRoute::<MockIntentManager>::new())
        .service(PaymentStatusRoute::<MockIntentManager>::new())
        .service(PaymentHistoryRoute::<MockIntentManager>::new())
        .app_data(web::Data::new(HistoryApi::new(db)));
}

fn sample_intent(id: i64) -> PaymentIntent {
    PaymentIntent {
        id,
        job_id: format!("job-{id}"),
        application_id: format!("app-{id}"),
        payer_id: "alice".into(),
        payee_id: "bob".into(),
        payer_contact: "2250700000001".into(),
        payee_contact: "2250700000002".into(),
        description: None,
        currency: "XOF".into(),
        total_amount: Money::from(1000),
        payee_amount: Money::from(950),
        commission_amount: Money::from(50),
        commission_rate: "0.05".parse().unwrap(),
        status: PaymentStatus::Completed,
        payout_status: PayoutStatus::PayoutCompleted,
        collection_correlation_id: Some(format!("col-{id}")),
        payout_correlation_id: Some(format!("pay-{id}")),
        payout_reference: Some(format!("sps-intent-{id}-payout-1")),
        collection_receipt: Some(format!("receipt-{id}")),
        failure_reason: None,
        failure_code: None,
        payout_failure_reason: None,
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 10, 0).unwrap(),
        completed_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap()),
        payout_completed_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 10, 0).unwrap()),
    }
}
