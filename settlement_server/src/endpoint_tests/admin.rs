use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use settle_common::Money;
use settlement_engine::{
    db_types::{PaymentStatus, StatisticsSnapshot},
    settlement_objects::InitiatePaymentRequest,
    test_utils::prepare_env::drop_database,
    HistoryApi,
    SqliteDatabase,
    StatisticsApi,
};

use super::{
    helpers::{sandbox_api, send_request, with_identity},
    mocks::MockStatisticsManager,
};
use crate::{
    auth::Role,
    integrations::momo::MobileMoneyGateway,
    routes::{
        AdminPaymentRoute,
        CommissionRateRoute,
        RefreshStatisticsRoute,
        RetryPayoutRoute,
        SetCommissionRateRoute,
        StatisticsRoute,
    },
    server::ServerSettlementApi,
};

#[actix_web::test]
async fn commission_rate_is_admin_only() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let req = with_identity(TestRequest::get().uri("/admin/settings/commission"), "alice", Role::User);
    let (status, _) = send_request(req, configure_admin(api.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri("/admin/settings/commission");
    let (status, _) = send_request(req, configure_admin(api)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    drop_database(&url).await;
}

#[actix_web::test]
async fn read_and_change_commission_rate() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let req = with_identity(TestRequest::get().uri("/admin/settings/commission"), "root", Role::Admin);
    let (status, body) = send_request(req, configure_admin(api.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let rate: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(rate["rate"], "0.05");

    let req = with_identity(TestRequest::put().uri("/admin/settings/commission"), "root", Role::Admin)
        .set_json(json!({"rate": "0.1"}));
    let (status, body) = send_request(req, configure_admin(api.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = with_identity(TestRequest::get().uri("/admin/settings/commission"), "root", Role::Admin);
    let (_, body) = send_request(req, configure_admin(api.clone())).await;
    let rate: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(rate["rate"], "0.1");

    // New payments use the new rate
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    assert_eq!(payment.split.payee_amount, Money::from(900));
    assert_eq!(payment.split.commission, Money::from(100));
    drop_database(&url).await;
}

#[actix_web::test]
async fn commission_rate_must_be_in_range() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    for rate in ["1.0", "-0.1", "lots"] {
        let req = with_identity(TestRequest::put().uri("/admin/settings/commission"), "root", Role::Admin)
            .set_json(json!({ "rate": rate }));
        let (status, _) = send_request(req, configure_admin(api.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{rate}");
    }
    drop_database(&url).await;
}

#[actix_web::test]
async fn payout_retry_needs_a_failed_payout() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    assert_eq!(payment.status, PaymentStatus::AwaitingCollectionResult);
    let path = format!("/admin/payments/{}/retry-payout", payment.intent_id);

    let req = with_identity(TestRequest::post().uri(&path), "alice", Role::User);
    let (status, _) = send_request(req, configure_admin(api.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_identity(TestRequest::post().uri(&path), "root", Role::Admin);
    let (status, body) = send_request(req, configure_admin(api.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("PayoutNotAllowed"), "{body}");

    let req = with_identity(TestRequest::post().uri("/admin/payments/999/retry-payout"), "root", Role::Admin);
    let (status, _) = send_request(req, configure_admin(api)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    drop_database(&url).await;
}

#[actix_web::test]
async fn payment_details_include_the_transition_log() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    let req =
        with_identity(TestRequest::get().uri(&format!("/admin/payments/{}", payment.intent_id)), "root", Role::Admin);
    let (status, body) = send_request(req, configure_admin(api)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let details: Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(details["payment"]["id"], payment.intent_id);
    assert_eq!(details["payment"]["status"], "AwaitingCollectionResult");
    let events = details["events"].as_array().expect("a list of events");
    assert!(!events.is_empty());
    assert_eq!(events.last().unwrap()["to_state"], "AwaitingCollectionResult");
    drop_database(&url).await;
}

#[actix_web::test]
async fn statistics() {
    let _ = env_logger::try_init().ok();
    let req = with_identity(TestRequest::get().uri("/admin/statistics"), "root", Role::Admin);
    let (status, body) = send_request(req, configure_statistics).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: StatisticsSnapshot = serde_json::from_str(&body).expect("a snapshot");
    assert_eq!(snapshot.completed_count, 3);
    assert_eq!(snapshot.completed_volume, Money::from(3000));

    let req = with_identity(TestRequest::post().uri("/admin/statistics/refresh"), "root", Role::Admin);
    let (status, body) = send_request(req, configure_statistics).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: StatisticsSnapshot = serde_json::from_str(&body).expect("a snapshot");
    assert_eq!(snapshot.completed_count, 4);

    let req = with_identity(TestRequest::get().uri("/admin/statistics"), "bob", Role::User);
    let (status, _) = send_request(req, configure_statistics).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn payment_request() -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        job_id: "job-1".into(),
        application_id: "app-1".into(),
        payer_id: "alice".into(),
        payer_contact: "2250700000001".into(),
        payee_contact: "2250700000002".into(),
        amount: Money::from(1000),
        description: None,
    }
}

fn configure_admin(api: ServerSettlementApi) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let settings = api.settings().clone();
        let history = HistoryApi::new(api.db().clone());
        cfg.service(CommissionRateRoute::<SqliteDatabase>::new())
            .service(SetCommissionRateRoute::<SqliteDatabase>::new())
            .service(RetryPayoutRoute::<SqliteDatabase, MobileMoneyGateway>::new())
            .service(AdminPaymentRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(history))
            .app_data(web::Data::new(api));
    }
}

fn configure_statistics(cfg: &mut ServiceConfig) {
    let mut db = MockStatisticsManager::new();
    db.expect_fetch_statistics().returning(|| Ok(snapshot(3)));
    db.expect_recompute_statistics().returning(|| Ok(snapshot(4)));
    cfg.service(StatisticsRoute::<MockStatisticsManager>::new())
        .service(RefreshStatisticsRoute::<MockStatisticsManager>::new())
        .app_data(web::Data::new(StatisticsApi::new(db)));
}

fn snapshot(completed: i64) -> StatisticsSnapshot {
    StatisticsSnapshot {
        completed_count: completed,
        completed_volume: Money::from(1000 * completed),
        commission_volume: Money::from(50 * completed),
        average_completed_amount: Money::from(1000),
        ..Default::default()
    }
}
