use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::json;
use settle_common::{Money, Secret};
use settlement_engine::{
    db_types::{PaymentStatus, PayoutStatus},
    settlement_objects::{InitiatePaymentRequest, TIMEOUT_CODE},
    test_utils::prepare_env::drop_database,
};

use super::helpers::{sandbox_api, send_request, wait_for_intent};
use crate::{
    callback_queue::{create_callback_queue, CallbackQueue},
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, SIGNATURE_HEADER},
    routes::{collection_callback, payout_callback, timeout_callback},
};

const SECRET: &str = "callback-test-secret";

fn signed(path: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac(SECRET, body.as_bytes())))
        .set_payload(body.to_string())
}

fn configure_callbacks(queue: CallbackQueue) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::scope("/callbacks")
                .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(SECRET.to_string()), true))
                .service(collection_callback)
                .service(payout_callback)
                .service(timeout_callback),
        )
        .app_data(web::Data::new(queue));
    }
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

#[actix_web::test]
async fn unsigned_callbacks_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let (queue, _handler) = create_callback_queue(api, 10);
    let body = json!({"transaction_id": "col-1", "status": "SUCCESSFUL"}).to_string();
    let req = TestRequest::post()
        .uri("/callbacks/collection")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.clone());
    let (status, _) = send_request(req, configure_callbacks(queue.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post()
        .uri("/callbacks/collection")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac("not-the-secret", body.as_bytes())))
        .set_payload(body);
    let (status, _) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    drop_database(&url).await;
}

#[actix_web::test]
async fn collection_then_payout() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    let collection_id = payment.collection_correlation_id.clone().expect("collection id");
    let db = api.db().clone();
    let (queue, handler) = create_callback_queue(api, 10);
    tokio::spawn(handler.start_handler());

    let body = json!({"transaction_id": collection_id, "status": "SUCCESSFUL", "receipt": "MP-1", "amount": 1000});
    let req = signed("/callbacks/collection", &body.to_string());
    let (status, body) = send_request(req, configure_callbacks(queue.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intent = wait_for_intent(&db, payment.intent_id, |i| i.status == PaymentStatus::Completed).await;
    assert_eq!(intent.collection_receipt.as_deref(), Some("MP-1"));
    assert_eq!(intent.payout_status, PayoutStatus::AwaitingPayoutResult);
    let payout_id = intent.payout_correlation_id.clone().expect("payout id");
    assert!(payout_id.starts_with("sandbox-pay-"));

    let body = json!({"transaction_id": payout_id, "status": "SUCCESSFUL"});
    let (status, _) = send_request(signed("/callbacks/payout", &body.to_string()), configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::OK);
    let intent =
        wait_for_intent(&db, payment.intent_id, |i| i.payout_status == PayoutStatus::PayoutCompleted).await;
    assert_eq!(intent.status, PaymentStatus::Completed);
    assert!(intent.payout_completed_at.is_some());
    drop_database(&url).await;
}

#[actix_web::test]
async fn declined_collection() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    let collection_id = payment.collection_correlation_id.clone().expect("collection id");
    let db = api.db().clone();
    let (queue, handler) = create_callback_queue(api, 10);
    tokio::spawn(handler.start_handler());

    let body =
        json!({"transaction_id": collection_id, "status": "FAILED", "message": "Insufficient funds", "code": "NSF"});
    let req = signed("/callbacks/collection", &body.to_string());
    let (status, _) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::OK);
    let intent = wait_for_intent(&db, payment.intent_id, |i| i.status == PaymentStatus::Failed).await;
    assert_eq!(intent.failure_reason.as_deref(), Some("Insufficient funds"));
    assert_eq!(intent.failure_code.as_deref(), Some("NSF"));
    assert_eq!(intent.payout_status, PayoutStatus::None);
    drop_database(&url).await;
}

#[actix_web::test]
async fn collection_timeout() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    let collection_id = payment.collection_correlation_id.clone().expect("collection id");
    let db = api.db().clone();
    let (queue, handler) = create_callback_queue(api, 10);
    tokio::spawn(handler.start_handler());

    let body = json!({ "transaction_id": collection_id });
    let req = signed("/callbacks/timeout", &body.to_string());
    let (status, _) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::OK);
    let intent = wait_for_intent(&db, payment.intent_id, |i| i.status == PaymentStatus::Failed).await;
    assert_eq!(intent.failure_code.as_deref(), Some(TIMEOUT_CODE));
    drop_database(&url).await;
}

#[actix_web::test]
async fn interim_status_is_acknowledged_and_ignored() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let payment = api.initiate_payment(payment_request()).await.expect("payment started");
    let collection_id = payment.collection_correlation_id.clone().expect("collection id");
    let db = api.db().clone();
    // The handler is never started, so anything that reached the queue would sit there unprocessed
    let (queue, _handler) = create_callback_queue(api, 10);

    let body = json!({"transaction_id": collection_id, "status": "PENDING"});
    let req = signed("/callbacks/collection", &body.to_string());
    let (status, body) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Interim status"), "{body}");
    let intent = wait_for_intent(&db, payment.intent_id, |_| true).await;
    assert_eq!(intent.status, PaymentStatus::AwaitingCollectionResult);
    drop_database(&url).await;
}

#[actix_web::test]
async fn unknown_correlation_is_still_acknowledged() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let (queue, handler) = create_callback_queue(api, 10);
    tokio::spawn(handler.start_handler());
    let body = json!({"transaction_id": "col-999", "status": "SUCCESSFUL"});
    let req = signed("/callbacks/collection", &body.to_string());
    let (status, _) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::OK);
    drop_database(&url).await;
}

#[actix_web::test]
async fn malformed_callback() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let (queue, _handler) = create_callback_queue(api, 10);
    let req = signed("/callbacks/collection", r#"{"status": "SUCCESSFUL"}"#);
    let (status, body) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("ValidationError"), "{body}");
    drop_database(&url).await;
}

#[actix_web::test]
async fn stopped_queue() {
    let _ = env_logger::try_init().ok();
    let (api, url) = sandbox_api().await;
    let (queue, handler) = create_callback_queue(api, 10);
    drop(handler);
    let body = json!({"transaction_id": "col-1", "status": "SUCCESSFUL"});
    let req = signed("/callbacks/collection", &body.to_string());
    let (status, body) = send_request(req, configure_callbacks(queue)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("ServiceUnavailable"), "{body}");
    drop_database(&url).await;
}
