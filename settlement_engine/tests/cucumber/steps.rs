use std::str::FromStr;

use cucumber::{given, then, when};
use rust_decimal::Decimal;
use settlement_engine::{
    db_types::{ApplicationStatus, JobStatus, Money, PaymentStatus, PayoutStatus},
    settlement_objects::{CollectionResult, InitiatePaymentRequest, PayoutResult, TransferOutcome},
    test_utils::fixtures::seed_job,
    traits::GatewayError,
    JobManagement,
    StatisticsApi,
};

use crate::cucumber::{SettlementSystem, SettlementWorld};

#[given(expr = "a settlement system with a commission rate of {float}")]
async fn settlement_system(world: &mut SettlementWorld, rate: f64) {
    let rate = Decimal::from_str(&rate.to_string()).expect("Not a decimal");
    world.system = Some(SettlementSystem::new(rate).await);
}

#[given(expr = "job '{word}' owned by '{word}' with an accepted application '{word}' from '{word}'")]
async fn accepted_job(world: &mut SettlementWorld, job: String, owner: String, app: String, applicant: String) {
    seed_job(world.api().db(), &job, &owner, &app, &applicant, ApplicationStatus::Accepted).await;
}

#[given(expr = "job '{word}' owned by '{word}' with a pending application '{word}' from '{word}'")]
async fn pending_job(world: &mut SettlementWorld, job: String, owner: String, app: String, applicant: String) {
    seed_job(world.api().db(), &job, &owner, &app, &applicant, ApplicationStatus::Pending).await;
}

#[given(expr = "the gateway will decline the next collection with {string}")]
async fn decline_collection(world: &mut SettlementWorld, reason: String) {
    world.gateway().next_collection(Err(GatewayError::Rejected { reason, code: None }));
}

#[given(expr = "the gateway is unreachable for the next collection")]
async fn unreachable_collection(world: &mut SettlementWorld) {
    world.gateway().next_collection(Err(GatewayError::Unavailable("connection refused".into())));
}

#[given(expr = "the gateway will decline the next payout with {string}")]
async fn decline_payout(world: &mut SettlementWorld, reason: String) {
    world.gateway().next_payout(Err(GatewayError::Rejected { reason, code: None }));
}

fn payment_request(payer: &str, amount: i64, job: &str, app: &str) -> InitiatePaymentRequest {
    InitiatePaymentRequest {
        job_id: job.to_string(),
        application_id: app.to_string(),
        payer_id: payer.to_string(),
        payer_contact: format!("{payer}-momo"),
        payee_contact: "payee-momo".to_string(),
        amount: Money::from(amount),
        description: Some(format!("Payment for {job}")),
    }
}

#[when(expr = "'{word}' pays {int} for job '{word}' and application '{word}'")]
async fn pay(world: &mut SettlementWorld, payer: String, amount: i64, job: String, app: String) {
    let result = world.api().initiate_payment(payment_request(&payer, amount, &job, &app)).await;
    world.payer = Some(payer);
    world.last_payment = Some(result);
}

#[when(expr = "'{word}' pays {int} for job '{word}' and application '{word}' twice at the same time")]
async fn pay_twice(world: &mut SettlementWorld, payer: String, amount: i64, job: String, app: String) {
    let api = world.api();
    let (a, b) = tokio::join!(
        api.initiate_payment(payment_request(&payer, amount, &job, &app)),
        api.initiate_payment(payment_request(&payer, amount, &job, &app))
    );
    world.payer = Some(payer);
    world.concurrent_payments = vec![a, b];
}

#[when(expr = "the gateway reports the collection as successful( again)")]
async fn collection_succeeded(world: &mut SettlementWorld) {
    let intent = world.latest_intent().await;
    let id = intent.collection_correlation_id.expect("No collection id");
    let result = CollectionResult::succeeded(&id, Some(format!("receipt-{id}")));
    world.last_callback = Some(world.api().handle_collection_result(result).await);
}

#[when(expr = "the gateway reports the collection as failed with {string}")]
async fn collection_failed(world: &mut SettlementWorld, reason: String) {
    let intent = world.latest_intent().await;
    let id = intent.collection_correlation_id.expect("No collection id");
    let result = CollectionResult::failed(&id, &reason, None);
    world.last_callback = Some(world.api().handle_collection_result(result).await);
}

#[when(expr = "the gateway reports a successful collection for '{word}'")]
async fn unknown_collection(world: &mut SettlementWorld, id: String) {
    let result = CollectionResult::succeeded(&id, None);
    world.last_callback = Some(world.api().handle_collection_result(result).await);
}

#[when(expr = "the gateway reports the payout as {word}")]
async fn payout_result(world: &mut SettlementWorld, outcome: String) {
    let intent = world.latest_intent().await;
    let id = intent.payout_correlation_id.expect("No payout id");
    let outcome = match outcome.as_str() {
        "successful" => TransferOutcome::Succeeded,
        "failed" => TransferOutcome::Failed,
        s => panic!("Unknown payout outcome: {s}"),
    };
    let result = PayoutResult { correlation_id: id, outcome, reason: Some("reported by gateway".into()) };
    world.last_callback = Some(world.api().handle_payout_result(result).await);
}

#[when(expr = "an administrator retries the payout")]
async fn retry_payout(world: &mut SettlementWorld) {
    let intent = world.latest_intent().await;
    world.api().retry_payout(intent.id).await.expect("Error retrying payout");
}

#[then(expr = "the payment split is {int} to the payee and {int} commission")]
async fn check_split(world: &mut SettlementWorld, payee: i64, commission: i64) {
    let payment = world.last_payment.as_ref().expect("No payment attempted").as_ref().expect("Payment failed");
    assert_eq!(payment.split.payee_amount, Money::from(payee));
    assert_eq!(payment.split.commission, Money::from(commission));
    let intent = world.latest_intent().await;
    assert_eq!(intent.payee_amount, Money::from(payee));
    assert_eq!(intent.commission_amount, Money::from(commission));
    assert_eq!(intent.payee_amount + intent.commission_amount, intent.total_amount);
}

#[then(expr = "the payment attempt fails with {word}")]
async fn check_payment_error(world: &mut SettlementWorld, code: String) {
    let result = world.last_payment.as_ref().expect("No payment attempted");
    let err = result.as_ref().expect_err("The payment attempt succeeded");
    assert_eq!(err.code(), code, "Unexpected error: {err}");
}

#[then(expr = "the payment is {word}")]
async fn check_status(world: &mut SettlementWorld, status: String) {
    let intent = world.latest_intent().await;
    let expected = status.parse::<PaymentStatus>().expect("Unknown payment status");
    assert_eq!(intent.status, expected);
}

#[then(expr = "the payout is {word}")]
async fn check_payout_status(world: &mut SettlementWorld, status: String) {
    let intent = world.latest_intent().await;
    let expected = status.parse::<PayoutStatus>().expect("Unknown payout status");
    assert_eq!(intent.payout_status, expected);
}

#[then(expr = "the failure reason is {string}")]
async fn check_failure_reason(world: &mut SettlementWorld, reason: String) {
    let intent = world.latest_intent().await;
    assert_eq!(intent.failure_reason.as_deref(), Some(reason.as_str()));
}

#[then(expr = "job '{word}' is fulfilled")]
async fn check_fulfilled(world: &mut SettlementWorld, job_id: String) {
    let job = world.api().db().fetch_job(&job_id).await.expect("Error fetching job").expect("Job not found");
    assert_eq!(job.status, JobStatus::Fulfilled);
}

#[then(expr = "job '{word}' is not fulfilled")]
async fn check_not_fulfilled(world: &mut SettlementWorld, job_id: String) {
    let job = world.api().db().fetch_job(&job_id).await.expect("Error fetching job").expect("Job not found");
    assert_ne!(job.status, JobStatus::Fulfilled);
}

#[then(expr = "{int} payout(s) of {int} has/have been requested")]
async fn check_payouts(world: &mut SettlementWorld, count: usize, amount: i64) {
    let payouts = world.gateway().payout_orders();
    assert_eq!(payouts.len(), count);
    assert!(payouts.iter().all(|p| p.amount == Money::from(amount)));
}

#[then(expr = "no payout has been requested")]
async fn check_no_payout(world: &mut SettlementWorld) {
    assert!(world.gateway().payout_orders().is_empty());
}

#[then(expr = "the last callback was {word}")]
async fn check_callback(world: &mut SettlementWorld, outcome: String) {
    let result = world.last_callback.as_ref().expect("No callback delivered");
    let outcome_name = match result {
        Ok(outcome) => format!("{outcome:?}"),
        Err(e) => e.code().to_string(),
    };
    assert_eq!(outcome_name, outcome);
}

#[then(expr = "exactly {int} attempt succeeds and {int} fails with {word}")]
async fn check_concurrent(world: &mut SettlementWorld, ok: usize, failed: usize, code: String) {
    let results = &world.concurrent_payments;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), ok);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(e) if e.code() == code)).count(), failed);
    assert_eq!(world.gateway().collection_orders().len(), ok);
}

#[then(expr = "the statistics show {int} completed payment(s) worth {int} with {int} commission")]
async fn check_statistics(world: &mut SettlementWorld, count: i64, volume: i64, commission: i64) {
    let stats = StatisticsApi::new(world.api().db().clone());
    let snapshot = stats.snapshot().await.expect("Error fetching statistics");
    assert_eq!(snapshot.completed_count, count);
    assert_eq!(snapshot.completed_volume, Money::from(volume));
    assert_eq!(snapshot.commission_volume, Money::from(commission));
    let refreshed = stats.refresh().await.expect("Error refreshing statistics");
    assert_eq!(refreshed, snapshot);
}
