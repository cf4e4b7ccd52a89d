use std::time::Duration;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use log::debug;
use momo_tools::{MomoApi, MomoConfig};
use settlement_engine::{
    db_types::PaymentIntent,
    events::EventProducers,
    settlement_objects::SettlementConfig,
    test_utils::{fixtures::seed_accepted_job, prepare_env::fresh_database},
    CommissionRate,
    IntentManagement,
    SettingsCache,
    SettlementApi,
    SqliteDatabase,
    DEFAULT_SETTINGS_TTL,
};

use crate::{
    auth::{Role, USER_ID_HEADER, USER_ROLE_HEADER},
    integrations::momo::MobileMoneyGateway,
    server::{json_config, path_config, ServerSettlementApi},
};

pub fn with_identity(req: TestRequest, user_id: &str, role: Role) -> TestRequest {
    req.insert_header((USER_ID_HEADER, user_id)).insert_header((USER_ROLE_HEADER, role.to_string()))
}

/// Sends `req` to an app built by `configure`. Errors raised by middleware are rendered the way the server would
/// render them, so every outcome comes back as a status and a body.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).app_data(path_config()).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned());
            (status, body.unwrap_or_default())
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

/// A settlement API over a fresh database and a sandbox gateway, with job-1 (owned by alice) and an accepted
/// application app-1 from bob already stored.
pub async fn sandbox_api() -> (ServerSettlementApi, String) {
    let (db, url) = fresh_database().await;
    seed_accepted_job(&db, "job-1", "alice", "app-1", "bob").await;
    let config = MomoConfig { base_url: "http://127.0.0.1:1".into(), sandbox: true, ..Default::default() };
    let gateway = MobileMoneyGateway::new(MomoApi::new(config).expect("sandbox gateway"));
    let rate: CommissionRate = "0.05".parse().expect("valid rate");
    let settings = SettingsCache::new(db.clone(), rate, DEFAULT_SETTINGS_TTL);
    let api = SettlementApi::new(db, gateway, settings, EventProducers::default(), SettlementConfig::default());
    (api, url)
}

/// Polls the ledger until `done` holds for the intent, or gives up after about two seconds.
pub async fn wait_for_intent<F>(db: &SqliteDatabase, id: i64, done: F) -> PaymentIntent
where F: Fn(&PaymentIntent) -> bool {
    let mut intent = None;
    for _ in 0..40 {
        let current = db.fetch_intent(id).await.expect("fetch intent").expect("intent exists");
        if done(&current) {
            return current;
        }
        intent = Some(current);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Payment #{id} never reached the expected state. Last seen: {intent:?}");
}
