use std::time::Duration;

use actix_web::{dev::Server, error::JsonPayloadError, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use momo_tools::MomoApi;
use settlement_engine::{HistoryApi, SettingsCache, SettlementApi, SqliteDatabase, StatisticsApi};

use crate::{
    callback_queue::{create_callback_queue, CallbackQueue, CALLBACK_QUEUE_SIZE},
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{momo::MobileMoneyGateway, notifications::create_notification_event_handlers},
    middleware::{HmacMiddlewareFactory, SIGNATURE_HEADER},
    routes::{
        collection_callback,
        health,
        payout_callback,
        timeout_callback,
        AdminPaymentRoute,
        CommissionRateRoute,
        InitiatePaymentRoute,
        PaymentEventsRoute,
        PaymentHistoryRoute,
        PaymentStatusRoute,
        RefreshStatisticsRoute,
        RetryPayoutRoute,
        SetCommissionRateRoute,
        StatisticsRoute,
    },
    workers::{start_reconciliation_worker, start_statistics_worker},
};

/// The settlement API as the server runs it: SQLite ledger, mobile-money gateway.
pub type ServerSettlementApi = SettlementApi<SqliteDatabase, MobileMoneyGateway>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("🚀️ Starting settlement server in {} mode", config.environment);
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let momo = MomoApi::new(config.momo.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MobileMoneyGateway::new(momo);
    let settings = SettingsCache::new(db.clone(), config.default_commission_rate, config.settings_ttl);

    let handlers = create_notification_event_handlers();
    let producers = handlers.producers();
    let api = SettlementApi::new(db.clone(), gateway, settings, producers, config.settlement_config());

    let (queue, queue_handler) = create_callback_queue(api.clone(), CALLBACK_QUEUE_SIZE);
    tokio::spawn(handlers.start_handlers());
    tokio::spawn(queue_handler.start_handler());
    let _reconciler = start_reconciliation_worker(api.clone(), config.reconcile_interval, config.reconcile_after);
    let _stats = start_statistics_worker(db.clone(), config.stats_refresh_interval);

    let srv = create_server_instance(config, db, api, queue)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    api: ServerSettlementApi,
    queue: CallbackQueue,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let hmac_secret = config.callback_hmac_secret.clone();
    let hmac_checks = config.callback_hmac_checks;
    let srv = HttpServer::new(move || {
        let history_api = HistoryApi::new(db.clone());
        let statistics_api = StatisticsApi::new(db.clone());
        // All workers share the one settings cache, so that a rate change is seen everywhere at once
        let settings = api.settings().clone();
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(web::Data::new(api.clone()))
            .app_data(web::Data::new(history_api))
            .app_data(web::Data::new(statistics_api))
            .app_data(web::Data::new(settings))
            .app_data(web::Data::new(queue.clone()))
            .app_data(web::Data::new(options));
        let api_scope = web::scope("/api")
            .service(InitiatePaymentRoute::<SqliteDatabase, MobileMoneyGateway>::new())
            .service(PaymentEventsRoute::<SqliteDatabase>::new())
            .service(PaymentStatusRoute::<SqliteDatabase>::new())
            .service(PaymentHistoryRoute::<SqliteDatabase>::new())
            .service(AdminPaymentRoute::<SqliteDatabase>::new())
            .service(RetryPayoutRoute::<SqliteDatabase, MobileMoneyGateway>::new())
            .service(CommissionRateRoute::<SqliteDatabase>::new())
            .service(SetCommissionRateRoute::<SqliteDatabase>::new())
            .service(StatisticsRoute::<SqliteDatabase>::new())
            .service(RefreshStatisticsRoute::<SqliteDatabase>::new());
        let callback_scope = web::scope("/callbacks")
            .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, hmac_secret.clone(), hmac_checks))
            .service(collection_callback)
            .service(payout_callback)
            .service(timeout_callback);
        app.service(health).service(api_scope).service(callback_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies are reported in the same `{error, code}` shape as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req| {
        debug!("💻️ Rejected request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into())
}
