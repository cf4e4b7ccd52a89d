use std::fmt::Debug;

use cucumber::World;
use log::*;
use rust_decimal::Decimal;
use settlement_engine::{
    db_types::{Pagination, PaymentIntent},
    events::EventProducers,
    settlement_objects::{CallbackOutcome, InitiatedPayment, SettlementConfig},
    test_utils::{
        gateway::ScriptedGateway,
        prepare_env::{create_database, drop_database, random_db_path, run_migrations},
    },
    CommissionRate,
    IntentManagement,
    SettlementDatabase,
    SettingsCache,
    SettlementApi,
    SettlementError,
    SqliteDatabase,
    DEFAULT_SETTINGS_TTL,
};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
    /// The payer of the most recent payment attempt
    pub payer: Option<String>,
    pub last_payment: Option<Result<InitiatedPayment, SettlementError>>,
    pub last_callback: Option<Result<CallbackOutcome, SettlementError>>,
    pub concurrent_payments: Vec<Result<InitiatedPayment, SettlementError>>,
}

pub struct SettlementSystem {
    pub db_path: String,
    pub api: SettlementApi<SqliteDatabase, ScriptedGateway>,
    pub gateway: ScriptedGateway,
}

impl Debug for SettlementSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementSystem ({})", self.db_path)
    }
}

impl SettlementWorld {
    pub fn system(&self) -> &SettlementSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn api(&self) -> &SettlementApi<SqliteDatabase, ScriptedGateway> {
        &self.system().api
    }

    pub fn gateway(&self) -> &ScriptedGateway {
        &self.system().gateway
    }

    /// The most recent payment intent of the most recent payer
    pub async fn latest_intent(&self) -> PaymentIntent {
        let payer = self.payer.as_deref().expect("No payment has been attempted");
        let page = self
            .api()
            .db()
            .fetch_intents_for_user(payer, Pagination::new(Some(1), Some(1)))
            .await
            .expect("Error fetching payment history");
        page.items.into_iter().next().expect("No payment intent found")
    }
}

impl SettlementSystem {
    pub async fn new(rate: Decimal) -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let gateway = ScriptedGateway::new();
        let rate = CommissionRate::new(rate).expect("Invalid commission rate");
        let settings = SettingsCache::new(db.clone(), rate, DEFAULT_SETTINGS_TTL);
        let api =
            SettlementApi::new(db, gateway.clone(), settings, EventProducers::default(), SettlementConfig::default());
        Self { db_path: url, api, gateway }
    }

    /// Closes the pool and deletes the scenario database. Use only when the scenario passed; failing scenarios keep
    /// their database around for inspection.
    pub async fn tear_down(&mut self) {
        if let Err(e) = self.api.db_mut().close().await {
            error!("Could not close {}: {e}", self.db_path);
        }
        drop_database(&self.db_path).await;
    }
}
