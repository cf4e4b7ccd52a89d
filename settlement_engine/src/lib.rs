//! Settlement engine for the job marketplace
//!
//! When a client pays for a job, the money moves in two phases through an external mobile-money gateway. It is first
//! collected from the client (the payer), and once that succeeds, the service provider's share is paid out to them
//! (the payee). The platform keeps a commission. This library holds the core logic for that flow. It is
//! gateway-agnostic and backend-agnostic.
//!
//! The library is divided into these main sections:
//! 1. The backend contracts ([`mod@traits`]). The ledger, job records, statistics and settings are all accessed through
//!    traits, as is the payment gateway. SQLite is the supplied backend ([`SqliteDatabase`]). The data types stored
//!    in the ledger are defined in the [`mod@db_types`] module and are public.
//! 2. The commission policy ([`mod@commission`]), which splits a total into the payee share and the platform's cut.
//! 3. The public API ([`mod@settlement_api`]). [`SettlementApi`] runs the state machine of a payment, [`HistoryApi`]
//!    and [`StatisticsApi`] provide read access, and [`SettingsCache`] holds the commission rate.
//!
//! The engine also publishes events (see [`mod@events`]) when payments change state, so that notifications can be
//! delivered by the rest of the marketplace. Publishing never blocks a payment.
pub mod commission;
pub mod db_types;
pub mod events;
pub mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use commission::{compute_split, CommissionError, CommissionRate, Split};
pub use settlement_api::{
    errors::SettlementError,
    history_api::HistoryApi,
    settings_cache::{SettingsCache, COMMISSION_RATE_KEY, DEFAULT_SETTINGS_TTL},
    settlement_flow_api::SettlementApi,
    settlement_objects,
    statistics_api::StatisticsApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    IntentManagement,
    JobManagement,
    PaymentGateway,
    SettingsManagement,
    SettlementDatabase,
    StatisticsManagement,
};
