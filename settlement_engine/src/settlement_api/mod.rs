//! # Settlement engine public API
//!
//! The `settlement_api` module exposes the programmatic API of the settlement engine. Like the backend traits, it is
//! split up so that callers only need the capabilities they actually use.
//!
//! * [`settlement_flow_api`] is the primary API. It creates payments, applies gateway callbacks, starts payouts and
//!   reconciles collections whose callbacks never arrived.
//! * [`history_api`] provides read access to payments for the people involved in them, and for administrators.
//! * [`statistics_api`] reads and rebuilds the statistics rollup.
//! * [`settings_cache`] holds the platform commission rate.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use settlement_engine::{HistoryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements IntentManagement
//! let api = HistoryApi::new(db);
//! let payment = api.payment_status(42, "user-1").await?;
//! ```
pub mod errors;
pub mod history_api;
pub mod settings_cache;
pub mod settlement_flow_api;
pub mod settlement_objects;
pub mod statistics_api;
