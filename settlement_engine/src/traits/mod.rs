//! # Backend and collaborator contracts
//!
//! The settlement engine never talks to a database or to the mobile-money gateway directly. It works against the
//! traits in this module, and concrete backends (e.g. [`crate::SqliteDatabase`]) or gateway adapters implement them.
//!
//! * [`SettlementDatabase`] is the ledger: creating payment intents and applying state transitions to them. Every
//!   transition is a compare-and-set, so racing writers cannot both apply the same change.
//! * [`IntentManagement`] provides read access to intents and their transition history.
//! * [`JobManagement`] exposes the job and application records that settlement validates against.
//! * [`StatisticsManagement`] maintains the derived statistics rollup.
//! * [`SettingsManagement`] stores platform settings such as the commission rate.
//! * [`PaymentGateway`] is the capability surface of the external mobile-money gateway.
mod data_objects;
mod intent_management;
mod job_management;
mod payment_gateway;
mod settings_management;
mod settlement_database;
mod statistics_management;

pub use data_objects::{IntentTransition, TransitionResult};
pub use intent_management::IntentManagement;
pub use job_management::JobManagement;
pub use payment_gateway::{
    CollectionOrder,
    GatewayError,
    PaymentGateway,
    PayoutOrder,
    TransferKind,
    TransferState,
    TransferStatus,
};
pub use settings_management::SettingsManagement;
pub use settlement_database::{LedgerError, SettlementDatabase};
pub use statistics_management::StatisticsManagement;
