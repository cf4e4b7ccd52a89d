//! # Mobile-money gateway client
//!
//! A thin, provider-shaped client for the mobile-money gateway used to collect funds from payers and pay out to
//! payees. The client handles credential exchange (with a shared, single-flight token cache), request timeouts and
//! mapping of gateway responses into [`MomoApiError`]s. It knows nothing about the settlement ledger.
//!
//! A sandbox mode, enabled only through [`MomoConfig::sandbox`], short-circuits every network call and synthesises
//! successful responses. It is meant for demos and local development.
mod api;
mod config;
mod data_objects;
mod error;
mod token_cache;

pub use api::MomoApi;
pub use config::MomoConfig;
pub use data_objects::{
    AccessToken,
    CollectionRequest,
    GatewayReceipt,
    PayoutRequest,
    TransactionState,
    TransactionStatus,
};
pub use error::MomoApiError;
pub use token_cache::TokenCache;
