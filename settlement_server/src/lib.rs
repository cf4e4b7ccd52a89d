//! # Settlement server
//! This crate hosts the HTTP surface of the split-payment settlement service. It is responsible for:
//! * Accepting payment requests from the marketplace and starting the collection from the payer.
//! * Receiving signed callbacks from the mobile-money gateway and queueing them for the settlement engine.
//! * Serving payment status, history, and the admin endpoints (commission rate, payout retries, statistics).
//! * Running the background reconciliation and statistics workers.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Routes for marketplace users and administrators. The caller is identified by the `X-User-Id` and
//!   `X-User-Role` headers, which the marketplace's gateway sets after authenticating the user.
//! * `/callbacks/collection`, `/callbacks/payout`, `/callbacks/timeout`: Gateway callbacks. These must carry a valid
//!   `X-Gateway-Signature`.

pub mod auth;
pub mod callback_queue;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
