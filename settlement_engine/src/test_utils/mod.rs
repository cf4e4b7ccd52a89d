//! Helpers for tests that need a real database or a controllable gateway.
pub mod fixtures;
pub mod gateway;
pub mod prepare_env;
