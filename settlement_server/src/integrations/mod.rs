pub mod momo;
pub mod notifications;
