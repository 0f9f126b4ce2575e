//! Middleware modules.

pub mod error;
pub mod worker_auth;
