//! # Herald Core
//!
//! The domain layer of the Herald publishing pipeline.
//! Domain types, the ports infrastructure must implement, and the pure
//! publishing logic (formatting, retry policy, dispatch, status aggregation).

pub mod domain;
pub mod error;
pub mod ports;
pub mod publishing;

pub use error::DomainError;
