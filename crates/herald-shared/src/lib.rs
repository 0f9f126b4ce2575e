//! # Herald Shared
//!
//! Request and response types of the publisher HTTP API, shared with
//! clients such as the composer backend.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
