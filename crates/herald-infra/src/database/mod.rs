//! Publishing store implementations.

mod memory;

pub use memory::InMemoryPublishingStore;

#[cfg(feature = "postgres")]
mod connections;
#[cfg(feature = "postgres")]
pub mod entity;
#[cfg(feature = "postgres")]
mod postgres_repo;

#[cfg(feature = "postgres")]
pub use connections::{DatabaseConfig, connect};
#[cfg(feature = "postgres")]
pub use postgres_repo::PostgresPublishingStore;

#[cfg(feature = "postgres")]
#[cfg(test)]
mod tests;
