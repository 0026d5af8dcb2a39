//! SurrealDB persistence for the fleet dispatch system.
//!
//! This crate provides the database connection, the schema, a generic
//! query engine for filtered and scoped lists, and a repository per entity.
//! [`JobQueue`](repositories::JobQueue) implements the job claim protocol.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
pub mod query;
mod records;
pub mod repositories;
mod schema;

pub use connection::{Database, DbConfig, DbError, get_db, init_db};
pub use schema::init_schema;

/// Initialize the database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await?;
    Ok(())
}
