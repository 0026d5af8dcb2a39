//! Database connection management with lazy initialization.

use std::sync::LazyLock;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Global database instance using lazy initialization.
static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

/// Endpoint schemes of engines that run inside this process.
const EMBEDDED_ENGINES: &[&str] = &["mem", "rocksdb"];

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection mode: "mem://" or "rocksdb://path"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "fleet".to_string(),
            database: "dispatch".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Use an arbitrary endpoint understood by the `any` engine.
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// The storage engine named by the endpoint's scheme.
    ///
    /// Only embedded engines are accepted. The job queue serialises state
    /// transitions inside the process, which covers every claimant only
    /// when the store belongs to this process.
    pub fn engine(&self) -> Result<&str, DbError> {
        let scheme = self
            .endpoint
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or_default();
        if EMBEDDED_ENGINES.contains(&scheme) {
            Ok(scheme)
        } else {
            Err(DbError::UnsupportedEngine(self.endpoint.clone()))
        }
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    /// Opaque failure from the store; callers treat it as fatal to the request.
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    /// Unknown filter or sort field, bad pagination, malformed value.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// A conditional transition matched no row: the job is absent, belongs
    /// to another agent, or is not in the required prior state.
    #[error("Not found or invalid state: {0}")]
    NotFoundOrInvalidState(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The endpoint names an engine other processes can share.
    #[error("Unsupported database engine, expected mem:// or rocksdb://: {0}")]
    UnsupportedEngine(String),
}

impl DbError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::NotFound(_) | DbError::NotFoundOrInvalidState(_)
        )
    }
}

/// Initialize the database connection.
///
/// This should be called once at application startup before any database operations.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    config.engine()?;
    DB.get_or_try_init(|| async {
        tracing::info!("Connecting to database: {}", config.endpoint);

        let db = connect(&config.endpoint).await?;

        // Authenticate if credentials provided
        if let Some((username, password)) = &config.credentials {
            db.signin(Root { username, password }).await?;
        }

        // Select namespace and database
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        tracing::info!(
            "Connected to database: {}/{}",
            config.namespace,
            config.database
        );

        Ok(db)
    })
    .await
}

/// Get the database connection.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_engines_are_accepted() {
        assert_eq!(DbConfig::memory().engine().ok(), Some("mem"));
        assert_eq!(DbConfig::rocksdb("./data").engine().ok(), Some("rocksdb"));
    }

    #[test]
    fn shared_engines_are_rejected() {
        for endpoint in ["ws://localhost:8000", "http://db:8000", "tikv://pd:2379", "data"] {
            let err = DbConfig::endpoint(endpoint).engine().err();
            assert!(
                matches!(err, Some(DbError::UnsupportedEngine(ref e)) if e == endpoint),
                "{endpoint} should be rejected"
            );
        }
    }
}
