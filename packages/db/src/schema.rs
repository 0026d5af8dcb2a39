//! Database schema definitions using SurrealQL.

use crate::{DbError, get_db};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Every statement is
/// idempotent, so calling it on an existing database is harmless.
pub async fn init_schema() -> Result<(), DbError> {
    let db = get_db()?;

    tracing::info!("Initializing database schema...");

    for (table, schema) in [
        ("participant", PARTICIPANT_SCHEMA),
        ("agent_type", AGENT_TYPE_SCHEMA),
        ("agent", AGENT_SCHEMA),
        ("service", SERVICE_SCHEMA),
        ("job", JOB_SCHEMA),
    ] {
        db.query(schema).await?.check()?;
        tracing::debug!("Schema applied for table {}", table);
    }

    tracing::info!("Database schema initialized");

    Ok(())
}

const PARTICIPANT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS participant SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS name ON participant TYPE string;
DEFINE FIELD IF NOT EXISTS state ON participant TYPE string DEFAULT "enabled";
DEFINE FIELD IF NOT EXISTS created_at ON participant TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON participant TYPE datetime DEFAULT time::now();

DEFINE INDEX IF NOT EXISTS participant_name ON participant FIELDS name;
"#;

const AGENT_TYPE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS agent_type SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS name ON agent_type TYPE string;
DEFINE FIELD IF NOT EXISTS created_at ON agent_type TYPE datetime DEFAULT time::now();

DEFINE INDEX IF NOT EXISTS agent_type_name ON agent_type FIELDS name UNIQUE;
"#;

const AGENT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS agent SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS name ON agent TYPE string;
DEFINE FIELD IF NOT EXISTS provider_id ON agent TYPE string;
DEFINE FIELD IF NOT EXISTS agent_type_id ON agent TYPE string;
DEFINE FIELD IF NOT EXISTS state ON agent TYPE string DEFAULT "new";
DEFINE FIELD IF NOT EXISTS created_at ON agent TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON agent TYPE datetime DEFAULT time::now();

DEFINE INDEX IF NOT EXISTS agent_provider ON agent FIELDS provider_id;
"#;

const SERVICE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS service SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS name ON service TYPE string;
DEFINE FIELD IF NOT EXISTS agent_id ON service TYPE string;
DEFINE FIELD IF NOT EXISTS provider_id ON service TYPE string;
DEFINE FIELD IF NOT EXISTS consumer_id ON service TYPE string;
DEFINE FIELD IF NOT EXISTS external_id ON service TYPE option<string>;
DEFINE FIELD IF NOT EXISTS current_state ON service TYPE string DEFAULT "creating";
DEFINE FIELD IF NOT EXISTS created_at ON service TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON service TYPE datetime DEFAULT time::now();

DEFINE INDEX IF NOT EXISTS service_agent ON service FIELDS agent_id;
DEFINE INDEX IF NOT EXISTS service_consumer ON service FIELDS consumer_id;
"#;

/// Job table schema. The field names are the stable on-disk contract.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS action ON job TYPE string;
DEFINE FIELD IF NOT EXISTS state ON job TYPE string DEFAULT "pending";
DEFINE FIELD IF NOT EXISTS agent_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS service_id ON job TYPE string;
DEFINE FIELD IF NOT EXISTS priority ON job TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS request_data ON job FLEXIBLE TYPE option<object>;
DEFINE FIELD IF NOT EXISTS result_data ON job FLEXIBLE TYPE option<object>;
DEFINE FIELD IF NOT EXISTS error_message ON job TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS claimed_at ON job TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS completed_at ON job TYPE option<datetime>;

DEFINE INDEX IF NOT EXISTS job_state ON job FIELDS state;
DEFINE INDEX IF NOT EXISTS job_service ON job FIELDS service_id;
DEFINE INDEX IF NOT EXISTS job_claimed ON job FIELDS claimed_at;
DEFINE INDEX IF NOT EXISTS job_completed ON job FIELDS completed_at;

-- Compound index for agent polling (pending jobs by priority)
DEFINE INDEX IF NOT EXISTS job_agent_pending ON job FIELDS agent_id, state, priority;
"#;
