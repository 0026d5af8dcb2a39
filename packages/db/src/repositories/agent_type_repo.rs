//! Agent type catalog.

use std::collections::BTreeMap;

use dispatch_core::{AgentType, AgentTypeId, AuthScope, PageRequest, PageResponse};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use crate::query::{self, Conditions, Entity, FilterField, SortField};
use crate::records::{parse_key, timestamp};
use crate::{DbError, get_db};

pub struct AgentTypeRepository;

#[derive(Debug, Deserialize)]
pub struct AgentTypeRecord {
    id: Thing,
    name: String,
    created_at: Datetime,
}

#[derive(Debug, Serialize)]
struct AgentTypeContent {
    name: String,
}

impl Entity for AgentType {
    const TABLE: &'static str = "agent_type";
    const NAME: &'static str = "Agent type";
    const FILTERS: &'static [FilterField] = &[FilterField::contains("name", "name")];
    const SORTS: &'static [SortField] = &[
        SortField::new("name", "name"),
        SortField::new("created_at", "created_at"),
    ];

    type Record = AgentTypeRecord;

    // The catalog is visible to every caller.
    fn scope(_scope: &AuthScope, _conditions: &mut Conditions) {}

    fn from_record(record: AgentTypeRecord) -> Result<Self, DbError> {
        Ok(AgentType {
            id: parse_key(&record.id)?,
            name: record.name,
            created_at: timestamp(record.created_at),
        })
    }
}

impl AgentTypeRepository {
    pub async fn create(name: impl Into<String>) -> Result<AgentType, DbError> {
        let db = get_db()?;
        let id = AgentTypeId::new();

        let record: Option<AgentTypeRecord> = db
            .create((AgentType::TABLE, id.to_string()))
            .content(AgentTypeContent { name: name.into() })
            .await?;

        record
            .map(AgentType::from_record)
            .transpose()?
            .ok_or_else(|| DbError::Query("Failed to create agent type".into()))
    }

    pub async fn find_by_id(id: AgentTypeId, scope: &AuthScope) -> Result<AgentType, DbError> {
        query::find_by_id(&id.to_string(), scope).await
    }

    pub async fn list(
        request: &PageRequest,
        scope: &AuthScope,
    ) -> Result<PageResponse<AgentType>, DbError> {
        query::list(request, scope).await
    }

    pub async fn count(
        filters: &BTreeMap<String, Vec<String>>,
        scope: &AuthScope,
    ) -> Result<u64, DbError> {
        query::count::<AgentType>(filters, scope).await
    }
}
