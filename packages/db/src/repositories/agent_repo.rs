//! Agent repository.

use std::collections::BTreeMap;

use dispatch_core::{
    Agent, AgentId, AgentState, AgentType, AgentTypeId, AuthScope, NewAgent, PageRequest,
    PageResponse, ParticipantId,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use super::agent_type_repo::AgentTypeRecord;
use crate::query::{self, Conditions, Entity, FilterField, Preload, SortField, parse_as};
use crate::records::{parse_key, timestamp};
use crate::{DbError, get_db};

/// Repository for worker agents.
pub struct AgentRepository;

#[derive(Debug, Deserialize)]
pub struct AgentRecord {
    id: Thing,
    name: String,
    provider_id: ParticipantId,
    agent_type_id: AgentTypeId,
    state: AgentState,
    created_at: Datetime,
    updated_at: Datetime,
    #[serde(default)]
    agent_type: Option<AgentTypeRecord>,
}

#[derive(Debug, Serialize)]
struct AgentContent {
    name: String,
    provider_id: ParticipantId,
    agent_type_id: AgentTypeId,
    state: AgentState,
}

impl Entity for Agent {
    const TABLE: &'static str = "agent";
    const NAME: &'static str = "Agent";
    const FILTERS: &'static [FilterField] = &[
        FilterField::contains("name", "name"),
        FilterField::exact("state", "state", parse_as::<AgentState>),
        FilterField::exact("provider_id", "provider_id", parse_as::<ParticipantId>),
        FilterField::exact("agent_type_id", "agent_type_id", parse_as::<AgentTypeId>),
    ];
    const SORTS: &'static [SortField] = &[
        SortField::new("name", "name"),
        SortField::new("state", "state"),
        SortField::new("created_at", "created_at"),
        SortField::new("updated_at", "updated_at"),
    ];
    const PRELOAD_ONE: &'static [Preload] =
        &[Preload::new("agent_type", "agent_type", "agent_type_id")];

    type Record = AgentRecord;

    fn scope(scope: &AuthScope, conditions: &mut Conditions) {
        if let Some(provider_id) = scope.provider_id {
            conditions.eq("provider_id", provider_id.to_string());
        }
        if let Some(agent_id) = scope.agent_id {
            conditions.record_is(Self::TABLE, agent_id.to_string());
        }
        // Consumers see the agents hosting their services.
        if let Some(consumer_id) = scope.consumer_id {
            let p = conditions.param(consumer_id.to_string());
            conditions.push(format!(
                "record::id(id) IN (SELECT VALUE agent_id FROM service WHERE consumer_id = {p})"
            ));
        }
    }

    fn from_record(record: AgentRecord) -> Result<Self, DbError> {
        Ok(Agent {
            id: parse_key(&record.id)?,
            name: record.name,
            provider_id: record.provider_id,
            agent_type_id: record.agent_type_id,
            state: record.state,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
            agent_type: record.agent_type.map(AgentType::from_record).transpose()?,
        })
    }
}

impl AgentRepository {
    /// Register an agent in the `New` state.
    pub async fn create(new_agent: NewAgent) -> Result<Agent, DbError> {
        let db = get_db()?;
        let id = AgentId::new();

        let record: Option<AgentRecord> = db
            .create((Agent::TABLE, id.to_string()))
            .content(AgentContent {
                name: new_agent.name,
                provider_id: new_agent.provider_id,
                agent_type_id: new_agent.agent_type_id,
                state: AgentState::New,
            })
            .await?;

        let agent = record
            .map(Agent::from_record)
            .transpose()?
            .ok_or_else(|| DbError::Query("Failed to create agent".into()))?;

        tracing::info!(agent_id = %agent.id, provider_id = %agent.provider_id, "Agent registered");
        Ok(agent)
    }

    pub async fn find_by_id(id: AgentId, scope: &AuthScope) -> Result<Agent, DbError> {
        query::find_by_id(&id.to_string(), scope).await
    }

    pub async fn list(
        request: &PageRequest,
        scope: &AuthScope,
    ) -> Result<PageResponse<Agent>, DbError> {
        query::list(request, scope).await
    }

    pub async fn count(
        filters: &BTreeMap<String, Vec<String>>,
        scope: &AuthScope,
    ) -> Result<u64, DbError> {
        query::count::<Agent>(filters, scope).await
    }
}
