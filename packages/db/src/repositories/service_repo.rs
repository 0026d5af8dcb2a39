//! Managed service repository.

use std::collections::BTreeMap;

use dispatch_core::{
    Agent, AgentId, AuthScope, NewService, PageRequest, PageResponse, ParticipantId, Service,
    ServiceId, ServiceState,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use super::agent_repo::AgentRecord;
use super::job_queue::ServiceUpdater;
use crate::query::{self, Conditions, Entity, FilterField, Preload, SortField, parse_as, parse_text};
use crate::records::{parse_key, timestamp};
use crate::{DbError, get_db};

/// Repository for services managed by agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceRepository;

#[derive(Debug, Deserialize)]
pub struct ServiceRecord {
    id: Thing,
    name: String,
    agent_id: AgentId,
    provider_id: ParticipantId,
    consumer_id: ParticipantId,
    #[serde(default)]
    external_id: Option<String>,
    current_state: ServiceState,
    created_at: Datetime,
    updated_at: Datetime,
    #[serde(default)]
    agent: Option<AgentRecord>,
}

#[derive(Debug, Serialize)]
struct ServiceContent {
    name: String,
    agent_id: AgentId,
    provider_id: ParticipantId,
    consumer_id: ParticipantId,
    current_state: ServiceState,
}

impl Entity for Service {
    const TABLE: &'static str = "service";
    const NAME: &'static str = "Service";
    const FILTERS: &'static [FilterField] = &[
        FilterField::contains("name", "name"),
        FilterField::exact("current_state", "current_state", parse_as::<ServiceState>),
        FilterField::exact("agent_id", "agent_id", parse_as::<AgentId>),
        FilterField::exact("provider_id", "provider_id", parse_as::<ParticipantId>),
        FilterField::exact("consumer_id", "consumer_id", parse_as::<ParticipantId>),
        FilterField::exact("external_id", "external_id", parse_text),
    ];
    const SORTS: &'static [SortField] = &[
        SortField::new("name", "name"),
        SortField::new("current_state", "current_state"),
        SortField::new("created_at", "created_at"),
        SortField::new("updated_at", "updated_at"),
    ];
    const PRELOAD_ONE: &'static [Preload] = &[Preload::new("agent", "agent", "agent_id")];

    type Record = ServiceRecord;

    fn scope(scope: &AuthScope, conditions: &mut Conditions) {
        if let Some(provider_id) = scope.provider_id {
            conditions.eq("provider_id", provider_id.to_string());
        }
        if let Some(consumer_id) = scope.consumer_id {
            conditions.eq("consumer_id", consumer_id.to_string());
        }
        if let Some(agent_id) = scope.agent_id {
            conditions.eq("agent_id", agent_id.to_string());
        }
    }

    fn from_record(record: ServiceRecord) -> Result<Self, DbError> {
        Ok(Service {
            id: parse_key(&record.id)?,
            name: record.name,
            agent_id: record.agent_id,
            provider_id: record.provider_id,
            consumer_id: record.consumer_id,
            external_id: record.external_id,
            current_state: record.current_state,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
            agent: record.agent.map(Agent::from_record).transpose()?,
        })
    }
}

impl ServiceRepository {
    /// Register a service in the `Creating` state.
    pub async fn create(new_service: NewService) -> Result<Service, DbError> {
        let db = get_db()?;
        let id = ServiceId::new();

        let record: Option<ServiceRecord> = db
            .create((Service::TABLE, id.to_string()))
            .content(ServiceContent {
                name: new_service.name,
                agent_id: new_service.agent_id,
                provider_id: new_service.provider_id,
                consumer_id: new_service.consumer_id,
                current_state: ServiceState::Creating,
            })
            .await?;

        record
            .map(Service::from_record)
            .transpose()?
            .ok_or_else(|| DbError::Query("Failed to create service".into()))
    }

    pub async fn find_by_id(id: ServiceId, scope: &AuthScope) -> Result<Service, DbError> {
        query::find_by_id(&id.to_string(), scope).await
    }

    pub async fn list(
        request: &PageRequest,
        scope: &AuthScope,
    ) -> Result<PageResponse<Service>, DbError> {
        query::list(request, scope).await
    }

    pub async fn count(
        filters: &BTreeMap<String, Vec<String>>,
        scope: &AuthScope,
    ) -> Result<u64, DbError> {
        query::count::<Service>(filters, scope).await
    }

    /// Record the identifier the agent's backend assigned to a service and
    /// move it to `state`. A `None` external id leaves the stored one as is.
    pub async fn set_external_id(
        id: ServiceId,
        external_id: Option<String>,
        state: ServiceState,
    ) -> Result<Service, DbError> {
        let db = get_db()?;

        let sql = if external_id.is_some() {
            "UPDATE type::thing('service', $id) SET external_id = $external_id, \
             current_state = $state, updated_at = time::now() RETURN AFTER"
        } else {
            "UPDATE type::thing('service', $id) SET current_state = $state, \
             updated_at = time::now() RETURN AFTER"
        };

        let mut response = db
            .query(sql)
            .bind(("id", id.to_string()))
            .bind(("external_id", external_id))
            .bind(("state", state.as_str()))
            .await?
            .check()?;
        let records: Vec<ServiceRecord> = response.take(0)?;

        let service = records
            .into_iter()
            .next()
            .map(Service::from_record)
            .transpose()?
            .ok_or_else(|| DbError::NotFound(format!("Service not found: {}", id)))?;

        tracing::info!(service_id = %id, state = %state, "Service state updated");
        Ok(service)
    }
}

impl ServiceUpdater for ServiceRepository {
    async fn update_external_id(
        &self,
        service_id: ServiceId,
        external_id: Option<String>,
        state: ServiceState,
    ) -> Result<(), DbError> {
        Self::set_external_id(service_id, external_id, state).await?;
        Ok(())
    }
}
