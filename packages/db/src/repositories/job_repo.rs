//! Job repository for record storage and lookups.
//!
//! State transitions do not live here; they go through
//! [`JobQueue`](super::JobQueue).

use std::collections::BTreeMap;

use dispatch_core::{
    Agent, AgentId, AuthScope, Job, JobAction, JobId, JobState, NewJob, PageRequest,
    PageResponse, Service, ServiceId,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use super::agent_repo::AgentRecord;
use super::service_repo::ServiceRecord;
use crate::query::{self, Conditions, Entity, FilterField, Preload, SortField, parse_as, parse_int};
use crate::records::{opt_timestamp, parse_key, timestamp};
use crate::{DbError, get_db};

/// Repository for job persistence operations.
pub struct JobRepository;

/// Stored job row, with optional preloaded relations.
#[derive(Debug, Deserialize)]
pub struct JobRecord {
    id: Thing,
    action: JobAction,
    state: JobState,
    agent_id: AgentId,
    service_id: ServiceId,
    priority: i32,
    #[serde(default)]
    request_data: Option<serde_json::Value>,
    #[serde(default)]
    result_data: Option<serde_json::Value>,
    #[serde(default)]
    error_message: Option<String>,
    created_at: Datetime,
    updated_at: Datetime,
    #[serde(default)]
    claimed_at: Option<Datetime>,
    #[serde(default)]
    completed_at: Option<Datetime>,
    #[serde(default)]
    agent: Option<AgentRecord>,
    #[serde(default)]
    service: Option<ServiceRecord>,
}

/// Fields written on insert; timestamps come from the schema defaults.
#[derive(Debug, Serialize)]
struct JobContent {
    action: JobAction,
    state: JobState,
    agent_id: AgentId,
    service_id: ServiceId,
    priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_data: Option<serde_json::Value>,
}

impl Entity for Job {
    const TABLE: &'static str = "job";
    const NAME: &'static str = "Job";
    const FILTERS: &'static [FilterField] = &[
        FilterField::exact("state", "state", parse_as::<JobState>),
        FilterField::exact("action", "action", parse_as::<JobAction>),
        FilterField::exact("agent_id", "agent_id", parse_as::<AgentId>),
        FilterField::exact("service_id", "service_id", parse_as::<ServiceId>),
        FilterField::exact("priority", "priority", parse_int),
    ];
    const SORTS: &'static [SortField] = &[
        SortField::new("priority", "priority"),
        SortField::new("created_at", "created_at"),
        SortField::new("updated_at", "updated_at"),
        SortField::new("claimed_at", "claimed_at"),
        SortField::new("completed_at", "completed_at"),
        SortField::new("state", "state"),
        SortField::new("action", "action"),
    ];
    const PRELOAD_ONE: &'static [Preload] = &[
        Preload::new("agent", "agent", "agent_id"),
        Preload::new("service", "service", "service_id"),
    ];
    const PRELOAD_MANY: &'static [Preload] = &[Preload::new("service", "service", "service_id")];

    type Record = JobRecord;

    fn scope(scope: &AuthScope, conditions: &mut Conditions) {
        if let Some(agent_id) = scope.agent_id {
            conditions.eq("agent_id", agent_id.to_string());
        }
        // Providers reach jobs through the agents they operate.
        if let Some(provider_id) = scope.provider_id {
            let p = conditions.param(provider_id.to_string());
            conditions.push(format!(
                "agent_id IN (SELECT VALUE record::id(id) FROM agent WHERE provider_id = {p})"
            ));
        }
        // Consumers reach jobs through the services they own.
        if let Some(consumer_id) = scope.consumer_id {
            let p = conditions.param(consumer_id.to_string());
            conditions.push(format!(
                "service_id IN (SELECT VALUE record::id(id) FROM service WHERE consumer_id = {p})"
            ));
        }
    }

    fn from_record(record: JobRecord) -> Result<Self, DbError> {
        Ok(Job {
            id: parse_key(&record.id)?,
            action: record.action,
            state: record.state,
            agent_id: record.agent_id,
            service_id: record.service_id,
            priority: record.priority,
            request_data: record.request_data,
            result_data: record.result_data,
            error_message: record.error_message,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
            claimed_at: opt_timestamp(record.claimed_at),
            completed_at: opt_timestamp(record.completed_at),
            agent: record
                .agent
                .map(Agent::from_record)
                .transpose()?
                .map(Box::new),
            service: record
                .service
                .map(Service::from_record)
                .transpose()?
                .map(Box::new),
        })
    }
}

impl JobRepository {
    /// Insert a new pending job.
    pub async fn create(new_job: NewJob) -> Result<Job, DbError> {
        let db = get_db()?;
        let id = JobId::new();

        let record: Option<JobRecord> = db
            .create((Job::TABLE, id.to_string()))
            .content(JobContent {
                action: new_job.action,
                state: JobState::Pending,
                agent_id: new_job.agent_id,
                service_id: new_job.service_id,
                priority: new_job.priority,
                request_data: new_job.request_data,
            })
            .await?;

        record
            .map(Job::from_record)
            .transpose()?
            .ok_or_else(|| DbError::Query("Failed to create job".into()))
    }

    /// Get a job by ID, with its agent and service preloaded.
    pub async fn find_by_id(id: JobId, scope: &AuthScope) -> Result<Job, DbError> {
        query::find_by_id(&id.to_string(), scope).await
    }

    /// List jobs with whitelisted filters and sorting. Each job carries its
    /// service.
    pub async fn list(request: &PageRequest, scope: &AuthScope) -> Result<PageResponse<Job>, DbError> {
        query::list(request, scope).await
    }

    pub async fn count(
        filters: &BTreeMap<String, Vec<String>>,
        scope: &AuthScope,
    ) -> Result<u64, DbError> {
        query::count::<Job>(filters, scope).await
    }
}
