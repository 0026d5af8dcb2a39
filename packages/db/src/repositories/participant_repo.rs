//! Participant repository.

use std::collections::BTreeMap;

use dispatch_core::{
    AuthScope, PageRequest, PageResponse, Participant, ParticipantId, ParticipantState,
};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use crate::query::{self, Conditions, Entity, FilterField, SortField, parse_as};
use crate::records::{parse_key, timestamp};
use crate::{DbError, get_db};

/// Repository for participants (providers and consumers).
pub struct ParticipantRepository;

#[derive(Debug, Deserialize)]
pub struct ParticipantRecord {
    id: Thing,
    name: String,
    state: ParticipantState,
    created_at: Datetime,
    updated_at: Datetime,
}

#[derive(Debug, Serialize)]
struct ParticipantContent {
    name: String,
    state: ParticipantState,
}

impl Entity for Participant {
    const TABLE: &'static str = "participant";
    const NAME: &'static str = "Participant";
    const FILTERS: &'static [FilterField] = &[
        FilterField::contains("name", "name"),
        FilterField::exact("state", "state", parse_as::<ParticipantState>),
    ];
    const SORTS: &'static [SortField] = &[
        SortField::new("name", "name"),
        SortField::new("state", "state"),
        SortField::new("created_at", "created_at"),
        SortField::new("updated_at", "updated_at"),
    ];

    type Record = ParticipantRecord;

    fn scope(scope: &AuthScope, conditions: &mut Conditions) {
        if let Some(provider_id) = scope.provider_id {
            conditions.record_is(Self::TABLE, provider_id.to_string());
        }
        if let Some(consumer_id) = scope.consumer_id {
            conditions.record_is(Self::TABLE, consumer_id.to_string());
        }
        if let Some(agent_id) = scope.agent_id {
            let p = conditions.param(agent_id.to_string());
            conditions.push(format!(
                "record::id(id) IN (SELECT VALUE provider_id FROM agent WHERE id = type::thing('agent', {p}))"
            ));
        }
    }

    fn from_record(record: ParticipantRecord) -> Result<Self, DbError> {
        Ok(Participant {
            id: parse_key(&record.id)?,
            name: record.name,
            state: record.state,
            created_at: timestamp(record.created_at),
            updated_at: timestamp(record.updated_at),
        })
    }
}

impl ParticipantRepository {
    /// Register a new, enabled participant.
    pub async fn create(name: impl Into<String>) -> Result<Participant, DbError> {
        let db = get_db()?;
        let id = ParticipantId::new();

        let record: Option<ParticipantRecord> = db
            .create((Participant::TABLE, id.to_string()))
            .content(ParticipantContent {
                name: name.into(),
                state: ParticipantState::Enabled,
            })
            .await?;

        record
            .map(Participant::from_record)
            .transpose()?
            .ok_or_else(|| DbError::Query("Failed to create participant".into()))
    }

    pub async fn find_by_id(id: ParticipantId, scope: &AuthScope) -> Result<Participant, DbError> {
        query::find_by_id(&id.to_string(), scope).await
    }

    pub async fn list(
        request: &PageRequest,
        scope: &AuthScope,
    ) -> Result<PageResponse<Participant>, DbError> {
        query::list(request, scope).await
    }

    pub async fn count(
        filters: &BTreeMap<String, Vec<String>>,
        scope: &AuthScope,
    ) -> Result<u64, DbError> {
        query::count::<Participant>(filters, scope).await
    }
}
