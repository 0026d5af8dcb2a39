//! Managed services, the targets of dispatched jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Agent, AgentId, ParticipantId, ServiceId};

/// Lifecycle state of a managed service as last reported by its agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Creating,
    Created,
    Starting,
    Started,
    Stopping,
    Stopped,
    HotUpdating,
    ColdUpdating,
    Deleting,
    Deleted,
}

str_enum!(ServiceState, "service state", {
    Creating => "creating",
    Created => "created",
    Starting => "starting",
    Started => "started",
    Stopping => "stopping",
    Stopped => "stopped",
    HotUpdating => "hot_updating",
    ColdUpdating => "cold_updating",
    Deleting => "deleting",
    Deleted => "deleted",
});

/// A service hosted by an agent on behalf of a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub agent_id: AgentId,
    /// Provider operating the hosting agent.
    pub provider_id: ParticipantId,
    /// Participant that owns the service.
    pub consumer_id: ParticipantId,
    /// Identifier assigned by the agent's backend once the service exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub current_state: ServiceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hosting agent, when preloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
}

/// Parameters for registering a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub agent_id: AgentId,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
}

impl NewService {
    pub fn new(
        name: impl Into<String>,
        agent_id: AgentId,
        provider_id: ParticipantId,
        consumer_id: ParticipantId,
    ) -> Self {
        Self {
            name: name.into(),
            agent_id,
            provider_id,
            consumer_id,
        }
    }
}
