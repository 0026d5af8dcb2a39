//! Worker agents and the agent-type catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, AgentTypeId, ParticipantId};

/// Connection state reported for an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    New,
    Connected,
    Disconnected,
    Error,
    Disabled,
}

str_enum!(AgentState, "agent state", {
    New => "new",
    Connected => "connected",
    Disconnected => "disconnected",
    Error => "error",
    Disabled => "disabled",
});

/// A kind of agent, e.g. a particular cloud or hypervisor integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentType {
    pub id: AgentTypeId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A remote worker that polls for jobs on behalf of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// Participant operating this agent.
    pub provider_id: ParticipantId,
    pub agent_type_id: AgentTypeId,
    pub state: AgentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Agent type, when preloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
}

/// Parameters for registering an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub provider_id: ParticipantId,
    pub agent_type_id: AgentTypeId,
}

impl NewAgent {
    pub fn new(
        name: impl Into<String>,
        provider_id: ParticipantId,
        agent_type_id: AgentTypeId,
    ) -> Self {
        Self {
            name: name.into(),
            provider_id,
            agent_type_id,
        }
    }
}
