//! Caller identities and the row-visibility scope derived from them.

use serde::{Deserialize, Serialize};

use crate::{AgentId, ParticipantId};

/// The rows a caller may see or act on.
///
/// Each set field narrows visibility; the constraints are combined with AND.
/// A scope with no fields set is unrestricted (administrative access).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
}

impl AuthScope {
    /// Unrestricted scope.
    pub fn admin() -> Self {
        Self::default()
    }

    pub fn provider(id: ParticipantId) -> Self {
        Self {
            provider_id: Some(id),
            ..Default::default()
        }
    }

    pub fn consumer(id: ParticipantId) -> Self {
        Self {
            consumer_id: Some(id),
            ..Default::default()
        }
    }

    pub fn agent(id: AgentId) -> Self {
        Self {
            agent_id: Some(id),
            ..Default::default()
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.provider_id.is_none() && self.consumer_id.is_none() && self.agent_id.is_none()
    }
}

/// An authenticated caller, as handed over by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Identity {
    Admin,
    /// A participant acting as the operator of agents.
    Provider { participant_id: ParticipantId },
    /// A participant acting as the owner of services.
    Consumer { participant_id: ParticipantId },
    /// An agent token; agents belong to exactly one provider.
    Agent {
        agent_id: AgentId,
        provider_id: ParticipantId,
    },
}

/// Derives the [`AuthScope`] for a caller.
pub trait ScopeResolver: Send + Sync {
    fn resolve(&self, identity: &Identity) -> AuthScope;
}

/// Maps each identity role onto the scope column it owns.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScopeResolver;

impl ScopeResolver for DefaultScopeResolver {
    fn resolve(&self, identity: &Identity) -> AuthScope {
        match *identity {
            Identity::Admin => AuthScope::admin(),
            Identity::Provider { participant_id } => AuthScope::provider(participant_id),
            Identity::Consumer { participant_id } => AuthScope::consumer(participant_id),
            Identity::Agent {
                agent_id,
                provider_id,
            } => AuthScope {
                provider_id: Some(provider_id),
                agent_id: Some(agent_id),
                ..Default::default()
            },
        }
    }
}
