//! Job domain types for work dispatched to agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Agent, AgentId, JobId, Service, ServiceId};

/// The operation a job performs against its target service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Create,
    ColdUpdate,
    HotUpdate,
    Start,
    Stop,
    Delete,
}

str_enum!(JobAction, "job action", {
    Create => "create",
    ColdUpdate => "cold_update",
    HotUpdate => "hot_update",
    Start => "start",
    Stop => "stop",
    Delete => "delete",
});

/// Current state of a job in its lifecycle.
///
/// `Pending -> Processing -> Completed | Failed`, plus the recovery
/// transition `Processing -> Pending` when a claim goes stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be claimed by its agent.
    #[default]
    Pending,
    /// Claimed and being worked on.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

str_enum!(JobState, "job state", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A job is a unit of work targeting a managed service, processed by
/// exactly one agent at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub action: JobAction,
    pub state: JobState,
    /// The agent that owns this job.
    pub agent_id: AgentId,
    /// The service this job acts on.
    pub service_id: ServiceId,
    /// Higher runs first.
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when claimed, cleared again if the claim is released.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set on the transition to `Completed` or `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Owning agent, when preloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Box<Agent>>,
    /// Target service, when preloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Box<Service>>,
}

impl Job {
    /// Whether the job still waits for an agent.
    pub fn is_pending(&self) -> bool {
        self.state == JobState::Pending
    }

    /// Time spent between claim and completion, if both are known.
    pub fn run_time(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.claimed_at?)
    }
}

/// Parameters for enqueueing a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub action: JobAction,
    pub agent_id: AgentId,
    pub service_id: ServiceId,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<serde_json::Value>,
}

impl NewJob {
    /// Create a new job request with default priority.
    pub fn new(action: JobAction, agent_id: AgentId, service_id: ServiceId) -> Self {
        Self {
            action,
            agent_id,
            service_id,
            priority: 0,
            request_data: None,
        }
    }

    /// Set the priority for this job.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach request data for the agent.
    pub fn with_request_data(mut self, data: serde_json::Value) -> Self {
        self.request_data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn action_round_trips_through_str() {
        for action in JobAction::ALL {
            assert_eq!(action.as_str().parse::<JobAction>(), Ok(*action));
        }
        assert!("reboot".parse::<JobAction>().is_err());
    }

    #[test]
    fn serde_form_matches_stored_form() {
        let value = serde_json::to_value(JobAction::ColdUpdate).unwrap();
        assert_eq!(value, serde_json::json!("cold_update"));
        let value = serde_json::to_value(JobState::Processing).unwrap();
        assert_eq!(value, serde_json::json!(JobState::Processing.as_str()));
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn state_parse_is_case_insensitive() {
        assert_eq!("PENDING".parse::<JobState>(), Ok(JobState::Pending));
    }
}
