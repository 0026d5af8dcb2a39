//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, Job, JobAction, JobId};

/// Events emitted by the dispatch runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job was enqueued.
    Enqueued { job: Box<Job>, timestamp: DateTime<Utc> },
    /// An agent won the claim on a job.
    Claimed {
        job_id: JobId,
        agent_id: AgentId,
        action: JobAction,
        timestamp: DateTime<Utc>,
    },
    /// A job completed successfully.
    Completed {
        job_id: JobId,
        agent_id: AgentId,
        duration_ms: Option<u64>,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    Failed {
        job_id: JobId,
        agent_id: AgentId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Stale claims were returned to the pending pool.
    StuckReleased { count: u64, timestamp: DateTime<Utc> },
    /// Old terminal jobs were deleted.
    Purged { count: u64, timestamp: DateTime<Utc> },
    /// A dispatcher started polling for an agent.
    WorkerStarted {
        agent_id: AgentId,
        timestamp: DateTime<Utc>,
    },
    /// A dispatcher stopped.
    WorkerStopped {
        agent_id: AgentId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Enqueued { timestamp, .. }
            | JobEvent::Claimed { timestamp, .. }
            | JobEvent::Completed { timestamp, .. }
            | JobEvent::Failed { timestamp, .. }
            | JobEvent::StuckReleased { timestamp, .. }
            | JobEvent::Purged { timestamp, .. }
            | JobEvent::WorkerStarted { timestamp, .. }
            | JobEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::Enqueued { job, .. } => Some(job.id),
            JobEvent::Claimed { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get the agent ID associated with this event, if any.
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            JobEvent::Enqueued { job, .. } => Some(job.agent_id),
            JobEvent::Claimed { agent_id, .. }
            | JobEvent::Completed { agent_id, .. }
            | JobEvent::Failed { agent_id, .. }
            | JobEvent::WorkerStarted { agent_id, .. }
            | JobEvent::WorkerStopped { agent_id, .. } => Some(*agent_id),
            JobEvent::StuckReleased { .. } | JobEvent::Purged { .. } => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::Enqueued { job, .. } => {
                format!("Job {} ({}) enqueued for agent {}", job.id, job.action, job.agent_id)
            }
            JobEvent::Claimed {
                job_id, agent_id, ..
            } => format!("Job {} claimed by {}", job_id, agent_id),
            JobEvent::Completed {
                job_id,
                duration_ms,
                ..
            } => match duration_ms {
                Some(ms) => format!("Job {} completed in {}ms", job_id, ms),
                None => format!("Job {} completed", job_id),
            },
            JobEvent::Failed { job_id, error, .. } => format!("Job {} failed: {}", job_id, error),
            JobEvent::StuckReleased { count, .. } => format!("Released {} stuck jobs", count),
            JobEvent::Purged { count, .. } => format!("Purged {} old jobs", count),
            JobEvent::WorkerStarted { agent_id, .. } => {
                format!("Dispatcher for agent {} started", agent_id)
            }
            JobEvent::WorkerStopped { agent_id, .. } => {
                format!("Dispatcher for agent {} stopped", agent_id)
            }
        }
    }
}
