//! Message types for actor communication.

use std::future::Future;
use std::time::Duration;

use db::DbError;
use dispatch_core::{AgentId, Job, JobEvent, NewJob};
use ractor::RpcReplyPort;

/// Messages for an [`AgentWorker`](crate::AgentWorker).
#[derive(Debug)]
pub enum WorkerMessage {
    /// Look for pending work and run at most one job.
    Poll,

    /// Counters since the worker started.
    GetStats { reply: RpcReplyPort<WorkerStats> },

    /// Stop polling and shut down.
    Shutdown,
}

/// Messages for the [`Janitor`](crate::Janitor).
#[derive(Debug)]
pub enum JanitorMessage {
    /// Periodic sweep.
    Sweep,

    /// Sweep immediately and report what happened.
    SweepNow { reply: RpcReplyPort<SweepReport> },
}

/// Messages for the [`Supervisor`](crate::Supervisor).
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Start dispatching jobs for an agent.
    StartWorker {
        agent_id: AgentId,
        reply: RpcReplyPort<Result<(), String>>,
    },

    /// Stop the dispatcher of an agent.
    StopWorker {
        agent_id: AgentId,
        reply: RpcReplyPort<Result<(), String>>,
    },

    /// Agents that currently have a dispatcher.
    ListWorkers { reply: RpcReplyPort<Vec<AgentId>> },

    /// Counters of an agent's dispatcher, `None` if it has none.
    GetWorkerStats {
        agent_id: AgentId,
        reply: RpcReplyPort<Option<WorkerStats>>,
    },

    /// Enqueue a job and announce it to subscribers.
    Enqueue {
        job: NewJob,
        reply: RpcReplyPort<Result<Job, String>>,
    },

    /// Run a janitor sweep now.
    SweepNow {
        reply: RpcReplyPort<Result<SweepReport, String>>,
    },

    /// Subscribe to events.
    Subscribe {
        sender: tokio::sync::broadcast::Sender<JobEvent>,
    },

    /// Stop all workers, the janitor, and the supervisor.
    Shutdown,
}

/// Per-worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
    /// Claims lost to another dispatcher or to a state change.
    pub lost_claims: u64,
}

/// Outcome of one janitor sweep. A step that errored or timed out counts
/// zero and leaves a message in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub released: u64,
    pub purged: u64,
    pub errors: Vec<String>,
}

/// Result type for internal operations.
pub type ActorResult<T> = Result<T, ActorError>;

/// Error type for actor operations.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Timed out: {0}")]
    Timeout(&'static str),
}

/// Shortest ticker period for workers and the janitor.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);

/// Run a store operation with an upper bound on its duration. The store
/// call is dropped on timeout; each operation is a single atomic statement,
/// so nothing is left half applied.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T, DbError>>,
) -> ActorResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ActorError::from),
        Err(_) => Err(ActorError::Timeout(operation)),
    }
}
