//! Actor runtime for job dispatch.
//!
//! This crate provides the Ractor-based actors that drive the job queue:
//! a dispatcher per agent and a janitor, both owned by a supervisor.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor; owns the event channel
//! - `AgentWorker` - Polls, claims and runs jobs for one agent
//! - `Janitor` - Releases stuck claims and purges old jobs
//!
//! All coordination between dispatchers, including ones in other processes,
//! happens through the job table's conditional updates.
//!
//! # Usage
//!
//! ```ignore
//! use actors::{SupervisorArgs, SupervisorMessage, start_supervisor};
//!
//! let (supervisor, handle) = start_supervisor(SupervisorArgs::new(handlers)).await?;
//! supervisor.send_message(SupervisorMessage::StartWorker { ... })?;
//! ```

mod agent_worker;
mod handler;
mod janitor;
mod messages;
mod supervisor;

pub use agent_worker::{AgentWorker, WorkerArgs, WorkerConfig};
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry, JobOutcome};
pub use janitor::{Janitor, JanitorArgs, JanitorConfig};
pub use messages::{
    ActorError, ActorResult, JanitorMessage, SupervisorMessage, SweepReport, WorkerMessage,
    WorkerStats,
};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
