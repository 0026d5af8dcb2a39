//! Per-agent dispatcher actor.
//!
//! On every poll the worker reads the agent's pending jobs, claims the first
//! one it can win, runs the matching handler and reports the outcome. A lost
//! claim is not retried; the worker simply tries the next candidate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::DbError;
use db::repositories::JobQueue;
use dispatch_core::{AgentId, Job, JobEvent};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::handler::{JobHandlerRegistry, JobOutcome};
use crate::messages::{ActorError, ActorResult, MIN_TICK, WorkerMessage, WorkerStats, bounded};

/// Polling and timeout settings for agent workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    /// Pending jobs fetched per poll as claim candidates.
    pub batch_size: usize,
    /// Upper bound for one handler run. A job that exceeds it fails.
    pub job_timeout: Duration,
    /// Upper bound for each store call.
    pub db_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 10,
            job_timeout: Duration::from_secs(300),
            db_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Intervals below one millisecond are raised to it.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_TICK);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_db_timeout(mut self, timeout: Duration) -> Self {
        self.db_timeout = timeout;
        self
    }
}

/// State for the worker actor.
pub struct WorkerState {
    pub agent_id: AgentId,
    config: WorkerConfig,
    queue: JobQueue,
    handlers: Arc<JobHandlerRegistry>,
    event_tx: Option<broadcast::Sender<JobEvent>>,
    stats: WorkerStats,
}

impl WorkerState {
    fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Claim the first candidate nobody else has taken yet.
    async fn claim_next(&mut self) -> ActorResult<Option<Job>> {
        let limit = self.config.db_timeout;
        let candidates = bounded(
            limit,
            "fetch pending jobs",
            self.queue
                .get_pending_for_agent(self.agent_id, self.config.batch_size),
        )
        .await?;

        for candidate in candidates {
            match bounded(limit, "claim job", self.queue.claim(candidate.id, self.agent_id)).await
            {
                Ok(job) => return Ok(Some(job)),
                Err(ActorError::Database(DbError::NotFoundOrInvalidState(_))) => {
                    self.stats.lost_claims += 1;
                    tracing::debug!(job_id = %candidate.id, "Claim lost, trying next job");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    async fn run(&mut self, job: Job) -> ActorResult<()> {
        self.emit(JobEvent::Claimed {
            job_id: job.id,
            agent_id: self.agent_id,
            action: job.action,
            timestamp: Utc::now(),
        });

        let outcome = match self.handlers.get(job.action) {
            Some(handler) => {
                match tokio::time::timeout(self.config.job_timeout, handler.handle(&job)).await {
                    Ok(result) => result,
                    Err(_) => Err("Job timed out".to_string()),
                }
            }
            None => Err(format!("No handler for job action: {}", job.action)),
        };

        let limit = self.config.db_timeout;
        match outcome {
            Ok(JobOutcome {
                result_data,
                external_id,
            }) => {
                let done = bounded(
                    limit,
                    "complete job",
                    self.queue.complete(job.id, result_data, external_id),
                )
                .await?;
                self.stats.completed += 1;
                self.emit(JobEvent::Completed {
                    job_id: job.id,
                    agent_id: self.agent_id,
                    duration_ms: done.run_time().map(|d| d.num_milliseconds().max(0) as u64),
                    timestamp: Utc::now(),
                });
            }
            Err(error) => {
                bounded(limit, "fail job", self.queue.fail(job.id, error.clone())).await?;
                self.stats.failed += 1;
                self.emit(JobEvent::Failed {
                    job_id: job.id,
                    agent_id: self.agent_id,
                    error,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(())
    }

    async fn poll(&mut self) -> ActorResult<()> {
        if let Some(job) = self.claim_next().await? {
            let job_id = job.id;
            tracing::info!(job_id = %job_id, action = %job.action, "Processing job");
            if let Err(e) = self.run(job).await {
                // Unless the transition went through, the job stays
                // processing until the janitor releases it.
                tracing::warn!(job_id = %job_id, "Failed to report job outcome: {}", e);
            }
        }
        Ok(())
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub agent_id: AgentId,
    pub config: WorkerConfig,
    pub handlers: Arc<JobHandlerRegistry>,
    pub event_tx: Option<broadcast::Sender<JobEvent>>,
}

/// Dispatcher actor for one agent.
pub struct AgentWorker;

impl Actor for AgentWorker {
    type Msg = WorkerMessage;
    type State = WorkerState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker for agent {}", args.agent_id);

        let interval = args.config.poll_interval.max(MIN_TICK);
        let myself_clone = myself.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if myself_clone.send_message(WorkerMessage::Poll).is_err() {
                    break;
                }
            }
        });

        let state = WorkerState {
            agent_id: args.agent_id,
            config: args.config,
            queue: JobQueue::new(),
            handlers: args.handlers,
            event_tx: args.event_tx,
            stats: WorkerStats::default(),
        };
        state.emit(JobEvent::WorkerStarted {
            agent_id: state.agent_id,
            timestamp: Utc::now(),
        });

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if let Err(e) = state.poll().await {
                    tracing::warn!(agent_id = %state.agent_id, "Poll failed: {}", e);
                }
            }

            WorkerMessage::GetStats { reply } => {
                let _ = reply.send(state.stats);
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker for agent {}", state.agent_id);
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.emit(JobEvent::WorkerStopped {
            agent_id: state.agent_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
