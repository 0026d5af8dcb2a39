//! Supervisor actor for the janitor and the per-agent workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::repositories::JobQueue;
use dispatch_core::{AgentId, JobEvent};
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;

use crate::agent_worker::{AgentWorker, WorkerArgs, WorkerConfig};
use crate::handler::JobHandlerRegistry;
use crate::janitor::{Janitor, JanitorArgs, JanitorConfig};
use crate::messages::{JanitorMessage, SupervisorMessage, WorkerMessage};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup arguments for the supervisor.
pub struct SupervisorArgs {
    pub handlers: JobHandlerRegistry,
    pub worker: WorkerConfig,
    /// `None` runs without a janitor, e.g. when another instance sweeps.
    pub janitor: Option<JanitorConfig>,
    /// Agents to start dispatchers for right away.
    pub agents: Vec<AgentId>,
}

impl SupervisorArgs {
    pub fn new(handlers: JobHandlerRegistry) -> Self {
        Self {
            handlers,
            worker: WorkerConfig::default(),
            janitor: Some(JanitorConfig::default()),
            agents: Vec::new(),
        }
    }

    pub fn with_worker_config(mut self, config: WorkerConfig) -> Self {
        self.worker = config;
        self
    }

    pub fn with_janitor(mut self, config: Option<JanitorConfig>) -> Self {
        self.janitor = config;
        self
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.agents.extend(agents);
        self
    }
}

/// State for the supervisor actor.
pub struct SupervisorState {
    /// Worker actors by agent.
    pub workers: HashMap<AgentId, ActorRef<WorkerMessage>>,
    pub janitor: Option<ActorRef<JanitorMessage>>,
    /// Event broadcaster.
    pub event_tx: broadcast::Sender<JobEvent>,
    handlers: Arc<JobHandlerRegistry>,
    worker_config: WorkerConfig,
    queue: JobQueue,
}

impl SupervisorState {
    fn new(handlers: JobHandlerRegistry, worker_config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            workers: HashMap::new(),
            janitor: None,
            event_tx,
            handlers: Arc::new(handlers),
            worker_config,
            queue: JobQueue::new(),
        }
    }
}

async fn spawn_worker(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState,
    agent_id: AgentId,
) -> Result<(), ActorProcessingErr> {
    if state.workers.contains_key(&agent_id) {
        return Err(ActorProcessingErr::from(format!(
            "Worker for agent {} already running",
            agent_id
        )));
    }

    let args = WorkerArgs {
        agent_id,
        config: state.worker_config.clone(),
        handlers: state.handlers.clone(),
        event_tx: Some(state.event_tx.clone()),
    };
    let (worker, _handle) = Actor::spawn_linked(
        Some(format!("worker-{}", agent_id)),
        AgentWorker,
        args,
        myself.get_cell(),
    )
    .await
    .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

    state.workers.insert(agent_id, worker);
    Ok(())
}

/// Supervisor actor that owns all runtime actors.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting dispatch supervisor");

        let mut state = SupervisorState::new(args.handlers, args.worker);

        if let Some(config) = args.janitor {
            let (janitor, _handle) = Actor::spawn_linked(
                Some("janitor".to_string()),
                Janitor,
                JanitorArgs {
                    config,
                    event_tx: Some(state.event_tx.clone()),
                },
                myself.get_cell(),
            )
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn janitor: {}", e)))?;
            state.janitor = Some(janitor);
        }

        for agent_id in args.agents {
            spawn_worker(&myself, &mut state, agent_id).await?;
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::StartWorker { agent_id, reply } => {
                let result = spawn_worker(&myself, state, agent_id)
                    .await
                    .map_err(|e| e.to_string());
                let _ = reply.send(result);
            }

            SupervisorMessage::StopWorker { agent_id, reply } => {
                if let Some(worker) = state.workers.remove(&agent_id) {
                    worker.send_message(WorkerMessage::Shutdown)?;
                    let _ = reply.send(Ok(()));
                } else {
                    let _ = reply.send(Err(format!("No worker for agent {}", agent_id)));
                }
            }

            SupervisorMessage::ListWorkers { reply } => {
                let mut agents: Vec<AgentId> = state.workers.keys().copied().collect();
                agents.sort();
                let _ = reply.send(agents);
            }

            SupervisorMessage::GetWorkerStats { agent_id, reply } => {
                let Some(worker) = state.workers.get(&agent_id).cloned() else {
                    let _ = reply.send(None);
                    return Ok(());
                };
                tokio::spawn(async move {
                    let stats = match worker
                        .call(|reply| WorkerMessage::GetStats { reply }, None)
                        .await
                    {
                        Ok(ractor::rpc::CallResult::Success(stats)) => Some(stats),
                        _ => None,
                    };
                    let _ = reply.send(stats);
                });
            }

            SupervisorMessage::Enqueue { job, reply } => match state.queue.enqueue(job).await {
                Ok(job) => {
                    let _ = state.event_tx.send(JobEvent::Enqueued {
                        job: Box::new(job.clone()),
                        timestamp: Utc::now(),
                    });
                    let _ = reply.send(Ok(job));
                }
                Err(e) => {
                    let _ = reply.send(Err(format!("Failed to enqueue job: {}", e)));
                }
            },

            SupervisorMessage::SweepNow { reply } => {
                let Some(janitor) = &state.janitor else {
                    let _ = reply.send(Err("Janitor is not running".into()));
                    return Ok(());
                };
                // Answer from a separate task so the supervisor keeps
                // serving messages while the sweep runs.
                let janitor = janitor.clone();
                tokio::spawn(async move {
                    let result = match janitor
                        .call(|reply| JanitorMessage::SweepNow { reply }, None)
                        .await
                    {
                        Ok(ractor::rpc::CallResult::Success(report)) => Ok(report),
                        Ok(_) => Err("Janitor did not answer".to_string()),
                        Err(e) => Err(format!("Failed to reach janitor: {}", e)),
                    };
                    let _ = reply.send(result);
                });
            }

            SupervisorMessage::Subscribe { sender } => {
                // Merge event streams - forward from our channel to subscriber's
                let mut rx = state.event_tx.subscribe();
                tokio::spawn(async move {
                    while let Ok(event) = rx.recv().await {
                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                });
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                // A worker finishes the job it is running before it stops.
                for (agent_id, worker) in state.workers.drain() {
                    if let Err(e) = worker.stop_and_wait(None, Some(SHUTDOWN_TIMEOUT)).await {
                        tracing::warn!("Worker for agent {} did not stop cleanly: {}", agent_id, e);
                    }
                }
                if let Some(janitor) = state.janitor.take()
                    && let Err(e) = janitor.stop_and_wait(None, Some(SHUTDOWN_TIMEOUT)).await
                {
                    tracing::warn!("Janitor did not stop cleanly: {}", e);
                }
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, reason) = match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => (cell, reason),
            SupervisionEvent::ActorFailed(cell, err) => {
                tracing::warn!(
                    "Child actor {} failed: {}",
                    cell.get_name().unwrap_or_default(),
                    err
                );
                (cell, None)
            }
            _ => return Ok(()),
        };

        let id = cell.get_id();
        state.workers.retain(|_, worker| worker.get_id() != id);
        if state.janitor.as_ref().is_some_and(|j| j.get_id() == id) {
            state.janitor = None;
        }

        if let Some(reason) = reason {
            tracing::info!(
                "Child actor {} stopped: {}",
                cell.get_name().unwrap_or_default(),
                reason
            );
        }
        Ok(())
    }
}

/// Start the supervisor.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let (actor, handle) = Actor::spawn(Some("supervisor".to_string()), Supervisor, args).await?;

    Ok((actor, handle))
}
