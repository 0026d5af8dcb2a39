#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use actors::{
    ActorRef, JanitorConfig, JobHandlerRegistry, JobOutcome, SupervisorArgs, SupervisorMessage,
    WorkerConfig, WorkerStats, concurrency, job_handler, start_supervisor,
};
use common::{age_job, agent_with_service};
use db::repositories::{JobQueue, JobRepository, ServiceRepository};
use dispatch_core::{AuthScope, JobAction, JobEvent, JobState, NewJob, ServiceState};

const EVENT_WAIT: Duration = Duration::from_secs(10);

fn fast_workers() -> WorkerConfig {
    WorkerConfig::default().with_poll_interval(Duration::from_millis(20))
}

async fn subscribe(
    supervisor: &ActorRef<SupervisorMessage>,
) -> Result<broadcast::Receiver<JobEvent>, Box<dyn Error>> {
    let (sender, receiver) = broadcast::channel(256);
    supervisor.send_message(SupervisorMessage::Subscribe { sender })?;
    Ok(receiver)
}

/// Wait for the first event accepted by `pred`, skipping everything else.
async fn wait_for(
    events: &mut broadcast::Receiver<JobEvent>,
    pred: impl Fn(&JobEvent) -> bool,
) -> Result<JobEvent, Box<dyn Error>> {
    let event = tokio::time::timeout(EVENT_WAIT, async {
        loop {
            let event = events.recv().await?;
            if pred(&event) {
                return Ok::<_, broadcast::error::RecvError>(event);
            }
        }
    })
    .await??;
    Ok(event)
}

async fn shutdown(
    supervisor: ActorRef<SupervisorMessage>,
    handle: JoinHandle<()>,
) -> Result<(), Box<dyn Error>> {
    supervisor.send_message(SupervisorMessage::Shutdown)?;
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn worker_completes_create_job_and_records_external_id() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (agent, service) = agent_with_service("kvm-01").await?;

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!(JobAction::Create, |job| {
        Ok(JobOutcome::empty()
            .with_result(json!({ "service": job.service_id.to_string() }))
            .with_external_id("vm-42"))
    }));

    let (supervisor, handle) = start_supervisor(
        SupervisorArgs::new(handlers)
            .with_janitor(None)
            .with_worker_config(fast_workers())
            .with_agents([agent.id]),
    )
    .await?;
    let mut events = subscribe(&supervisor).await?;

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::Enqueue {
        job: NewJob::new(JobAction::Create, agent.id, service.id),
        reply: tx.into(),
    })?;
    let job = rx.await??;
    assert_eq!(job.state, JobState::Pending);

    let event = wait_for(&mut events, |e| {
        matches!(e, JobEvent::Completed { job_id, .. } if *job_id == job.id)
    })
    .await?;
    assert_eq!(event.agent_id(), Some(agent.id));

    let stored = JobRepository::find_by_id(job.id, &AuthScope::admin()).await?;
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(
        stored.result_data,
        Some(json!({ "service": service.id.to_string() }))
    );
    assert!(stored.completed_at.is_some());

    let service = ServiceRepository::find_by_id(service.id, &AuthScope::admin()).await?;
    assert_eq!(service.current_state, ServiceState::Created);
    assert_eq!(service.external_id.as_deref(), Some("vm-42"));

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::GetWorkerStats {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    let stats = rx.await?.ok_or("worker stats missing")?;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);

    shutdown(supervisor, handle).await
}

#[tokio::test]
async fn handler_errors_and_missing_handlers_fail_jobs() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (agent, service) = agent_with_service("kvm-02").await?;

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!(JobAction::Start, |_job| {
        Err("hypervisor unreachable".to_string())
    }));

    let (supervisor, handle) = start_supervisor(
        SupervisorArgs::new(handlers)
            .with_janitor(None)
            .with_worker_config(fast_workers())
            .with_agents([agent.id]),
    )
    .await?;
    let mut events = subscribe(&supervisor).await?;

    let queue = JobQueue::new();
    let start = queue
        .enqueue(NewJob::new(JobAction::Start, agent.id, service.id).with_priority(1))
        .await?;
    let delete = queue
        .enqueue(NewJob::new(JobAction::Delete, agent.id, service.id))
        .await?;

    let mut failed = Vec::new();
    while failed.len() < 2 {
        if let JobEvent::Failed { job_id, error, .. } =
            wait_for(&mut events, |e| matches!(e, JobEvent::Failed { .. })).await?
        {
            failed.push((job_id, error));
        }
    }
    // Higher priority runs first.
    assert_eq!(failed[0], (start.id, "hypervisor unreachable".to_string()));
    assert_eq!(failed[1].0, delete.id);
    assert!(failed[1].1.starts_with("No handler for job action"));

    let stored = JobRepository::find_by_id(delete.id, &AuthScope::admin()).await?;
    assert_eq!(stored.state, JobState::Failed);
    assert_eq!(stored.error_message.as_deref(), Some(failed[1].1.as_str()));

    // A failed create never touches the service.
    let service = ServiceRepository::find_by_id(service.id, &AuthScope::admin()).await?;
    assert_eq!(service.current_state, ServiceState::Creating);

    shutdown(supervisor, handle).await
}

#[tokio::test]
async fn workers_only_take_their_own_agents_jobs() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (busy, busy_service) = agent_with_service("kvm-03").await?;
    let (idle, idle_service) = agent_with_service("kvm-04").await?;

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!(JobAction::Stop, |_job| Ok(JobOutcome::empty())));

    let (supervisor, handle) = start_supervisor(
        SupervisorArgs::new(handlers)
            .with_janitor(None)
            .with_worker_config(fast_workers())
            .with_agents([busy.id]),
    )
    .await?;
    let mut events = subscribe(&supervisor).await?;

    let queue = JobQueue::new();
    let other = queue
        .enqueue(NewJob::new(JobAction::Stop, idle.id, idle_service.id))
        .await?;
    let mine = queue
        .enqueue(NewJob::new(JobAction::Stop, busy.id, busy_service.id))
        .await?;

    wait_for(&mut events, |e| {
        matches!(e, JobEvent::Completed { job_id, .. } if *job_id == mine.id)
    })
    .await?;

    let untouched = JobRepository::find_by_id(other.id, &AuthScope::admin()).await?;
    assert_eq!(untouched.state, JobState::Pending);
    assert!(untouched.claimed_at.is_none());

    shutdown(supervisor, handle).await
}

#[tokio::test]
async fn sweep_now_releases_stuck_and_purges_old_jobs() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (agent, service) = agent_with_service("kvm-05").await?;
    let queue = JobQueue::new();

    let stuck = queue
        .enqueue(NewJob::new(JobAction::HotUpdate, agent.id, service.id))
        .await?;
    queue.claim(stuck.id, agent.id).await?;
    age_job(stuck.id, "claimed_at", "40m").await?;

    let old = queue
        .enqueue(NewJob::new(JobAction::Stop, agent.id, service.id))
        .await?;
    queue.claim(old.id, agent.id).await?;
    queue.complete(old.id, None, None).await?;
    age_job(old.id, "completed_at", "10d").await?;

    let janitor = JanitorConfig::default()
        .with_interval(Duration::from_secs(3600))
        .with_stuck_after(Duration::from_secs(30 * 60))
        .with_retention(Duration::from_secs(7 * 24 * 60 * 60));
    let (supervisor, handle) =
        start_supervisor(SupervisorArgs::new(JobHandlerRegistry::new()).with_janitor(Some(janitor)))
            .await?;
    let mut events = subscribe(&supervisor).await?;

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::SweepNow { reply: tx.into() })?;
    let report = rx.await??;
    assert_eq!(report.released, 1);
    assert_eq!(report.purged, 1);
    assert!(report.errors.is_empty());

    let event = wait_for(&mut events, |e| matches!(e, JobEvent::StuckReleased { .. })).await?;
    assert!(matches!(event, JobEvent::StuckReleased { count: 1, .. }));

    let released = JobRepository::find_by_id(stuck.id, &AuthScope::admin()).await?;
    assert!(released.is_pending());
    assert!(released.claimed_at.is_none());

    let purged = JobRepository::find_by_id(old.id, &AuthScope::admin()).await;
    assert!(purged.is_err_and(|e| e.is_not_found()));

    shutdown(supervisor, handle).await
}

#[tokio::test]
async fn supervisor_starts_and_stops_workers() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (agent, _service) = agent_with_service("kvm-06").await?;

    let (supervisor, handle) =
        start_supervisor(SupervisorArgs::new(JobHandlerRegistry::new()).with_janitor(None))
            .await?;

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::StartWorker {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert_eq!(rx.await?, Ok(()));

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::StartWorker {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert!(rx.await?.is_err());

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::ListWorkers { reply: tx.into() })?;
    assert_eq!(rx.await?, vec![agent.id]);

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::GetWorkerStats {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert_eq!(rx.await?, Some(WorkerStats::default()));

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::StopWorker {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert_eq!(rx.await?, Ok(()));

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::StopWorker {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert!(rx.await?.is_err());

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::ListWorkers { reply: tx.into() })?;
    assert!(rx.await?.is_empty());

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::GetWorkerStats {
        agent_id: agent.id,
        reply: tx.into(),
    })?;
    assert_eq!(rx.await?, None);

    // No janitor configured.
    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::SweepNow { reply: tx.into() })?;
    assert!(rx.await?.is_err());

    shutdown(supervisor, handle).await
}

#[tokio::test]
async fn zero_intervals_still_dispatch_and_sweep() -> Result<(), Box<dyn Error>> {
    let _guard = common::setup_db().await?;
    let (agent, service) = agent_with_service("kvm-07").await?;

    let mut handlers = JobHandlerRegistry::new();
    handlers.register(job_handler!(JobAction::Stop, |_job| Ok(JobOutcome::empty())));

    // Set the fields directly so the builders' clamp is bypassed.
    let mut workers = WorkerConfig::default();
    workers.poll_interval = Duration::ZERO;
    let mut janitor = JanitorConfig::default();
    janitor.interval = Duration::ZERO;

    let (supervisor, handle) = start_supervisor(
        SupervisorArgs::new(handlers)
            .with_janitor(Some(janitor))
            .with_worker_config(workers)
            .with_agents([agent.id]),
    )
    .await?;
    let mut events = subscribe(&supervisor).await?;

    let job = JobQueue::new()
        .enqueue(NewJob::new(JobAction::Stop, agent.id, service.id))
        .await?;
    wait_for(&mut events, |e| {
        matches!(e, JobEvent::Completed { job_id, .. } if *job_id == job.id)
    })
    .await?;

    let (tx, rx) = concurrency::oneshot();
    supervisor.send_message(SupervisorMessage::SweepNow { reply: tx.into() })?;
    assert!(rx.await?.is_ok());

    shutdown(supervisor, handle).await
}
