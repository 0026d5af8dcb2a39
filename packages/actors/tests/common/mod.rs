#![allow(dead_code)]

use std::sync::LazyLock;

use tokio::sync::{Mutex, MutexGuard};

use db::repositories::{
    AgentRepository, AgentTypeRepository, ParticipantRepository, ServiceRepository,
};
use db::{DbConfig, DbError};
use dispatch_core::{Agent, NewAgent, NewService, Service};

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Actor names are process-global, so runtime tests never overlap.
pub async fn setup_db() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = TEST_LOCK.lock().await;
    db::init(DbConfig::memory()).await?;
    db::get_db()?
        .query("DELETE job; DELETE service; DELETE agent; DELETE agent_type; DELETE participant;")
        .await?
        .check()?;
    Ok(guard)
}

/// One agent hosting one service.
pub async fn agent_with_service(name: &str) -> Result<(Agent, Service), DbError> {
    let provider = ParticipantRepository::create(format!("{name} provider")).await?;
    let consumer = ParticipantRepository::create(format!("{name} consumer")).await?;
    let agent_type = AgentTypeRepository::create(format!("{name}-type")).await?;
    let agent = AgentRepository::create(NewAgent::new(name, provider.id, agent_type.id)).await?;
    let service = ServiceRepository::create(NewService::new(
        format!("{name}-service"),
        agent.id,
        provider.id,
        consumer.id,
    ))
    .await?;
    Ok((agent, service))
}

pub async fn age_job(job_id: impl ToString, field: &str, age: &str) -> Result<(), DbError> {
    db::get_db()?
        .query(format!(
            "UPDATE type::thing('job', $id) SET {field} = time::now() - {age}"
        ))
        .bind(("id", job_id.to_string()))
        .await?
        .check()?;
    Ok(())
}
