#![allow(dead_code)]

use std::sync::LazyLock;

use tokio::sync::{Mutex, MutexGuard};

use db::repositories::{
    AgentRepository, AgentTypeRepository, ParticipantRepository, ServiceRepository,
};
use db::{DbConfig, DbError};
use dispatch_core::{Agent, AgentType, NewAgent, NewService, Participant, Service};

static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn setup_db() -> Result<MutexGuard<'static, ()>, DbError> {
    let guard = TEST_LOCK.lock().await;
    db::init(DbConfig::memory()).await?;
    let db_conn = db::get_db()?;
    db_conn
        .query("DELETE job; DELETE service; DELETE agent; DELETE agent_type; DELETE participant;")
        .await?
        .check()?;
    Ok(guard)
}

/// A provider running one agent that hosts one service for a consumer.
pub struct Fleet {
    pub provider: Participant,
    pub consumer: Participant,
    pub agent_type: AgentType,
    pub agent: Agent,
    pub service: Service,
}

impl Fleet {
    pub async fn create() -> Result<Self, DbError> {
        let provider = ParticipantRepository::create("acme hosting").await?;
        let consumer = ParticipantRepository::create("globex").await?;
        let agent_type = AgentTypeRepository::create(format!("kvm-{}", provider.id)).await?;
        let agent = AgentRepository::create(NewAgent::new("kvm-01", provider.id, agent_type.id))
            .await?;
        let service = ServiceRepository::create(NewService::new(
            "web-frontend",
            agent.id,
            provider.id,
            consumer.id,
        ))
        .await?;

        Ok(Self {
            provider,
            consumer,
            agent_type,
            agent,
            service,
        })
    }

    /// Another agent and service under the same provider and consumer.
    pub async fn second_agent(&self, name: &str) -> Result<(Agent, Service), DbError> {
        let agent = AgentRepository::create(NewAgent::new(
            name,
            self.provider.id,
            self.agent_type.id,
        ))
        .await?;
        let service = ServiceRepository::create(NewService::new(
            format!("{name}-service"),
            agent.id,
            self.provider.id,
            self.consumer.id,
        ))
        .await?;
        Ok((agent, service))
    }
}

/// Shift a job's timestamp into the past, e.g. `age_job(id, "claimed_at", "40m")`.
pub async fn age_job(job_id: impl ToString, field: &str, age: &str) -> Result<(), DbError> {
    let db_conn = db::get_db()?;
    db_conn
        .query(format!(
            "UPDATE type::thing('job', $id) SET {field} = time::now() - {age}"
        ))
        .bind(("id", job_id.to_string()))
        .await?
        .check()?;
    Ok(())
}
