//! Repository implementations for database operations.

mod agent_repo;
mod agent_type_repo;
mod job_queue;
mod job_repo;
mod participant_repo;
mod service_repo;

pub use agent_repo::AgentRepository;
pub use agent_type_repo::AgentTypeRepository;
pub use job_queue::{JobQueue, ServiceUpdater};
pub use job_repo::JobRepository;
pub use participant_repo::ParticipantRepository;
pub use service_repo::ServiceRepository;
