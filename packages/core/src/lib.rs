//! Core domain types for the fleet work-dispatch system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobAction and JobState for dispatched work items
//! - Service, Agent, AgentType and Participant for the managed fleet
//! - AuthScope and Identity for row-level visibility
//! - Page requests/responses for list queries
//! - Events for real-time updates

#[macro_use]
mod macros;

mod agent;
mod error;
mod events;
mod ids;
mod job;
mod page;
mod participant;
mod scope;
mod service;

pub use agent::{Agent, AgentState, AgentType, NewAgent};
pub use error::ParseError;
pub use events::JobEvent;
pub use ids::{AgentId, AgentTypeId, JobId, ParticipantId, ServiceId};
pub use job::{Job, JobAction, JobState, NewJob};
pub use page::{PageRequest, PageResponse, Sort, SortDirection};
pub use participant::{Participant, ParticipantState};
pub use scope::{AuthScope, DefaultScopeResolver, Identity, ScopeResolver};
pub use service::{NewService, Service, ServiceState};
