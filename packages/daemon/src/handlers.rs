//! Built-in handlers that acknowledge every action.
//!
//! A real deployment registers handlers that talk to its agents' backends.
//! These echo the request back so a fresh daemon can be exercised end to end.

use actors::{JobHandlerRegistry, JobOutcome, job_handler};
use dispatch_core::{Job, JobAction};
use serde_json::{Value, json};

fn echo(job: &Job) -> Value {
    json!({
        "action": job.action.as_str(),
        "service_id": job.service_id.to_string(),
        "request": job.request_data.clone().unwrap_or(Value::Null),
    })
}

/// The backend identifier a create request asked for, if any.
fn requested_external_id(job: &Job) -> Option<String> {
    job.request_data
        .as_ref()?
        .get("external_id")?
        .as_str()
        .map(str::to_owned)
}

pub fn default_handlers() -> JobHandlerRegistry {
    let mut registry = JobHandlerRegistry::new();

    registry.register(job_handler!(JobAction::Create, |job| {
        tracing::info!(job_id = %job.id, service_id = %job.service_id, "Create requested");
        let mut outcome = JobOutcome::empty().with_result(echo(&job));
        if let Some(external_id) = requested_external_id(&job) {
            outcome = outcome.with_external_id(external_id);
        }
        Ok(outcome)
    }));

    for action in JobAction::ALL.iter().copied().filter(|a| *a != JobAction::Create) {
        registry.register(job_handler!(action, |job| {
            tracing::info!(job_id = %job.id, action = %job.action, "Action requested");
            Ok(JobOutcome::empty().with_result(echo(&job)))
        }));
    }

    registry
}
