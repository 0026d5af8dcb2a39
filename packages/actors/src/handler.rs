//! Job handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dispatch_core::{Job, JobAction};
use serde_json::Value;

/// What a handler reports back for a successful job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOutcome {
    /// Stored on the job; must be a JSON object when present.
    pub result_data: Option<Value>,
    /// Identifier assigned by the agent's backend. Recorded on the service
    /// when a `Create` job completes.
    pub external_id: Option<String>,
}

impl JobOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, result_data: Value) -> Self {
        self.result_data = Some(result_data);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Result type for job handlers. The error string becomes the job's
/// error message.
pub type HandlerResult = Result<JobOutcome, String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// Implement this trait to define how jobs with a given action are carried
/// out on an agent.
pub trait JobHandler: Send + Sync + 'static {
    /// The action this handler performs.
    fn action(&self) -> JobAction;

    /// Process a claimed job.
    fn handle(&self, job: &Job) -> HandlerFuture;
}

/// Maps job actions to their handlers.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<JobAction, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same action.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        self.handlers.insert(handler.action(), Arc::new(handler));
    }

    pub fn get(&self, action: JobAction) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&action).cloned()
    }

    pub fn has_handler(&self, action: JobAction) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Registered actions, in declaration order.
    pub fn actions(&self) -> Vec<JobAction> {
        JobAction::ALL
            .iter()
            .copied()
            .filter(|a| self.handlers.contains_key(a))
            .collect()
    }
}

impl std::fmt::Debug for JobHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandlerRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}

/// A closure-based job handler.
pub struct FnHandler<F>
where
    F: Fn(Job) -> HandlerFuture + Send + Sync + 'static,
{
    action: JobAction,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Job) -> HandlerFuture + Send + Sync + 'static,
{
    pub fn new(action: JobAction, handler: F) -> Self {
        Self { action, handler }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(Job) -> HandlerFuture + Send + Sync + 'static,
{
    fn action(&self) -> JobAction {
        self.action
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        (self.handler)(job.clone())
    }
}

/// Build a [`FnHandler`] from an async block.
///
/// ```ignore
/// registry.register(job_handler!(JobAction::Start, |job| {
///     Ok(JobOutcome::empty().with_result(json!({ "started": job.service_id })))
/// }));
/// ```
#[macro_export]
macro_rules! job_handler {
    ($action:expr, |$job:ident| $body:expr) => {
        $crate::FnHandler::new($action, |$job| Box::pin(async move { $body }))
    };
}
