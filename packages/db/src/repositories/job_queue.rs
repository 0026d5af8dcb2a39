//! The job claim protocol.
//!
//! Every transition is one conditional statement against the store, and the
//! number of rows it returns decides whether the transition happened. The
//! embedded engines do not isolate concurrent conditional updates, so
//! transitions also pass through a process-wide gate. An embedded store is
//! owned by a single process, which makes the gate cover every claimant:
//! exactly one claim wins. `init_db` refuses engines shared between
//! processes.
//!
//! ```text
//! Pending --claim--> Processing --complete--> Completed
//!    ^                   |      --fail------> Failed
//!    +--release_stuck----+
//! ```

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatch_core::{AgentId, Job, JobAction, JobId, NewJob, ServiceId, ServiceState};
use serde_json::Value;
use tokio::sync::Mutex;

use super::job_repo::{JobRecord, JobRepository};
use super::service_repo::ServiceRepository;
use crate::query::Entity;
use crate::records::{IdRow, record_key};
use crate::{DbError, get_db};

/// Updates a service when a job that provisions it completes.
pub trait ServiceUpdater: Send + Sync {
    fn update_external_id(
        &self,
        service_id: ServiceId,
        external_id: Option<String>,
        state: ServiceState,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Queue operations over the `job` table.
#[derive(Debug, Clone, Default)]
pub struct JobQueue<S = ServiceRepository> {
    services: S,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> JobQueue<S> {
    /// Use a different service collaborator for completed `Create` jobs.
    pub fn with_services(services: S) -> Self {
        Self { services }
    }
}

fn ensure_object(field: &str, value: &Option<Value>) -> Result<(), DbError> {
    match value {
        Some(v) if !v.is_object() => Err(DbError::Validation(format!(
            "{} must be a JSON object",
            field
        ))),
        _ => Ok(()),
    }
}

/// Serialises job state transitions within the process.
static TRANSITIONS: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Render `older_than` as a SurrealQL millisecond literal. `None` when the
/// cutoff would fall before the Unix epoch, where no row can match.
fn age_literal(older_than: Duration) -> Option<String> {
    let age = chrono::Duration::from_std(older_than).ok()?;
    let cutoff = Utc::now().checked_sub_signed(age)?;
    (cutoff >= DateTime::<Utc>::UNIX_EPOCH).then(|| format!("{}ms", age.num_milliseconds()))
}

impl<S: ServiceUpdater> JobQueue<S> {
    /// Insert a pending job.
    pub async fn enqueue(&self, new_job: NewJob) -> Result<Job, DbError> {
        ensure_object("request_data", &new_job.request_data)?;

        let job = JobRepository::create(new_job).await?;
        tracing::info!(
            job_id = %job.id,
            agent_id = %job.agent_id,
            action = %job.action,
            priority = job.priority,
            "Job enqueued"
        );
        Ok(job)
    }

    /// Up to `limit` pending jobs for an agent, highest priority first and
    /// oldest first within a priority. Read only.
    pub async fn get_pending_for_agent(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<Job>, DbError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(i64::MAX as usize);
        let db = get_db()?;

        let sql = format!(
            r#"SELECT * FROM job
               WHERE agent_id = $agent_id AND state = "pending"
               ORDER BY priority DESC, created_at ASC
               LIMIT {limit}"#
        );
        let mut response = db
            .query(sql)
            .bind(("agent_id", agent_id.to_string()))
            .await?
            .check()?;
        let records: Vec<JobRecord> = response.take(0)?;

        records.into_iter().map(Job::from_record).collect()
    }

    /// Take exclusive ownership of a pending job.
    ///
    /// Fails with [`DbError::NotFoundOrInvalidState`] when the job does not
    /// exist, belongs to another agent, or is no longer pending. Callers
    /// should move on to another job rather than retry.
    pub async fn claim(&self, job_id: JobId, agent_id: AgentId) -> Result<Job, DbError> {
        let sql = r#"UPDATE type::thing("job", $id)
            SET state = "processing", claimed_at = time::now(), updated_at = time::now()
            WHERE agent_id = $agent_id AND state = "pending"
            RETURN AFTER"#;

        let db = get_db()?;
        let _gate = TRANSITIONS.lock().await;
        let response = db
            .query(sql)
            .bind(("id", job_id.to_string()))
            .bind(("agent_id", agent_id.to_string()))
            .await?
            .check()?;

        let job = transitioned(job_id, "claim", response)?;
        tracing::debug!(job_id = %job_id, agent_id = %agent_id, "Job claimed");
        Ok(job)
    }

    /// Finish a processing job successfully.
    ///
    /// For a `Create` job the target service is then moved to `Created` and
    /// given `external_id`. The job stays completed if that update fails; the
    /// error is still returned.
    pub async fn complete(
        &self,
        job_id: JobId,
        result_data: Option<Value>,
        external_id: Option<String>,
    ) -> Result<Job, DbError> {
        ensure_object("result_data", &result_data)?;

        let sql = r#"UPDATE type::thing("job", $id)
            SET state = "completed", result_data = $result_data,
                completed_at = time::now(), updated_at = time::now()
            WHERE state = "processing"
            RETURN AFTER"#;

        let db = get_db()?;
        let job = {
            let _gate = TRANSITIONS.lock().await;
            let response = db
                .query(sql)
                .bind(("id", job_id.to_string()))
                .bind(("result_data", result_data))
                .await?
                .check()?;
            transitioned(job_id, "complete", response)?
        };
        tracing::info!(job_id = %job_id, action = %job.action, "Job completed");

        if job.action == JobAction::Create {
            self.services
                .update_external_id(job.service_id, external_id, ServiceState::Created)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        job_id = %job_id,
                        service_id = %job.service_id,
                        "Failed to update service after create: {}",
                        e
                    )
                })?;
        }

        Ok(job)
    }

    /// Finish a processing job with an error.
    pub async fn fail(&self, job_id: JobId, error_message: impl Into<String>) -> Result<Job, DbError> {
        let error_message = error_message.into();
        let sql = r#"UPDATE type::thing("job", $id)
            SET state = "failed", error_message = $error_message,
                completed_at = time::now(), updated_at = time::now()
            WHERE state = "processing"
            RETURN AFTER"#;

        let db = get_db()?;
        let _gate = TRANSITIONS.lock().await;
        let response = db
            .query(sql)
            .bind(("id", job_id.to_string()))
            .bind(("error_message", error_message.clone()))
            .await?
            .check()?;

        let job = transitioned(job_id, "fail", response)?;
        tracing::warn!(job_id = %job_id, "Job failed: {}", error_message);
        Ok(job)
    }

    /// Return jobs whose claim is older than `older_than` to the pending
    /// pool. Returns how many were released.
    pub async fn release_stuck(&self, older_than: Duration) -> Result<u64, DbError> {
        let Some(age) = age_literal(older_than) else {
            return Ok(0);
        };
        let sql = format!(
            r#"UPDATE job
               SET state = "pending", claimed_at = NONE, updated_at = time::now()
               WHERE state = "processing" AND claimed_at < (time::now() - {age})
               RETURN AFTER"#
        );

        let db = get_db()?;
        let _gate = TRANSITIONS.lock().await;
        let mut response = db.query(sql).await?.check()?;
        let rows: Vec<IdRow> = response.take(0)?;

        if !rows.is_empty() {
            let ids: Vec<String> = rows.iter().map(|r| record_key(&r.id)).collect();
            tracing::info!(count = rows.len(), "Released stuck jobs");
            tracing::debug!(jobs = ?ids, "Released job ids");
        }
        Ok(rows.len() as u64)
    }

    /// Delete completed and failed jobs that finished more than
    /// `older_than` ago. Pending and processing jobs are never touched.
    pub async fn purge(&self, older_than: Duration) -> Result<u64, DbError> {
        let Some(age) = age_literal(older_than) else {
            return Ok(0);
        };
        let sql = format!(
            r#"DELETE job
               WHERE state IN ["completed", "failed"]
                 AND completed_at < (time::now() - {age})
               RETURN BEFORE"#
        );

        let db = get_db()?;
        let _gate = TRANSITIONS.lock().await;
        let mut response = db.query(sql).await?.check()?;
        let rows: Vec<IdRow> = response.take(0)?;

        if !rows.is_empty() {
            tracing::info!(count = rows.len(), "Purged old jobs");
        }
        Ok(rows.len() as u64)
    }
}

/// Interpret the outcome of a single-row conditional update. No returned
/// row means the transition did not apply.
fn transitioned(
    job_id: JobId,
    operation: &str,
    mut response: surrealdb::Response,
) -> Result<Job, DbError> {
    let records: Vec<JobRecord> = response.take(0)?;

    records
        .into_iter()
        .next()
        .map(Job::from_record)
        .transpose()?
        .ok_or_else(|| {
            DbError::NotFoundOrInvalidState(format!("cannot {} job {}", operation, job_id))
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn ages_render_as_milliseconds() {
        assert_eq!(
            age_literal(Duration::from_secs(30 * 60)).as_deref(),
            Some("1800000ms")
        );
        assert_eq!(age_literal(Duration::ZERO).as_deref(), Some("0ms"));
    }

    #[test]
    fn ages_reaching_past_the_epoch_match_nothing() {
        assert_eq!(age_literal(Duration::MAX), None);
        assert_eq!(age_literal(Duration::from_secs(u64::MAX / 2)), None);
        // 200 years back is before 1970.
        assert_eq!(age_literal(Duration::from_secs(200 * 365 * 24 * 60 * 60)), None);
    }

    #[test]
    fn payloads_must_be_objects() {
        assert!(ensure_object("request_data", &None).is_ok());
        assert!(ensure_object("request_data", &Some(json!({"size": 2}))).is_ok());
        assert!(
            ensure_object("request_data", &Some(json!([1, 2])))
                .unwrap_err()
                .is_validation()
        );
    }
}
