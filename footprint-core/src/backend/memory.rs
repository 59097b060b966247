//! In-memory job backend.
//!
//! Holds jobs in a shared map and runs each submission on a spawned task.
//! Used by tests and embedded callers; the server uses the Postgres-backed
//! store instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use footprint_model::{JobState, SearchJob, SearchJobSummary, SubmitRequest};

use crate::backend::JobBackend;
use crate::enumerate::UsernameEnumerator;
use crate::error::BackendError;

pub struct InMemoryJobBackend {
    jobs: Arc<RwLock<HashMap<Uuid, SearchJob>>>,
    enumerator: Arc<dyn UsernameEnumerator>,
}

impl std::fmt::Debug for InMemoryJobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJobBackend").finish_non_exhaustive()
    }
}

impl InMemoryJobBackend {
    pub fn new(enumerator: Arc<dyn UsernameEnumerator>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            enumerator,
        }
    }

    /// Apply `updater` to a live job. Terminal jobs are frozen; a late
    /// writer hitting one is a bug in the runner, so it only logs.
    async fn update_job<F>(&self, job_id: Uuid, updater: F)
    where
        F: FnOnce(&mut SearchJob),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job_id) {
            Some(job) if job.is_terminal() => {
                warn!(%job_id, state = %job.state, "ignoring write to terminal job");
            }
            Some(job) => updater(job),
            None => warn!(%job_id, "update for unknown job"),
        }
    }

    async fn run_job(&self, job_id: Uuid, request: SubmitRequest) {
        self.update_job(job_id, |job| {
            job.state = JobState::Running;
            job.started_at = Some(Utc::now());
        })
        .await;

        let timeout = Duration::from_secs(u64::from(request.effective_timeout_secs()));
        let outcome = self
            .enumerator
            .enumerate(
                &request.subject_query,
                request.site_filter.as_deref(),
                timeout,
            )
            .await;

        match outcome {
            Ok(findings) => {
                info!(%job_id, findings = findings.len(), "enumeration completed");
                self.update_job(job_id, |job| {
                    job.state = JobState::Completed;
                    job.result = Some(findings);
                    job.completed_at = Some(Utc::now());
                })
                .await;
            }
            Err(err) => {
                warn!(%job_id, error = %err, "enumeration failed");
                self.update_job(job_id, |job| {
                    job.state = JobState::Failed;
                    job.error_detail = Some(err.to_string());
                    job.completed_at = Some(Utc::now());
                })
                .await;
            }
        }
    }
}

#[async_trait]
impl JobBackend for InMemoryJobBackend {
    async fn submit(&self, request: SubmitRequest) -> Result<Uuid, BackendError> {
        let job_id = Uuid::new_v4();
        let job = SearchJob {
            id: job_id,
            subject_query: request.subject_query.clone(),
            owner_record_id: request.owner_record_id,
            site_filter: request.site_filter.clone(),
            timeout_secs: request.effective_timeout_secs(),
            state: JobState::Pending,
            result: None,
            error_detail: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        self.jobs.write().await.insert(job_id, job);
        info!(%job_id, subject = %request.subject_query, "search job queued");

        let runner = Self {
            jobs: Arc::clone(&self.jobs),
            enumerator: Arc::clone(&self.enumerator),
        };
        tokio::spawn(async move {
            runner.run_job(job_id, request).await;
        });

        Ok(job_id)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<SearchJob, BackendError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(BackendError::NotFound(job_id))
    }

    async fn list_recent(
        &self,
        owner_record_id: Option<Uuid>,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<SearchJobSummary>, BackendError> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<SearchJobSummary> = jobs
            .values()
            .filter(|job| owner_record_id.is_none_or(|owner| job.owner_record_id == Some(owner)))
            .filter(|job| state.is_none_or(|s| job.state == s))
            .map(SearchJob::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}
