//! Postgres-backed job backend.
//!
//! Job rows move `pending -> running -> {completed | failed}` and every
//! state write is guarded on the current state, so a terminal row is
//! written exactly once and later reads always return the same result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use footprint_core::{BackendError, JobBackend, UsernameEnumerator};
use footprint_model::{JobState, PlatformFinding, SearchJob, SearchJobSummary, SubmitRequest};

#[derive(Clone)]
pub struct PgJobBackend {
    pool: PgPool,
    enumerator: Arc<dyn UsernameEnumerator>,
}

impl std::fmt::Debug for PgJobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgJobBackend").finish_non_exhaustive()
    }
}

fn job_state_from_str(raw: &str) -> Result<JobState, BackendError> {
    match raw {
        "pending" => Ok(JobState::Pending),
        "running" => Ok(JobState::Running),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        other => Err(BackendError::Unavailable(format!(
            "unrecognized job state `{other}` in store"
        ))),
    }
}

fn map_job_row(row: &PgRow) -> Result<SearchJob, BackendError> {
    let read = |e: sqlx::Error| BackendError::Unavailable(format!("failed to read job row: {e}"));

    let state_raw: String = row.try_get("state").map_err(read)?;
    let site_filter: Option<serde_json::Value> = row.try_get("site_filter").map_err(read)?;
    let result: Option<serde_json::Value> = row.try_get("result").map_err(read)?;
    let timeout_secs: i32 = row.try_get("timeout_secs").map_err(read)?;

    let site_filter = site_filter
        .map(serde_json::from_value::<Vec<String>>)
        .transpose()
        .map_err(|e| BackendError::Unavailable(format!("corrupt site filter: {e}")))?;
    let result = result
        .map(serde_json::from_value::<Vec<PlatformFinding>>)
        .transpose()
        .map_err(|e| BackendError::Unavailable(format!("corrupt job result: {e}")))?;

    Ok(SearchJob {
        id: row.try_get("id").map_err(read)?,
        subject_query: row.try_get("subject_query").map_err(read)?,
        owner_record_id: row.try_get("owner_record_id").map_err(read)?,
        site_filter,
        timeout_secs: timeout_secs.max(0) as u32,
        state: job_state_from_str(&state_raw)?,
        result,
        error_detail: row.try_get("error_detail").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        started_at: row.try_get("started_at").map_err(read)?,
        completed_at: row.try_get("completed_at").map_err(read)?,
    })
}

impl PgJobBackend {
    pub fn new(pool: PgPool, enumerator: Arc<dyn UsernameEnumerator>) -> Self {
        Self { pool, enumerator }
    }

    async fn run_job(&self, job_id: Uuid, request: SubmitRequest) {
        // claim the row; a lost race means someone else runs it
        let claimed = sqlx::query(
            r#"
            UPDATE search_jobs
            SET state = 'running', started_at = $2
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(job_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match claimed {
            Ok(done) if done.rows_affected() == 1 => {}
            Ok(_) => {
                warn!(%job_id, "job already claimed, skipping run");
                return;
            }
            Err(e) => {
                error!(%job_id, error = %e, "failed to claim job");
                return;
            }
        }

        let timeout = Duration::from_secs(u64::from(request.effective_timeout_secs()));
        let outcome = self
            .enumerator
            .enumerate(
                &request.subject_query,
                request.site_filter.as_deref(),
                timeout,
            )
            .await;

        let finish = match outcome {
            Ok(findings) => {
                info!(%job_id, findings = findings.len(), "enumeration completed");
                let payload = match serde_json::to_value(&findings) {
                    Ok(value) => value,
                    Err(e) => {
                        error!(%job_id, error = %e, "failed to encode findings");
                        self.mark_failed(job_id, &format!("failed to encode findings: {e}"))
                            .await;
                        return;
                    }
                };
                sqlx::query(
                    r#"
                    UPDATE search_jobs
                    SET state = 'completed', result = $2, completed_at = $3
                    WHERE id = $1 AND state = 'running'
                    "#,
                )
                .bind(job_id)
                .bind(payload)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
            }
            Err(err) => {
                warn!(%job_id, error = %err, "enumeration failed");
                self.mark_failed(job_id, &err.to_string()).await;
                return;
            }
        };

        if let Err(e) = finish {
            error!(%job_id, error = %e, "failed to store job result");
        }
    }

    async fn mark_failed(&self, job_id: Uuid, detail: &str) {
        let result = sqlx::query(
            r#"
            UPDATE search_jobs
            SET state = 'failed', error_detail = $2, completed_at = $3
            WHERE id = $1 AND state IN ('pending', 'running')
            "#,
        )
        .bind(job_id)
        .bind(detail)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(%job_id, error = %e, "failed to record job failure");
        }
    }
}

#[async_trait]
impl JobBackend for PgJobBackend {
    async fn submit(&self, request: SubmitRequest) -> Result<Uuid, BackendError> {
        let job_id = Uuid::new_v4();
        let site_filter = request
            .site_filter
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| BackendError::Unavailable(format!("invalid site filter: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO search_jobs
                (id, subject_query, owner_record_id, site_filter, timeout_secs, state, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            "#,
        )
        .bind(job_id)
        .bind(&request.subject_query)
        .bind(request.owner_record_id)
        .bind(site_filter)
        .bind(request.effective_timeout_secs() as i32)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BackendError::Unavailable(format!("failed to enqueue job: {e}")))?;

        info!(%job_id, subject = %request.subject_query, "search job queued");

        let runner = self.clone();
        tokio::spawn(async move {
            runner.run_job(job_id, request).await;
        });

        Ok(job_id)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<SearchJob, BackendError> {
        let row = sqlx::query(
            r#"
            SELECT id, subject_query, owner_record_id, site_filter, timeout_secs,
                   state, result, error_detail, created_at, started_at, completed_at
            FROM search_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BackendError::Unavailable(format!("failed to load job: {e}")))?;

        match row {
            Some(row) => map_job_row(&row),
            None => Err(BackendError::NotFound(job_id)),
        }
    }

    async fn list_recent(
        &self,
        owner_record_id: Option<Uuid>,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<SearchJobSummary>, BackendError> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_query, owner_record_id, state, created_at, completed_at
            FROM search_jobs
            WHERE ($1::uuid IS NULL OR owner_record_id = $1)
              AND ($2::text IS NULL OR state = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(owner_record_id)
        .bind(state.map(|s| s.to_string()))
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BackendError::Unavailable(format!("failed to list jobs: {e}")))?;

        let read =
            |e: sqlx::Error| BackendError::Unavailable(format!("failed to read job row: {e}"));

        rows.iter()
            .map(|row| {
                let state_raw: String = row.try_get("state").map_err(read)?;
                let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;
                Ok(SearchJobSummary {
                    id: row.try_get("id").map_err(read)?,
                    subject_query: row.try_get("subject_query").map_err(read)?,
                    owner_record_id: row.try_get("owner_record_id").map_err(read)?,
                    state: job_state_from_str(&state_raw)?,
                    created_at,
                    completed_at: row.try_get("completed_at").map_err(read)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trip() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(job_state_from_str(&state.to_string()).unwrap(), state);
        }
        assert!(job_state_from_str("exploded").is_err());
    }
}
