//! HTTP surface of the job lifecycle: queue, poll, track, resume, list,
//! reconcile.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use footprint_core::{reconcile, PlatformListItem, PollPolicy, TrackOutcome};
use footprint_model::{
    ApiResponse, JobState, ReconciliationReport, SearchJob, SearchJobSummary, SubmitRequest,
};

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

// caps for caller-supplied tracking budgets; one HTTP request should not
// hold a worker for more than ~10 minutes
const MAX_TRACK_ATTEMPTS: u32 = 120;
const MAX_TRACK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
}

pub async fn queue_search_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> AppResult<Json<ApiResponse<QueuedJob>>> {
    if request.subject_query.trim().is_empty() {
        return Err(AppError::bad_request("subject_query must not be empty"));
    }

    let subject = request.subject_query.clone();
    let job_id = state.tracker.submit(request).await?;

    Ok(Json(
        ApiResponse::success(QueuedJob { job_id })
            .with_message(format!("search for '{subject}' has been queued")),
    ))
}

pub async fn get_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SearchJob>>> {
    let job = state.tracker.poll(job_id).await?;
    Ok(Json(ApiResponse::success(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub person_id: Option<Uuid>,
    pub state: Option<JobState>,
    pub limit: Option<usize>,
}

pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<ApiResponse<Vec<SearchJobSummary>>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let jobs = state
        .tracker
        .list_recent(query.person_id, query.state, limit)
        .await?;
    Ok(Json(ApiResponse::success(jobs)))
}

#[derive(Debug, Deserialize, Default)]
pub struct TrackQuery {
    pub attempts: Option<u32>,
    pub interval_secs: Option<u64>,
}

impl TrackQuery {
    fn policy(&self, default: PollPolicy) -> PollPolicy {
        let attempts = self
            .attempts
            .unwrap_or(default.max_attempts)
            .clamp(1, MAX_TRACK_ATTEMPTS);
        let interval_secs = self
            .interval_secs
            .unwrap_or(default.interval.as_secs())
            .clamp(1, MAX_TRACK_INTERVAL_SECS);
        PollPolicy::new(Duration::from_secs(interval_secs), attempts)
    }
}

/// Shape returned by track/resume; distinguishes terminal, timed-out and
/// cancelled ends so the caller can offer "resume" only where it applies.
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<SearchJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<JobState>,
    pub resumable: bool,
}

impl From<TrackOutcome> for TrackResponse {
    fn from(outcome: TrackOutcome) -> Self {
        let resumable = outcome.is_resumable();
        match outcome {
            TrackOutcome::Terminal(job) => TrackResponse {
                status: "terminal",
                job: Some(job),
                attempts: None,
                last_observed: None,
                resumable,
            },
            TrackOutcome::TimedOut {
                attempts,
                last_observed,
            } => TrackResponse {
                status: "timed_out",
                job: None,
                attempts: Some(attempts),
                last_observed,
                resumable,
            },
            TrackOutcome::Cancelled => TrackResponse {
                status: "cancelled",
                job: None,
                attempts: None,
                last_observed: None,
                resumable,
            },
        }
    }
}

pub async fn track_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<TrackQuery>,
) -> AppResult<Json<TrackResponse>> {
    let policy = query.policy(state.config.poll_policy());
    info!(%job_id, attempts = policy.max_attempts, "tracking job until terminal");

    let outcome = state
        .tracker
        .track_until_terminal(job_id, &policy, &CancellationToken::new())
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn resume_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<TrackQuery>,
) -> AppResult<Json<TrackResponse>> {
    let policy = query.policy(state.config.poll_policy());
    info!(%job_id, "resuming job tracking");

    let outcome = state
        .tracker
        .resume(job_id, &policy, &CancellationToken::new())
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub person_id: Uuid,
}

pub async fn reconcile_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ReconcileRequest>,
) -> AppResult<Json<ApiResponse<ReconciliationReport>>> {
    let job = state.tracker.poll(job_id).await?;

    match job.state {
        JobState::Completed => {}
        JobState::Failed => {
            return Err(AppError::conflict(format!(
                "job {job_id} failed: {}",
                job.error_detail.as_deref().unwrap_or("unknown error")
            )));
        }
        state => {
            return Err(AppError::conflict(format!(
                "job {job_id} is still {state}; reconcile needs a completed job"
            )));
        }
    }

    let person = state.people.get(request.person_id).await?;
    let findings = job.result.unwrap_or_default();
    let report = reconcile(&job.subject_query, &findings, &person.accounts);

    info!(
        %job_id,
        person_id = %request.person_id,
        candidates = report.summary.new_candidates,
        skipped = report.summary.skipped_existing,
        "reconciliation finished"
    );

    Ok(Json(ApiResponse::success(report)))
}

pub async fn list_platforms_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<PlatformListItem>>>> {
    Ok(Json(ApiResponse::success(state.platforms.list())))
}
