//! Job tracker: submission, polling, bounded tracking, resumption.
//!
//! The tracker is a pure reader of job state. It never writes to a job, so
//! cancellation cannot corrupt anything and any number of trackers may
//! follow the same job concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use footprint_model::{JobState, SearchJob, SearchJobSummary, SubmitRequest};

use crate::backend::JobBackend;
use crate::error::{BackendError, Result, TrackError};

/// Budget for one tracking loop: fixed interval between poll attempts and a
/// maximum attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// 5 seconds between polls, 60 attempts: about five minutes of
    /// tracking before giving the job back as resumable.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            // a zero budget would mean "never look"; clamp to one poll
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// How a tracking loop ended when it did not error.
///
/// `TimedOut` and `Cancelled` are deliberate non-errors: the job is intact
/// and may still reach a terminal state, so the caller can offer `resume`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// The job reached `Completed` or `Failed`; the record is frozen.
    Terminal(SearchJob),
    /// The attempt budget ran out without a terminal observation.
    TimedOut {
        attempts: u32,
        last_observed: Option<JobState>,
    },
    /// The caller's cancellation signal stopped the loop.
    Cancelled,
}

impl TrackOutcome {
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            TrackOutcome::TimedOut { .. } | TrackOutcome::Cancelled
        )
    }
}

/// Tracks the lifecycle of search jobs owned by a [`JobBackend`].
#[derive(Debug)]
pub struct JobTracker<B: JobBackend> {
    backend: Arc<B>,
}

impl<B: JobBackend> Clone for JobTracker<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: JobBackend> JobTracker<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Submit a new search to the backend.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Uuid> {
        let job_id = self
            .backend
            .submit(request)
            .await
            .map_err(TrackError::from_backend)?;
        info!(%job_id, "search job submitted");
        Ok(job_id)
    }

    /// One non-blocking read of the job's current state.
    pub async fn poll(&self, job_id: Uuid) -> Result<SearchJob> {
        self.backend
            .get_status(job_id)
            .await
            .map_err(TrackError::from_backend)
    }

    /// Poll until the job is terminal or the policy budget runs out.
    ///
    /// State is re-read on every attempt, never cached. The loop returns the
    /// moment a terminal state is observed; it does not poll again after
    /// that. Transient backend errors consume an attempt and are retried
    /// silently; only a budget consisting entirely of errors surfaces as
    /// [`TrackError::BackendUnavailable`]. `JobNotFound` is permanent and
    /// surfaces immediately. The cancellation token stops the loop before
    /// the next sleep or poll.
    pub async fn track_until_terminal(
        &self,
        job_id: Uuid,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<TrackOutcome> {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_observed = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                debug!(%job_id, attempt, "tracking cancelled");
                return Ok(TrackOutcome::Cancelled);
            }

            match self.backend.get_status(job_id).await {
                Ok(job) => {
                    last_observed = Some(job.state);
                    if job.is_terminal() {
                        info!(%job_id, state = %job.state, attempt, "job reached terminal state");
                        return Ok(TrackOutcome::Terminal(job));
                    }
                    debug!(%job_id, state = %job.state, attempt, "job still in flight");
                }
                Err(BackendError::NotFound(id)) => {
                    return Err(TrackError::JobNotFound(id));
                }
                Err(BackendError::Unavailable(detail)) => {
                    // transient; invisible to the caller until the budget is gone
                    debug!(%job_id, attempt, %detail, "poll attempt failed");
                    last_error = Some(detail);
                }
            }

            if attempt == max_attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%job_id, attempt, "tracking cancelled during backoff");
                    return Ok(TrackOutcome::Cancelled);
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }

        if last_observed.is_some() {
            warn!(%job_id, attempts = max_attempts, "tracking budget exhausted, job resumable");
            Ok(TrackOutcome::TimedOut {
                attempts: max_attempts,
                last_observed,
            })
        } else {
            Err(TrackError::BackendUnavailable {
                attempts: max_attempts,
                detail: last_error.unwrap_or_else(|| "no poll attempt succeeded".to_string()),
            })
        }
    }

    /// Re-attach to a job the caller previously stopped tracking.
    ///
    /// A single poll first: if the job is already terminal this returns at
    /// once with no duplicate work. Otherwise it falls into a fresh
    /// [`Self::track_until_terminal`] budget.
    pub async fn resume(
        &self,
        job_id: Uuid,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<TrackOutcome> {
        let job = self.poll(job_id).await?;
        if job.is_terminal() {
            debug!(%job_id, state = %job.state, "resume found terminal job");
            return Ok(TrackOutcome::Terminal(job));
        }
        self.track_until_terminal(job_id, policy, cancel).await
    }

    /// Most-recent-first summaries of known jobs. Read-only.
    pub async fn list_recent(
        &self,
        owner_record_id: Option<Uuid>,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<SearchJobSummary>> {
        self.backend
            .list_recent(owner_record_id, state, limit)
            .await
            .map_err(TrackError::from_backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    fn job(state: JobState) -> SearchJob {
        SearchJob {
            id: Uuid::nil(),
            subject_query: "jdoe".into(),
            owner_record_id: None,
            site_filter: None,
            timeout_secs: 60,
            state,
            result: None,
            error_detail: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Backend that replays a scripted sequence of poll responses; the last
    /// entry repeats forever. Optionally cancels a token after N polls.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<std::result::Result<SearchJob, BackendError>>>,
        polls: AtomicU32,
        cancel_after: Option<(u32, CancellationToken)>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<std::result::Result<SearchJob, BackendError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                polls: AtomicU32::new(0),
                cancel_after: None,
            }
        }

        fn cancelling_after(mut self, polls: u32, token: CancellationToken) -> Self {
            self.cancel_after = Some((polls, token));
            self
        }

        fn poll_count(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobBackend for ScriptedBackend {
        async fn submit(&self, _request: SubmitRequest) -> std::result::Result<Uuid, BackendError> {
            Ok(Uuid::new_v4())
        }

        async fn get_status(&self, job_id: Uuid) -> std::result::Result<SearchJob, BackendError> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, token)) = &self.cancel_after {
                if polls >= *after {
                    token.cancel();
                }
            }
            let mut responses = self.responses.lock().await;
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                match responses.front() {
                    Some(Ok(job)) => Ok(job.clone()),
                    Some(Err(BackendError::Unavailable(detail))) => {
                        Err(BackendError::Unavailable(detail.clone()))
                    }
                    Some(Err(BackendError::NotFound(id))) => Err(BackendError::NotFound(*id)),
                    None => Err(BackendError::NotFound(job_id)),
                }
            }
        }

        async fn list_recent(
            &self,
            _owner: Option<Uuid>,
            _state: Option<JobState>,
            _limit: usize,
        ) -> std::result::Result<Vec<SearchJobSummary>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(5), max_attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_terminal_observation() {
        // three in-flight polls, terminal on the fourth
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(job(JobState::Running)),
            Ok(job(JobState::Running)),
            Ok(job(JobState::Running)),
            Ok(job(JobState::Completed)),
        ]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            TrackOutcome::Terminal(job) => assert_eq!(job.state, JobState::Completed),
            other => panic!("expected terminal outcome, got {other:?}"),
        }
        // exactly four polls: no extra poll after the terminal one
        assert_eq!(backend.poll_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_is_timed_out_not_failed() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(job(JobState::Pending))]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &fast_policy(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.poll_count(), 2);
        assert!(outcome.is_resumable());
        match outcome {
            TrackOutcome::TimedOut {
                attempts,
                last_observed,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_observed, Some(JobState::Pending));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_may_jump_straight_to_failed() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(job(JobState::Pending)),
            Ok(job(JobState::Failed)),
        ]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            TrackOutcome::Terminal(job) => assert_eq!(job.state, JobState::Failed),
            other => panic!("expected terminal outcome, got {other:?}"),
        }
        assert_eq!(backend.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_within_budget() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(BackendError::Unavailable("connection reset".into())),
            Err(BackendError::Unavailable("connection reset".into())),
            Ok(job(JobState::Completed)),
        ]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &fast_policy(5), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, TrackOutcome::Terminal(_)));
        assert_eq!(backend.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn all_attempts_erroring_reports_backend_unavailable() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(BackendError::Unavailable(
            "refused".into(),
        ))]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let err = tracker
            .track_until_terminal(Uuid::nil(), &fast_policy(3), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            TrackError::BackendUnavailable { attempts, detail } => {
                assert_eq!(attempts, 3);
                assert!(detail.contains("refused"));
            }
            other => panic!("expected BackendUnavailable, got {other:?}"),
        }
        assert_eq!(backend.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_job_surfaces_immediately() {
        let missing = Uuid::new_v4();
        let backend = Arc::new(ScriptedBackend::new(vec![Err(BackendError::NotFound(
            missing,
        ))]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let err = tracker
            .track_until_terminal(missing, &fast_policy(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TrackError::JobNotFound(id) if id == missing));
        // permanent: no retries burned on it
        assert_eq!(backend.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_before_next_poll() {
        let token = CancellationToken::new();
        let backend = Arc::new(
            ScriptedBackend::new(vec![Ok(job(JobState::Running))])
                .cancelling_after(2, token.clone()),
        );
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &PollPolicy::default(), &token)
            .await
            .unwrap();

        assert_eq!(outcome, TrackOutcome::Cancelled);
        // cancelled right after the second poll, before any third
        assert_eq!(backend.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_polls_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(job(JobState::Running))]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .track_until_terminal(Uuid::nil(), &PollPolicy::default(), &token)
            .await
            .unwrap();

        assert_eq!(outcome, TrackOutcome::Cancelled);
        assert_eq!(backend.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_on_completed_job_returns_without_tracking() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(job(JobState::Completed))]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .resume(Uuid::nil(), &PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, TrackOutcome::Terminal(_)));
        assert_eq!(backend.poll_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_reattaches_to_in_flight_job() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(job(JobState::Running)),
            Ok(job(JobState::Running)),
            Ok(job(JobState::Completed)),
        ]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let outcome = tracker
            .resume(Uuid::nil(), &PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, TrackOutcome::Terminal(_)));
        assert_eq!(backend.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_polls_are_idempotent() {
        let mut completed = job(JobState::Completed);
        completed.result = Some(Vec::new());
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(completed)]));
        let tracker = JobTracker::new(Arc::clone(&backend));

        let first = tracker.poll(Uuid::nil()).await.unwrap();
        let second = tracker.poll(Uuid::nil()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.result, Some(Vec::new()));
    }
}
