//! Search-job types: one job per invocation of the external
//! username-enumeration search, tracked by an opaque identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a search job.
///
/// `Pending -> Running -> {Completed | Failed}`. A backend may move a job
/// straight from `Pending` to a terminal state between two observations.
/// `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    /// A terminal job never transitions again; its result/error are frozen.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Verdict the enumeration producer reached for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// The username is registered on this platform.
    Claimed,
    /// The username is not registered there.
    NotFound,
    /// The producer could not decide (timeouts, blocks, odd responses).
    #[serde(other)]
    Unknown,
}

/// One entry of a completed job's result set, as reported by the producer.
///
/// `platform_label` is the producer's raw label, not a canonical key;
/// normalization happens at reconciliation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFinding {
    pub platform_label: String,
    pub status: FindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_url: Option<String>,
    /// Handle observed at the claimed URL; when absent, the job's subject
    /// query is the handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_handle: Option<String>,
}

impl PlatformFinding {
    /// Only claimed findings with a usable URL can become candidates.
    pub fn is_claimed(&self) -> bool {
        self.status == FindingStatus::Claimed
            && self
                .claimed_url
                .as_deref()
                .is_some_and(|u| !u.trim().is_empty())
    }
}

/// A tracked enumeration search.
///
/// Created at submission and mutated only by the job backend; trackers read
/// it and never write. Terminal jobs keep their `result`/`error_detail`
/// forever, so re-reads are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchJob {
    pub id: Uuid,
    pub subject_query: String,
    /// Weak back-reference to the person the search was run for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_record_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_filter: Option<Vec<String>>,
    pub timeout_secs: u32,
    pub state: JobState,
    /// Present only when `state == Completed`. Findings keep the producer's
    /// first-appearance order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<PlatformFinding>>,
    /// Present only when `state == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SearchJob {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Condensed view for job listings.
    pub fn summary(&self) -> SearchJobSummary {
        SearchJobSummary {
            id: self.id,
            subject_query: self.subject_query.clone(),
            owner_record_id: self.owner_record_id,
            state: self.state,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Lightweight job row for most-recent-first listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchJobSummary {
    pub id: Uuid,
    pub subject_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_record_id: Option<Uuid>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters accepted when submitting a new search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub subject_query: String,
    #[serde(default)]
    pub owner_record_id: Option<Uuid>,
    /// Restrict the search to these platform labels (producer-side names).
    #[serde(default)]
    pub site_filter: Option<Vec<String>>,
    /// Per-site probe timeout hint forwarded to the producer.
    #[serde(default)]
    pub timeout_secs: Option<u32>,
}

impl SubmitRequest {
    pub const DEFAULT_TIMEOUT_SECS: u32 = 60;

    pub fn new(subject_query: impl Into<String>) -> Self {
        Self {
            subject_query: subject_query.into(),
            owner_record_id: None,
            site_filter: None,
            timeout_secs: None,
        }
    }

    pub fn effective_timeout_secs(&self) -> u32 {
        self.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS)
    }
}
