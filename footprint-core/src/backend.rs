//! Job backend port.
//!
//! The backend owns job records and is the only writer of job state; the
//! tracker only reads. Once a job reaches a terminal state its
//! `result`/`error_detail` never change on subsequent reads.

use async_trait::async_trait;
use uuid::Uuid;

use footprint_model::{JobState, SearchJob, SearchJobSummary, SubmitRequest};

use crate::error::BackendError;

pub mod memory;

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Create a job and start executing it. Returns the backend-assigned id.
    async fn submit(&self, request: SubmitRequest) -> Result<Uuid, BackendError>;

    /// Single read of the job's current record. Read-only and idempotent;
    /// safe to call concurrently from multiple trackers.
    async fn get_status(&self, job_id: Uuid) -> Result<SearchJob, BackendError>;

    /// Most-recent-first job summaries, optionally filtered by owner record
    /// and state. Never mutates anything.
    async fn list_recent(
        &self,
        owner_record_id: Option<Uuid>,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<SearchJobSummary>, BackendError>;
}
