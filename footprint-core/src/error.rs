use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by a job backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transient: the backend could not be reached or could not accept the
    /// request right now. Retried by the tracker within its poll budget.
    #[error("job backend unavailable: {0}")]
    Unavailable(String),

    /// Permanent for this id: the backend has no record of the job.
    #[error("job not found: {0}")]
    NotFound(Uuid),
}

/// Errors surfaced by the tracker. Timeout and cancellation are not errors;
/// they are [`crate::tracker::TrackOutcome`] variants, since the job may
/// still complete and remains resumable.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("job backend unavailable after {attempts} attempt(s): {detail}")]
    BackendUnavailable { attempts: u32, detail: String },

    #[error("job not found: {0}")]
    JobNotFound(Uuid),
}

impl TrackError {
    pub(crate) fn from_backend(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(detail) => TrackError::BackendUnavailable {
                attempts: 1,
                detail,
            },
            BackendError::NotFound(id) => TrackError::JobNotFound(id),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
