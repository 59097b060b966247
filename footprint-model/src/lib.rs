//! Core data model definitions shared across Footprint crates.

pub mod accounts;
pub mod api;
pub mod jobs;
pub mod people;

// Intentionally curated re-exports for downstream consumers.
pub use accounts::{
    AccountEntry, AccountRecord, AccountStatus, Candidate, ReconciliationOutcome,
    ReconciliationReport, ReconciliationSummary,
};
pub use api::ApiResponse;
pub use jobs::{
    FindingStatus, JobState, PlatformFinding, SearchJob, SearchJobSummary, SubmitRequest,
};
pub use people::{Person, PersonCreate, PersonUpdate};
