//! Footprint engine: launches long-running username-enumeration searches
//! through an abstract job backend, tracks them across a store-and-poll
//! boundary, and reconciles completed results against a person's known
//! accounts.

pub mod backend;
pub mod enumerate;
pub mod error;
pub mod normalize;
pub mod platforms;
pub mod reconcile;
pub mod tracker;

pub use backend::{memory::InMemoryJobBackend, JobBackend};
pub use enumerate::{findings_from_json, CommandEnumerator, UsernameEnumerator};
pub use error::{BackendError, TrackError};
pub use normalize::normalize_platform_key;
pub use platforms::{PlatformInfo, PlatformListItem, PlatformTable, PlatformTableError};
pub use reconcile::reconcile;
pub use tracker::{JobTracker, PollPolicy, TrackOutcome};
