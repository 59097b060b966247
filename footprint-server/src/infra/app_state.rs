use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use footprint_core::{JobTracker, PlatformTable};

use crate::infra::config::Config;
use crate::people::person_store::PgPersonStore;
use crate::search::job_store::PgJobBackend;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub tracker: Arc<JobTracker<PgJobBackend>>,
    pub people: Arc<PgPersonStore>,
    pub platforms: Arc<PlatformTable>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        pool: PgPool,
        backend: Arc<PgJobBackend>,
        platforms: Arc<PlatformTable>,
    ) -> Self {
        Self {
            config,
            people: Arc::new(PgPersonStore::new(pool.clone())),
            tracker: Arc::new(JobTracker::new(backend)),
            pool,
            platforms,
        }
    }
}
