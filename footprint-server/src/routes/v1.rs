use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    infra::app_state::AppState,
    people::people_handlers::{
        apply_candidates_handler, create_person_handler, delete_person_handler,
        get_person_handler, list_people_handler, update_person_handler,
    },
    search::search_handlers::{
        get_job_handler, list_jobs_handler, list_platforms_handler, queue_search_handler,
        reconcile_job_handler, resume_job_handler, track_job_handler,
    },
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Search job lifecycle
        .route("/search/queue", post(queue_search_handler))
        .route("/search/queue", get(list_jobs_handler))
        .route("/search/queue/{id}", get(get_job_handler))
        .route("/search/queue/{id}/track", post(track_job_handler))
        .route("/search/queue/{id}/resume", post(resume_job_handler))
        .route("/search/queue/{id}/reconcile", post(reconcile_job_handler))
        // Platform catalog
        .route("/platforms", get(list_platforms_handler))
        // People records
        .route("/people", post(create_person_handler))
        .route("/people", get(list_people_handler))
        .route("/people/{id}", get(get_person_handler))
        .route("/people/{id}", put(update_person_handler))
        .route("/people/{id}", delete(delete_person_handler))
        .route("/people/{id}/accounts/apply", post(apply_candidates_handler))
}
