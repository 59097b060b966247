pub mod v1;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::infra::app_state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", v1::create_v1_router())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
