//! Person CRUD endpoints plus candidate application.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use footprint_model::{ApiResponse, Candidate, Person, PersonCreate, PersonUpdate};

use crate::errors::AppResult;
use crate::infra::app_state::AppState;
use crate::people::person_store::ApplyReport;

pub async fn create_person_handler(
    State(state): State<AppState>,
    Json(create): Json<PersonCreate>,
) -> AppResult<Json<ApiResponse<Person>>> {
    let person = state.people.create(create).await?;
    Ok(Json(ApiResponse::success(person)))
}

#[derive(Debug, Deserialize)]
pub struct ListPeopleQuery {
    pub limit: Option<usize>,
}

pub async fn list_people_handler(
    State(state): State<AppState>,
    Query(query): Query<ListPeopleQuery>,
) -> AppResult<Json<ApiResponse<Vec<Person>>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let people = state.people.list(limit).await?;
    Ok(Json(ApiResponse::success(people)))
}

pub async fn get_person_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Person>>> {
    let person = state.people.get(id).await?;
    Ok(Json(ApiResponse::success(person)))
}

pub async fn update_person_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<PersonUpdate>,
) -> AppResult<Json<ApiResponse<Person>>> {
    let person = state.people.update(id, update).await?;
    Ok(Json(ApiResponse::success(person)))
}

pub async fn delete_person_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.people.delete(id).await?;
    Ok(Json(ApiResponse::success(())))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub person: Person,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Write accepted candidates into the person's account registry. Skipped
/// keys mean the caller's reconciliation snapshot was stale; it should
/// re-reconcile before retrying.
pub async fn apply_candidates_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyRequest>,
) -> AppResult<Json<ApiResponse<ApplyResponse>>> {
    let (person, ApplyReport { applied, skipped }) =
        state.people.apply_candidates(id, &request.candidates).await?;

    Ok(Json(ApiResponse::success(ApplyResponse {
        person,
        applied,
        skipped,
    })))
}
