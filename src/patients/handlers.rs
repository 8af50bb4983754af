use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::{
    dto::{CreatePatientRequest, PatientListQuery},
    repo_types::Patient,
};
use crate::{
    auth::{
        claims::Role,
        extractors::{AuthUser, RoleGate},
    },
    error::ApiError,
    state::AppState,
    update::{self, RecordKind},
};

const DELETE_GATE: RoleGate = RoleGate::only(Role::Receptionist);

pub fn patient_routes() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}

#[instrument(skip(state))]
pub async fn list_patients(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let (limit, offset) = query.bounds();
    let pattern = query.search_pattern();
    let patients = Patient::list(&state.db, limit, offset, pattern.as_deref()).await?;
    debug!(user_id = user.id, count = patients.len(), "patients listed");
    Ok(Json(patients))
}

#[instrument(skip(state))]
pub async fn get_patient(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<Patient>, ApiError> {
    let patient = Patient::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("patient"))?;
    Ok(Json(patient))
}

#[instrument(skip(state, body))]
pub async fn create_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let new = body.into_new_patient()?;
    let patient = Patient::create(&state.db, &new, user.id).await?;
    info!(patient_id = patient.id, created_by = user.id, "patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

#[instrument(skip(state, body))]
pub async fn update_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Patient>, ApiError> {
    let pairs = update::json_pairs(RecordKind::Patient, &body)?;
    let stmt = update::build_named(RecordKind::Patient, id, pairs, OffsetDateTime::now_utc())?;
    debug!(sql = %stmt.sql, "applying patient update");

    if stmt.execute(&state.db).await? == 0 {
        return Err(ApiError::NotFound("patient"));
    }
    let patient = Patient::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("patient"))?;

    info!(patient_id = id, updated_by = user.id, columns = ?stmt.columns, "patient updated");
    Ok(Json(patient))
}

#[instrument(skip(state))]
pub async fn delete_patient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    user.require(DELETE_GATE)?;

    if Patient::delete(&state.db, id).await? == 0 {
        return Err(ApiError::NotFound("patient"));
    }
    info!(patient_id = id, deleted_by = user.id, "patient deleted");
    Ok(StatusCode::NO_CONTENT)
}
