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
    dto::{CreateAppointmentRequest, Pagination},
    repo_types::Appointment,
};
use crate::{
    auth::{
        claims::Role,
        extractors::{AuthUser, RoleGate},
    },
    error::ApiError,
    patients::repo_types::Patient,
    state::AppState,
    update::{self, RecordKind},
};

const DELETE_GATE: RoleGate = RoleGate::only(Role::Receptionist);

pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
}

/// Doctors only see their own schedule.
#[instrument(skip(state))]
pub async fn list_appointments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let (limit, offset) = p.bounds();
    let doctor_filter = (user.role == Role::Doctor).then_some(user.id);
    let appointments = Appointment::list(&state.db, limit, offset, doctor_filter).await?;
    Ok(Json(appointments))
}

#[instrument(skip(state))]
pub async fn get_appointment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("appointment"))?;
    Ok(Json(appointment))
}

#[instrument(skip(state, body))]
pub async fn create_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let new = body.into_new_appointment()?;

    if Patient::find_by_id(&state.db, new.patient_id).await?.is_none() {
        return Err(ApiError::NotFound("patient"));
    }

    let id = Appointment::create(&state.db, &new, user.id).await?;
    let appointment = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("appointment"))?;

    info!(appointment_id = id, patient_id = new.patient_id, created_by = user.id, "appointment created");
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[instrument(skip(state, body))]
pub async fn update_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Appointment>, ApiError> {
    let pairs = update::json_pairs(RecordKind::Appointment, &body)?;
    let stmt = update::build_named(RecordKind::Appointment, id, pairs, OffsetDateTime::now_utc())?;
    debug!(sql = %stmt.sql, "applying appointment update");

    if stmt.execute(&state.db).await? == 0 {
        return Err(ApiError::NotFound("appointment"));
    }
    let appointment = Appointment::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("appointment"))?;

    info!(appointment_id = id, updated_by = user.id, columns = ?stmt.columns, "appointment updated");
    Ok(Json(appointment))
}

#[instrument(skip(state))]
pub async fn delete_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    user.require(DELETE_GATE)?;

    if Appointment::delete(&state.db, id).await? == 0 {
        return Err(ApiError::NotFound("appointment"));
    }
    info!(appointment_id = id, deleted_by = user.id, "appointment deleted");
    Ok(StatusCode::NO_CONTENT)
}
