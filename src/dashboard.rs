use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    appointments::repo_types::Appointment, auth::extractors::AuthUser, error::ApiError,
    patients::repo_types::Patient, state::AppState,
};

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_appointments: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let (total_patients, total_appointments) =
        tokio::try_join!(Patient::count(&state.db), Appointment::count(&state.db))?;
    Ok(Json(DashboardStats {
        total_patients,
        total_appointments,
    }))
}
