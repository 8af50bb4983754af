use serde::Serialize;
use sqlx::FromRow;
use time::{OffsetDateTime, PrimitiveDateTime};

time::serde::format_description!(slot_time, PrimitiveDateTime, "[year]-[month]-[day]T[hour]:[minute]");

/// Appointment joined with the display names of its patient and doctor.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    #[serde(with = "slot_time")]
    pub appointment_date: PrimitiveDateTime,
    pub status: String,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    pub created_by: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_date: PrimitiveDateTime,
    pub notes: Option<String>,
}
