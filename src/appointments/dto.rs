use serde::Deserialize;
use time::{macros::format_description, PrimitiveDateTime};

use super::repo_types::NewAppointment;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    10
}

impl Pagination {
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}

/// `YYYY-MM-DDTHH:MM`, as sent by a datetime-local input.
fn parse_slot(raw: &str) -> Result<PrimitiveDateTime, ApiError> {
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .map_err(|_| ApiError::BadRequest("appointment_date must be YYYY-MM-DDTHH:MM".into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: i32,
    pub doctor_id: Option<i32>,
    pub appointment_date: String,
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn into_new_appointment(self) -> Result<NewAppointment, ApiError> {
        Ok(NewAppointment {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_date: parse_slot(&self.appointment_date)?,
            notes: self.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn create_parses_the_slot() {
        let body = r#"{"patient_id":3,"appointment_date":"2024-06-01T09:30","notes":"follow-up"}"#;
        let req: CreateAppointmentRequest = serde_json::from_str(body).unwrap();
        let new = req.into_new_appointment().unwrap();
        assert_eq!(new.appointment_date, datetime!(2024-06-01 09:30));
        assert_eq!(new.doctor_id, None);
        assert_eq!(new.notes.as_deref(), Some("follow-up"));
    }

    #[test]
    fn create_rejects_bad_date() {
        for raw in ["tomorrow", "2024-06-01", "2024-06-01 09:30", ""] {
            let req = CreateAppointmentRequest {
                patient_id: 1,
                doctor_id: None,
                appointment_date: raw.into(),
                notes: None,
            };
            assert!(req.into_new_appointment().is_err(), "{raw}");
        }
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.bounds(), (10, 0));
        let p: Pagination = serde_json::from_str(r#"{"limit":0,"offset":-1}"#).unwrap();
        assert_eq!(p.bounds(), (1, 0));
    }
}
