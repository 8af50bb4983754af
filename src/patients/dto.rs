use serde::Deserialize;
use time::{macros::format_description, Date};

use super::repo_types::NewPatient;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct PatientListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub q: Option<String>,
}
fn default_limit() -> i64 {
    10
}

impl PatientListQuery {
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }

    /// `ILIKE` pattern for `q`. `%`, `_` and `\` in the term match literally.
    pub fn search_pattern(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|term| format!("%{}%", escape_like(term)))
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::BadRequest("date_of_birth must be YYYY-MM-DD".into()))
}

/// Empty strings count as "not supplied".
fn parse_optional_date(raw: Option<&str>) -> Result<Option<Date>, ApiError> {
    match raw {
        Some(s) if !s.is_empty() => parse_date(s).map(Some),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

impl CreatePatientRequest {
    pub fn into_new_patient(self) -> Result<NewPatient, ApiError> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ApiError::BadRequest("first_name and last_name are required".into()));
        }
        Ok(NewPatient {
            first_name,
            last_name,
            email: self.email,
            phone: self.phone,
            date_of_birth: parse_optional_date(self.date_of_birth.as_deref())?,
            gender: self.gender,
            address: self.address,
            medical_history: self.medical_history,
            allergies: self.allergies,
            emergency_contact_name: self.emergency_contact_name,
            emergency_contact_phone: self.emergency_contact_phone,
        })
    }
}
