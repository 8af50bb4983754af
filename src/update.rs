//! Sparse updates: only supplied columns change, column names come from a
//! fixed allow-list per record kind, values travel as bound parameters.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde_json::{Map, Value as JsonValue};
use sqlx::PgPool;
use time::{macros::format_description, Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Patient,
    Appointment,
}

impl RecordKind {
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::Patient => "patients",
            RecordKind::Appointment => "appointments",
        }
    }

    /// Column names a partial update may touch, in allow-list order.
    #[cfg(test)]
    pub fn allowed_columns(self) -> Vec<&'static str> {
        match self {
            RecordKind::Patient => PatientColumn::ALL.iter().map(|c| c.name()).collect(),
            RecordKind::Appointment => AppointmentColumn::ALL.iter().map(|c| c.name()).collect(),
        }
    }

    fn value_kind(self, name: &str) -> Option<ValueKind> {
        match self {
            RecordKind::Patient => PatientColumn::parse(name).map(PatientColumn::value_kind),
            RecordKind::Appointment => AppointmentColumn::parse(name).map(AppointmentColumn::value_kind),
        }
    }
}

/// Type of value a column accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Text,
    Date,
    DateTime,
    Timestamp,
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Int => "an integer",
            ValueKind::Text => "a string",
            ValueKind::Date => "a YYYY-MM-DD date",
            ValueKind::DateTime => "a YYYY-MM-DDTHH:MM date-time",
            ValueKind::Timestamp => "a timestamp",
        }
    }
}

/// An updatable column of one record kind.
pub trait Column: Copy + fmt::Debug + Send + Sync + 'static {
    const KIND: RecordKind;
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn value_kind(self) -> ValueKind;

    /// Text columns that may not be set to a blank string.
    fn required(self) -> bool {
        false
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientColumn {
    FirstName,
    LastName,
    Email,
    Phone,
    DateOfBirth,
    Gender,
    Address,
    MedicalHistory,
    Allergies,
    EmergencyContactName,
    EmergencyContactPhone,
}

impl Column for PatientColumn {
    const KIND: RecordKind = RecordKind::Patient;
    const ALL: &'static [Self] = &[
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Phone,
        Self::DateOfBirth,
        Self::Gender,
        Self::Address,
        Self::MedicalHistory,
        Self::Allergies,
        Self::EmergencyContactName,
        Self::EmergencyContactPhone,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::DateOfBirth => "date_of_birth",
            Self::Gender => "gender",
            Self::Address => "address",
            Self::MedicalHistory => "medical_history",
            Self::Allergies => "allergies",
            Self::EmergencyContactName => "emergency_contact_name",
            Self::EmergencyContactPhone => "emergency_contact_phone",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::DateOfBirth => ValueKind::Date,
            _ => ValueKind::Text,
        }
    }

    fn required(self) -> bool {
        matches!(self, Self::FirstName | Self::LastName)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentColumn {
    DoctorId,
    AppointmentDate,
    Status,
    Notes,
    Diagnosis,
    TreatmentPlan,
}

impl Column for AppointmentColumn {
    const KIND: RecordKind = RecordKind::Appointment;
    const ALL: &'static [Self] = &[
        Self::DoctorId,
        Self::AppointmentDate,
        Self::Status,
        Self::Notes,
        Self::Diagnosis,
        Self::TreatmentPlan,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::DoctorId => "doctor_id",
            Self::AppointmentDate => "appointment_date",
            Self::Status => "status",
            Self::Notes => "notes",
            Self::Diagnosis => "diagnosis",
            Self::TreatmentPlan => "treatment_plan",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::DoctorId => ValueKind::Int,
            Self::AppointmentDate => ValueKind::DateTime,
            _ => ValueKind::Text,
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Text(String),
    Date(Date),
    DateTime(PrimitiveDateTime),
    Timestamp(OffsetDateTime),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Timestamp(_) => ValueKind::Timestamp,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(v: OffsetDateTime) -> Self {
        Value::Timestamp(v)
    }
}

/// Columns a caller actually supplied, ordered by column name.
#[derive(Debug, Clone)]
pub struct ChangeSet<C: Column> {
    values: BTreeMap<&'static str, Value>,
    _kind: PhantomData<C>,
}

impl<C: Column> Default for ChangeSet<C> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            _kind: PhantomData,
        }
    }
}

impl<C: Column> ChangeSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses a value of the wrong type and a blank required text. Required
    /// text is stored trimmed.
    pub fn set(&mut self, column: C, value: impl Into<Value>) -> Result<&mut Self, UpdateError> {
        let value = value.into();
        let expected = column.value_kind();
        if value.kind() != expected {
            return Err(UpdateError::InvalidValue {
                field: column.name().to_string(),
                expected: expected.describe(),
            });
        }

        let value = match value {
            Value::Text(text) if column.required() => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(UpdateError::BlankField(column.name().to_string()));
                }
                Value::Text(trimmed.to_string())
            }
            other => other,
        };

        self.values.insert(column.name(), value);
        Ok(self)
    }

    /// Builds a change set from untrusted column names. Any name outside the
    /// kind's allow-list is refused.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self, UpdateError>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut changes = Self::new();
        for (name, value) in pairs {
            let column = C::parse(name).ok_or_else(|| UpdateError::UnknownField(name.to_string()))?;
            changes.set(column, value)?;
        }
        Ok(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }
}

/// Turns a JSON request body into name/value pairs typed by the kind's
/// columns. `null` and blank date strings mean "leave this column alone".
pub fn json_pairs(
    kind: RecordKind,
    body: &Map<String, JsonValue>,
) -> Result<Vec<(&str, Value)>, UpdateError> {
    let mut pairs = Vec::with_capacity(body.len());
    for (name, raw) in body {
        let expected = kind
            .value_kind(name)
            .ok_or_else(|| UpdateError::UnknownField(name.clone()))?;
        if let Some(value) = json_value(name, expected, raw)? {
            pairs.push((name.as_str(), value));
        }
    }
    Ok(pairs)
}

fn json_value(
    field: &str,
    expected: ValueKind,
    raw: &JsonValue,
) -> Result<Option<Value>, UpdateError> {
    let invalid = || UpdateError::InvalidValue {
        field: field.to_string(),
        expected: expected.describe(),
    };

    if raw.is_null() {
        return Ok(None);
    }

    let value = match expected {
        ValueKind::Int => raw
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Value::Int)
            .ok_or_else(invalid)?,
        ValueKind::Text => Value::Text(raw.as_str().ok_or_else(invalid)?.to_string()),
        ValueKind::Date => {
            let s = raw.as_str().ok_or_else(invalid)?;
            if s.is_empty() {
                return Ok(None);
            }
            Date::parse(s, format_description!("[year]-[month]-[day]"))
                .map(Value::Date)
                .map_err(|_| invalid())?
        }
        ValueKind::DateTime => {
            let s = raw.as_str().ok_or_else(invalid)?;
            if s.is_empty() {
                return Ok(None);
            }
            PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
                .map(Value::DateTime)
                .map_err(|_| invalid())?
        }
        ValueKind::Timestamp => return Err(invalid()),
    };
    Ok(Some(value))
}

/// Parameterized `UPDATE` ready for the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Every column the statement assigns, `updated_at` last.
    pub columns: Vec<&'static str>,
}

impl Statement {
    /// Runs as a single statement; returns rows affected.
    pub async fn execute(&self, db: &PgPool) -> Result<u64, sqlx::Error> {
        let mut query = sqlx::query(&self.sql);
        for param in &self.params {
            query = match param {
                Value::Int(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.as_str()),
                Value::Date(v) => query.bind(*v),
                Value::DateTime(v) => query.bind(*v),
                Value::Timestamp(v) => query.bind(*v),
            };
        }
        let result = query.execute(db).await?;
        Ok(result.rows_affected())
    }
}

/// `UPDATE <table> SET c1 = $1, .., updated_at = $n WHERE id = $n+1`.
pub fn build<C: Column>(
    id: i32,
    changes: &ChangeSet<C>,
    now: OffsetDateTime,
) -> Result<Statement, UpdateError> {
    if changes.is_empty() {
        return Err(UpdateError::EmptyChangeSet);
    }

    let mut assignments = Vec::with_capacity(changes.len() + 1);
    let mut params = Vec::with_capacity(changes.len() + 2);
    let mut columns = Vec::with_capacity(changes.len() + 1);

    for (column, value) in &changes.values {
        params.push(value.clone());
        assignments.push(format!("{} = ${}", column, params.len()));
        columns.push(*column);
    }

    params.push(Value::Timestamp(now));
    assignments.push(format!("updated_at = ${}", params.len()));
    columns.push("updated_at");

    params.push(Value::Int(id));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ${}",
        C::KIND.table(),
        assignments.join(", "),
        params.len()
    );

    Ok(Statement {
        sql,
        params,
        columns,
    })
}

/// Kind-dispatched entry point for name/value pairs.
pub fn build_named<'a, I>(
    kind: RecordKind,
    id: i32,
    pairs: I,
    now: OffsetDateTime,
) -> Result<Statement, UpdateError>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    match kind {
        RecordKind::Patient => build(id, &ChangeSet::<PatientColumn>::from_named(pairs)?, now),
        RecordKind::Appointment => {
            build(id, &ChangeSet::<AppointmentColumn>::from_named(pairs)?, now)
        }
    }
}
