use sqlx::PgPool;

use super::repo_types::{Appointment, NewAppointment};

impl Appointment {
    /// Newest slot first. With `doctor_id` set, only that doctor's appointments.
    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        doctor_id: Option<i32>,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT a.id, a.patient_id, a.doctor_id, a.appointment_date, a.status, a.notes,
                   a.diagnosis, a.treatment_plan, a.created_by, a.created_at, a.updated_at,
                   p.first_name || ' ' || p.last_name AS patient_name,
                   u.first_name || ' ' || u.last_name AS doctor_name
            FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            LEFT JOIN users u ON u.id = a.doctor_id
            WHERE $3::int IS NULL OR a.doctor_id = $3
            ORDER BY a.appointment_date DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .bind(doctor_id)
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT a.id, a.patient_id, a.doctor_id, a.appointment_date, a.status, a.notes,
                   a.diagnosis, a.treatment_plan, a.created_by, a.created_at, a.updated_at,
                   p.first_name || ' ' || p.last_name AS patient_name,
                   u.first_name || ' ' || u.last_name AS doctor_name
            FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            LEFT JOIN users u ON u.id = a.doctor_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Inserts with status `scheduled` and returns the new ID.
    pub async fn create(
        db: &PgPool,
        new: &NewAppointment,
        created_by: i32,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, appointment_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.patient_id)
        .bind(new.doctor_id)
        .bind(new.appointment_date)
        .bind(&new.notes)
        .bind(created_by)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(db: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM appointments")
            .fetch_one(db)
            .await
    }
}
