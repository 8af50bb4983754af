use sqlx::PgPool;

use super::repo_types::{NewPatient, Patient};

impl Patient {
    /// Newest first. `pattern` is an escaped `ILIKE` pattern tried against
    /// names, email and phone.
    pub async fn list(
        db: &PgPool,
        limit: i64,
        offset: i64,
        pattern: Option<&str>,
    ) -> Result<Vec<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, phone, date_of_birth, gender, address,
                   medical_history, allergies, emergency_contact_name, emergency_contact_phone,
                   created_by, created_at, updated_at
            FROM patients
            WHERE $3::text IS NULL
               OR first_name ILIKE $3 ESCAPE '\'
               OR last_name ILIKE $3 ESCAPE '\'
               OR email ILIKE $3 ESCAPE '\'
               OR phone ILIKE $3 ESCAPE '\'
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .bind(pattern)
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, first_name, last_name, email, phone, date_of_birth, gender, address,
                   medical_history, allergies, emergency_contact_name, emergency_contact_phone,
                   created_by, created_at, updated_at
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        new: &NewPatient,
        created_by: i32,
    ) -> Result<Patient, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (first_name, last_name, email, phone, date_of_birth, gender,
                                  address, medical_history, allergies, emergency_contact_name,
                                  emergency_contact_phone, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, first_name, last_name, email, phone, date_of_birth, gender, address,
                      medical_history, allergies, emergency_contact_name, emergency_contact_phone,
                      created_by, created_at, updated_at
            "#,
        )
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.date_of_birth)
        .bind(&new.gender)
        .bind(&new.address)
        .bind(&new.medical_history)
        .bind(&new.allergies)
        .bind(&new.emergency_contact_name)
        .bind(&new.emergency_contact_phone)
        .bind(created_by)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(db: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients")
            .fetch_one(db)
            .await
    }
}
