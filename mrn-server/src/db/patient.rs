//! PostgreSQL patient store
//!
//! Expected schema (read-only):
//!
//! ```sql
//! CREATE TABLE patients (
//!     id            UUID PRIMARY KEY,
//!     medical_id    TEXT,
//!     name          JSONB,
//!     contact       JSONB,
//!     address       JSONB,
//!     photo         TEXT,
//!     date_of_birth DATE,
//!     gender        TEXT,
//!     hospital      TEXT,
//!     updated_at    TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX patients_medical_id_idx ON patients (upper(medical_id));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use mrn_core::{MedicalIdentifier, PatientStore, StoreError, StoredPatient};

use crate::config::Config;

const PATIENT_COLUMNS: &str = "id, medical_id, name, contact, address, photo, date_of_birth, \
                               gender, hospital, updated_at";

/// Open a connection pool sized from the server configuration.
pub async fn connect(config: &Config, database_url: &str) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .connect(database_url)
        .await
        .map_err(store_error)
}

/// Row type for database queries.
#[derive(FromRow)]
struct PatientRow {
    id: Uuid,
    medical_id: Option<String>,
    name: Option<Value>,
    contact: Option<Value>,
    address: Option<Value>,
    photo: Option<String>,
    date_of_birth: Option<NaiveDate>,
    gender: Option<String>,
    hospital: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for StoredPatient {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            medical_id: row.medical_id,
            name: row.name.unwrap_or(Value::Null),
            contact: row.contact.unwrap_or(Value::Null),
            address: row.address.unwrap_or(Value::Null),
            photo: row.photo,
            date_of_birth: row.date_of_birth,
            gender: row.gender,
            hospital: row.hospital,
            updated_at: row.updated_at,
        }
    }
}

/// [`PatientStore`] over the `patients` table.
#[derive(Clone)]
pub struct PostgresPatientStore {
    pool: PgPool,
}

impl PostgresPatientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PatientStore for PostgresPatientStore {
    #[instrument(level = "debug", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredPatient>, StoreError> {
        let query = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1");
        let row = sqlx::query_as::<_, PatientRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip(self), fields(medical_id = %medical_id))]
    async fn find_by_medical_id(
        &self,
        medical_id: &MedicalIdentifier,
    ) -> Result<Option<StoredPatient>, StoreError> {
        let query = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE upper(medical_id) = $1 \
             ORDER BY updated_at DESC, id \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, PatientRow>(&query)
            .bind(medical_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Into::into))
    }

    #[instrument(level = "debug", skip_all)]
    async fn find_by_contact(&self, needle: &str) -> Result<Vec<StoredPatient>, StoreError> {
        let query = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients \
             WHERE contact::text ILIKE $1 ESCAPE '\\'"
        );
        let rows = sqlx::query_as::<_, PatientRow>(&query)
            .bind(contains_pattern(needle))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(level = "debug", skip(self, text))]
    async fn search_text(&self, text: &str, limit: usize) -> Result<Vec<StoredPatient>, StoreError> {
        let tokens = search_tokens(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let query = search_sql(tokens.len());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut rows = sqlx::query_as::<_, PatientRow>(&query);
        for token in &tokens {
            rows = rows.bind(contains_pattern(token));
        }
        let rows = rows
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}

/// String leaves of the name document, without its keys.
const NAME_VALUES: &str =
    "jsonb_path_query_array(coalesce(name, 'null'::jsonb), '$.** ? (@.type() == \"string\")')::text";

/// Whitespace-separated search words.
fn search_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Every token must appear in a name value or the medical identifier.
/// Tokens bind to `$1..$n`, the limit to `$n+1`.
fn search_sql(token_count: usize) -> String {
    let conditions: Vec<String> = (1..=token_count)
        .map(|i| {
            format!("({NAME_VALUES} ILIKE ${i} ESCAPE '\\' OR medical_id ILIKE ${i} ESCAPE '\\')")
        })
        .collect();
    format!(
        "SELECT {PATIENT_COLUMNS} FROM patients \
         WHERE {} \
         ORDER BY updated_at DESC, id \
         LIMIT ${}",
        conditions.join(" AND "),
        token_count + 1
    )
}

/// `%needle%` with LIKE metacharacters escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Connection-level failures are retryable; everything else is permanent.
fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("john"), "%john%");
        assert_eq!(contains_pattern("a_b%c"), "%a\\_b\\%c%");
        assert_eq!(contains_pattern("x\\y"), "%x\\\\y%");
    }

    #[test]
    fn test_search_sql_matches_each_word_against_name_values() {
        assert_eq!(search_tokens("  john   doe "), ["john", "doe"]);

        let sql = search_sql(2);
        assert!(sql.contains("jsonb_path_query_array"));
        assert!(sql.contains("ILIKE $1 ESCAPE"));
        assert!(sql.contains(") AND ("));
        assert!(sql.contains("ILIKE $2 ESCAPE"));
        assert!(sql.ends_with("LIMIT $3"));
        assert!(!sql.contains("name::text"));
    }

    #[test]
    fn test_search_sql_single_word() {
        let sql = search_sql(1);
        assert!(sql.contains("medical_id ILIKE $1"));
        assert!(!sql.contains("$2 ESCAPE"));
        assert!(sql.ends_with("LIMIT $2"));
    }

    #[test]
    fn test_connection_errors_are_transient() {
        assert!(matches!(
            store_error(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            store_error(sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
    }

    #[test]
    fn test_row_with_null_json_columns() {
        let row = PatientRow {
            id: Uuid::nil(),
            medical_id: Some("AB12C".into()),
            name: None,
            contact: None,
            address: None,
            photo: None,
            date_of_birth: None,
            gender: None,
            hospital: None,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let stored = StoredPatient::from(row);
        assert_eq!(stored.name, Value::Null);
        assert_eq!(stored.medical_id.as_deref(), Some("AB12C"));
    }
}
