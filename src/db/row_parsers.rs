use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{project::DbProject, user::DbUser};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (what sqlx writes for chrono values)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS" with optional fraction
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid {s:?}: {e}")))
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, AppError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    Ok(DbUser {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        role: column(row, "role")?,
        created_at: parse_datetime(&column::<String>(row, "created_at")?)?,
        updated_at: parse_datetime(&column::<String>(row, "updated_at")?)?,
        deleted_at: parse_opt_datetime(column(row, "deleted_at")?)?,
    })
}

pub fn db_project_from_row(row: &SqliteRow) -> Result<DbProject, AppError> {
    Ok(DbProject {
        id: parse_uuid(&column::<String>(row, "id")?)?,
        owner_id: parse_uuid(&column::<String>(row, "owner_id")?)?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        theme_color: column(row, "theme_color")?,
        created_at: parse_datetime(&column::<String>(row, "created_at")?)?,
        updated_at: parse_datetime(&column::<String>(row, "updated_at")?)?,
        deleted_at: parse_opt_datetime(column(row, "deleted_at")?)?,
    })
}
