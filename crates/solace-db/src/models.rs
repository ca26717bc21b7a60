//! Column codecs and row mappers. Every id is stored as hyphenated UUID text
//! and every timestamp as fixed-width RFC 3339 (microseconds, `Z`), so text
//! ordering in SQL equals time ordering.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use solace_types::models::{User, UserSummary};

/// Credentials row used only by the login path.
pub struct CredentialRow {
    pub user: User,
    pub password_hash: String,
}

pub fn encode_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn encode_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

/// Expects `id, email, name, is_professional, created_at` starting at `base`.
pub fn user_at(row: &Row<'_>, base: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, base)?,
        email: row.get(base + 1)?,
        name: row.get(base + 2)?,
        is_professional: row.get(base + 3)?,
        created_at: time_at(row, base + 4)?,
    })
}

/// Expects `id, name, is_professional` starting at `base`. Rows whose author
/// vanished fall back to a placeholder identity.
pub fn summary_at(row: &Row<'_>, base: usize) -> rusqlite::Result<UserSummary> {
    let id = uuid_at(row, base)?;
    let name: Option<String> = row.get(base + 1)?;
    let is_professional: Option<bool> = row.get(base + 2)?;
    Ok(UserSummary {
        id,
        name: name.unwrap_or_else(|| "unknown".to_string()),
        is_professional: is_professional.unwrap_or(false),
    })
}
