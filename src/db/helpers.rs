use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use color_eyre::{eyre::OptionExt, Result};
use libsql::params::IntoParams;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use crate::models::ShownImages;

/// SQLite's own `datetime('now')` layout, so stored values compare as text.
pub const SQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SQL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fetch all rows and deserialize each into `T` via `libsql::de::from_row`.
pub async fn query_all<T: DeserializeOwned>(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<T>> {
    let mut rows = conn.query(sql, params).await?;
    let mut results = Vec::new();
    while let Some(row) = rows.next().await? {
        results.push(libsql::de::from_row::<T>(&row)?);
    }
    Ok(results)
}

/// Fetch the first row and deserialize into `T`, or return `None` if no rows.
pub async fn query_optional<T: DeserializeOwned>(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Option<T>> {
    match conn.query(sql, params).await?.next().await? {
        Some(row) => Ok(Some(libsql::de::from_row::<T>(&row)?)),
        None => Ok(None),
    }
}

/// Fetch a single integer column, e.g. `COUNT(*)` or `RETURNING id`.
pub async fn query_i64(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<i64> {
    let value = conn
        .query(sql, params)
        .await?
        .next()
        .await?
        .ok_or_eyre("expected a scalar row but got none")?
        .get::<i64>(0)?;
    Ok(value)
}

// Column adapters for `#[serde(deserialize_with = ...)]` on row structs.

/// TEXT column holding a value with a `FromStr` impl (enums, dates).
pub fn from_text<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(D::Error::custom)
}

pub fn from_optional_text<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| text.parse().map_err(D::Error::custom))
        .transpose()
}

pub fn sql_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_time(&text).map_err(D::Error::custom)
}

pub fn optional_sql_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| parse_time(&text).map_err(D::Error::custom))
        .transpose()
}

/// Comma-joined id list.
pub fn shown_images<'de, D>(deserializer: D) -> std::result::Result<ShownImages, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(ShownImages::parse(&String::deserialize(deserializer)?))
}

pub fn optional_shown_images<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ShownImages>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(|joined| ShownImages::parse(&joined)))
}

/// Comma-joined integers that must all parse, e.g. chest values.
pub fn comma_integers<'de, D>(deserializer: D) -> std::result::Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .split(',')
        .map(|v| v.trim().parse::<i64>().map_err(D::Error::custom))
        .collect()
}

/// Dates stored as `YYYY-MM-DD`, nullable.
pub fn optional_sql_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| NaiveDate::parse_from_str(&text, SQL_DATE_FORMAT).map_err(D::Error::custom))
        .transpose()
}

pub fn parse_time(text: &str) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(text, SQL_TIME_FORMAT)?)
}

pub fn sql_time(at: NaiveDateTime) -> String {
    at.format(SQL_TIME_FORMAT).to_string()
}

pub fn bool_value(value: bool) -> i64 {
    i64::from(value)
}

pub fn optional_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(text) => libsql::Value::Text(text.to_string()),
        None => libsql::Value::Null,
    }
}

pub fn optional_integer(value: Option<i64>) -> libsql::Value {
    match value {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error as ValueError, StrDeserializer};
    use serde::de::IntoDeserializer;

    #[test]
    fn sql_time_matches_sqlite_layout() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        assert_eq!(sql_time(at), "2024-03-09 08:05:00");
        assert_eq!(parse_time("2024-03-09 08:05:00").unwrap(), at);
    }

    #[test]
    fn comma_integers_rejects_garbage() {
        let ok: StrDeserializer<ValueError> = "1,10, 25,50".into_deserializer();
        assert_eq!(comma_integers(ok).unwrap(), vec![1, 10, 25, 50]);

        let bad: StrDeserializer<ValueError> = "1,ten".into_deserializer();
        assert!(comma_integers(bad).is_err());
    }

    #[test]
    fn text_columns_parse_through_from_str() {
        let hard: StrDeserializer<ValueError> = "hard".into_deserializer();
        assert_eq!(from_text::<_, crate::models::Difficulty>(hard).unwrap(), crate::models::Difficulty::Hard);

        let nonsense: StrDeserializer<ValueError> = "legendary".into_deserializer();
        assert!(from_text::<_, crate::models::Difficulty>(nonsense).is_err());
    }
}
