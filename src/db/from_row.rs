//! Row mapping for the `orders` table.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// A corrupt value surfaces as a query error instead of a panic.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

pub const ORDER_COLS: &str = "token, plan, names, start_date, message, photo_urls, music_url, contact_email, contact_phone, status, created_at, approved_at";

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let start_date: String = row.get(3)?;
        let start_date = start_date.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "start_date".into(), rusqlite::types::Type::Text)
        })?;
        let photo_urls: String = row.get(5)?;
        let photo_urls = serde_json::from_str(&photo_urls).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Order {
            token: row.get(0)?,
            plan: parse_enum(row, 1, "plan")?,
            names: row.get(2)?,
            start_date,
            message: row.get(4)?,
            photo_urls,
            music_url: row.get(6)?,
            contact: Contact {
                email: row.get(7)?,
                phone: row.get(8)?,
            },
            status: parse_enum(row, 9, "status")?,
            created_at: row.get(10)?,
            approved_at: row.get(11)?,
        })
    }
}
