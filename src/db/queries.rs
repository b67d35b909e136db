use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::models::*;

use super::from_row::{ORDER_COLS, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Orders ============

/// Insert a new order with status PENDING.
///
/// The token is the primary key, so a collision fails the insert instead of
/// overwriting an existing page.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let now = now();
    let photo_urls = serde_json::to_string(&input.photo_urls)?;

    conn.execute(
        "INSERT INTO orders (token, plan, names, start_date, message, photo_urls, music_url,
                             contact_email, contact_phone, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &input.token,
            input.plan.as_ref(),
            &input.names,
            input.start_date.format("%Y-%m-%d").to_string(),
            &input.message,
            photo_urls,
            &input.music_url,
            &input.contact.email,
            &input.contact.phone,
            OrderStatus::Pending.as_ref(),
            now,
        ],
    )?;

    Ok(Order {
        token: input.token.clone(),
        plan: input.plan,
        names: input.names.clone(),
        start_date: input.start_date,
        message: input.message.clone(),
        photo_urls: input.photo_urls.clone(),
        music_url: input.music_url.clone(),
        contact: input.contact.clone(),
        status: OrderStatus::Pending,
        created_at: now,
        approved_at: None,
    })
}

pub fn get_order(conn: &Connection, token: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE token = ?1", ORDER_COLS),
        &[&token],
    )
}

/// Atomically move an order from PENDING to APPROVED.
///
/// Returns:
/// - `Ok(true)` if this call performed the transition
/// - `Ok(false)` if the order is already APPROVED or does not exist
///
/// Concurrent duplicate deliveries race on this single UPDATE; SQLite
/// serializes them so exactly one sees an affected row.
pub fn try_approve_order(conn: &Connection, token: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, approved_at = ?2 WHERE token = ?3 AND status = ?4",
        params![
            OrderStatus::Approved.as_ref(),
            now(),
            token,
            OrderStatus::Pending.as_ref()
        ],
    )?;
    Ok(affected > 0)
}

pub fn count_orders(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
    Ok(count)
}
