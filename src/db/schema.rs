use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets page lookups proceed while a webhook or intake is writing.
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        -- One row per customer order. Only status/approved_at change after insert.
        CREATE TABLE IF NOT EXISTS orders (
            token TEXT PRIMARY KEY,
            plan TEXT NOT NULL CHECK (plan IN ('BASIC', 'PREMIUM')),
            names TEXT NOT NULL,
            start_date TEXT NOT NULL,             -- YYYY-MM-DD
            message TEXT,
            photo_urls TEXT NOT NULL,             -- JSON array, upload order
            music_url TEXT,                       -- PREMIUM only
            contact_email TEXT,
            contact_phone TEXT,                   -- digits only
            status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'APPROVED')),
            created_at INTEGER NOT NULL,
            approved_at INTEGER,
            CHECK (contact_email IS NOT NULL OR contact_phone IS NOT NULL)
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status, created_at);
        "#,
    )?;
    Ok(())
}
