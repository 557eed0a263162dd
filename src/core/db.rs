use std::fs;
use std::path::Path;

use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

/// Opens the database at `db_path`, creating the parent directory and
/// any missing tables.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;

    Ok(db)
}

/// Creates every table the app needs. Safe to run repeatedly.
pub fn initialize_db(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS daily_record (
            data_type TEXT NOT NULL,
            day TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (data_type, day)
        );

        CREATE TABLE IF NOT EXISTS cache_watermark (
            data_type TEXT PRIMARY KEY,
            is_available INTEGER NOT NULL DEFAULT 0,
            earliest_cached_day TEXT
        );

        CREATE TABLE IF NOT EXISTS session (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chat_message (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES session(id),
            data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_message_session
        ON chat_message(session_id);
        "#,
    )
}
