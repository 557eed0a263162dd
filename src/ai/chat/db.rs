use serde_json::json;
use tokio_rusqlite::Connection;

use crate::core::Result;
use crate::openai::Message;

pub async fn insert_chat_message(
    db: &Connection,
    session_id: &str,
    msg: &Message,
) -> Result<usize> {
    let s_id = session_id.to_owned();
    let data = json!(msg).to_string();
    let result = db
        .call(move |conn| {
            let mut stmt =
                conn.prepare("INSERT INTO chat_message (session_id, data) VALUES (?, ?)")?;
            let result = stmt.execute([s_id, data])?;
            Ok(result)
        })
        .await?;

    Ok(result)
}

pub async fn get_or_create_session(db: &Connection, session_id: &str) -> Result<()> {
    let s_id = session_id.to_owned();
    db.call(move |conn| {
        conn.execute("INSERT OR IGNORE INTO session (id) VALUES (?)", [s_id])?;
        Ok(())
    })
    .await?;

    Ok(())
}

/// Messages for `session_id` in the order they were written.
pub async fn find_chat_session_by_id(db: &Connection, session_id: &str) -> Result<Vec<Message>> {
    let s_id = session_id.to_owned();
    let history = db
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT data FROM chat_message WHERE session_id = ? ORDER BY id")?;
            let rows = stmt
                .query_map([s_id], |row| {
                    let val: String = row.get(0)?;
                    serde_json::from_str::<Message>(&val).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })
                })?
                .collect::<rusqlite::Result<Vec<Message>>>()?;
            Ok(rows)
        })
        .await?;

    Ok(history)
}
