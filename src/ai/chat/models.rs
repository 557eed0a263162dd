//! The conversation state carried between turns with the LLM.
use tokio_rusqlite::Connection;
use uuid::Uuid;

use super::db::{find_chat_session_by_id, get_or_create_session, insert_chat_message};
use crate::core::Result;
use crate::openai::{Message, Role};

/// Running history of completed user/assistant exchanges.
///
/// Every request sends the system message followed by one user
/// message holding the whole history as `User: ...` and
/// `Assistant: ...` lines plus the new message. Only exchanges passed
/// to `record` become part of the history, so intermediate calls such
/// as query planning leave no trace.
pub struct Conversation {
    system_message: String,
    transcript: Vec<Message>,
    db: Option<Connection>,
    pub session_id: Option<String>,
}

impl Conversation {
    pub fn new(system_message: &str) -> Self {
        Self {
            system_message: system_message.to_string(),
            transcript: Vec::new(),
            db: None,
            session_id: None,
        }
    }

    /// Persist every recorded exchange under `session_id`, or a new
    /// session if none is given. Earlier messages in the session are
    /// loaded into the transcript.
    pub async fn with_database(
        mut self,
        db: &Connection,
        session_id: Option<&str>,
    ) -> Result<Self> {
        let session_id = session_id
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.transcript = find_chat_session_by_id(db, &session_id).await?;
        self.session_id = Some(session_id);
        self.db = Some(db.clone());
        Ok(self)
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    fn line(msg: &Message) -> String {
        match msg.role {
            Role::User => format!("User: {}", msg.content),
            Role::Assistant => format!("Assistant: {}", msg.content),
            Role::System => msg.content.clone(),
        }
    }

    /// The messages to send for `message` given the history so far.
    pub fn request(&self, message: &str) -> Vec<Message> {
        let mut lines = self.transcript.iter().map(Self::line).collect::<Vec<String>>();
        lines.push(format!("User: {}", message));

        vec![
            Message::new(Role::System, &self.system_message),
            Message::new(Role::User, &lines.join("\n")),
        ]
    }

    /// Adds a completed exchange to the history.
    pub async fn record(&mut self, message: &str, reply: &str) -> Result<()> {
        let new_messages = [
            Message::new(Role::User, message),
            Message::new(Role::Assistant, reply),
        ];

        // The session row is only created once there is something to
        // store in it
        if let (Some(db), Some(session_id)) = (&self.db, &self.session_id) {
            get_or_create_session(db, session_id).await?;
            for m in new_messages.iter() {
                insert_chat_message(db, session_id, m).await?;
            }
        }

        self.transcript.extend(new_messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::initialize_db;

    async fn test_db() -> Connection {
        let db = Connection::open_in_memory().await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        db
    }

    #[test]
    fn test_request_without_history() {
        let conversation = Conversation::new("You are a helpful assistant.");
        let messages = conversation.request("How did I sleep?");

        assert_eq!(
            messages,
            vec![
                Message::new(Role::System, "You are a helpful assistant."),
                Message::new(Role::User, "User: How did I sleep?"),
            ]
        );
    }

    #[tokio::test]
    async fn test_request_joins_recorded_history() {
        let mut conversation = Conversation::new("You are a cardio specialist.");
        conversation.record("Hi", "Hello! Ready for cardio?").await.unwrap();

        let messages = conversation.request("What about my heart rate?");

        assert_eq!(
            messages[1].content,
            "User: Hi\nAssistant: Hello! Ready for cardio?\nUser: What about my heart rate?"
        );
    }

    #[tokio::test]
    async fn test_persisted_session_can_be_resumed() {
        let db = test_db().await;

        let mut conversation = Conversation::new("You are a helpful assistant.")
            .with_database(&db, Some("session-1"))
            .await
            .unwrap();
        conversation.record("Hi", "Hello!").await.unwrap();
        conversation.record("Steps?", "About 8000 a day.").await.unwrap();

        let resumed = Conversation::new("You are a helpful assistant.")
            .with_database(&db, Some("session-1"))
            .await
            .unwrap();

        assert_eq!(resumed.transcript().len(), 4);
        assert_eq!(resumed.transcript()[3], Message::new(Role::Assistant, "About 8000 a day."));
    }

    #[tokio::test]
    async fn test_new_session_gets_generated_id() {
        let db = test_db().await;
        let conversation = Conversation::new("You are a helpful assistant.")
            .with_database(&db, None)
            .await
            .unwrap();

        assert!(conversation.session_id.is_some());
        assert!(conversation.transcript().is_empty());
    }
}
