use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use super::ask::print_warnings;
use super::{coordinator, llm_client};
use crate::ai::chat::Conversation;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::health::QueryHandler;

pub async fn run(config: &AppConfig, session_id: Option<&str>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let db = async_db(&config.db_path).await?;
    let conversation = Conversation::new(&config.system_message)
        .with_database(&db, session_id)
        .await?;
    if let Some(id) = &conversation.session_id {
        println!("Session: {}", id);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handler = QueryHandler::new(
        Arc::new(llm_client(config)),
        coordinator(config, &db),
        conversation,
    )?
    .streaming(tx);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                // Keep the session going if a single question fails
                let result = handler.handle(line, Local::now().date_naive()).await;
                print_warnings(&mut rx);
                match result {
                    Ok(answer) => println!("{}", answer),
                    Err(err) => println!("Error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
