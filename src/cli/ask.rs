use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tokio::sync::mpsc;

use super::{coordinator, llm_client};
use crate::ai::chat::Conversation;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::health::{QueryEvent, QueryHandler};

/// Prints warnings for anything that went wrong on the way to the
/// answer.
pub fn print_warnings(rx: &mut mpsc::UnboundedReceiver<QueryEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            QueryEvent::ActiveDataTypes(types) if !types.is_empty() => {
                let names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                println!("[using {}]", names.join(", "));
            }
            QueryEvent::PairRejected(msg) => println!("[skipped: {}]", msg),
            QueryEvent::FetchFailed { data_type, error } => {
                println!("[could not load {}: {}]", data_type, error)
            }
            QueryEvent::PlanFallback(_) => println!("[answering without health data]"),
            _ => {}
        }
    }
}

pub async fn run(config: &AppConfig, query: &str) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handler = QueryHandler::new(
        Arc::new(llm_client(config)),
        coordinator(config, &db),
        Conversation::new(&config.system_message),
    )?
    .streaming(tx);

    let answer = handler.handle(query, Local::now().date_naive()).await?;
    print_warnings(&mut rx);
    println!("{}", answer);

    Ok(())
}
