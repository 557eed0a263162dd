//! Test utilities for integration tests
use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;
use tokio_rusqlite::Connection;

use healthgpt::core::AppConfig;
use healthgpt::core::db::async_db;

/// A config and database in a fresh temporary directory. Keep the
/// returned `TempDir` alive for as long as the database is used.
pub async fn test_env(health_api_url: &str, llm_host: &str) -> (TempDir, AppConfig, Connection) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage_path = dir.path().display().to_string();

    let config = AppConfig {
        db_path: format!("{}/healthgpt.db", storage_path),
        storage_path,
        health_api_url: health_api_url.to_string(),
        openai_model: String::from("gpt-4o"),
        openai_api_hostname: llm_host.to_string(),
        openai_api_key: String::from("test-api-key"),
        temperature: 0.7,
        system_message: String::from("You are a helpful assistant."),
        llm_timeout: std::time::Duration::from_secs(5),
        source_timeout: std::time::Duration::from_secs(5),
    };

    let db = async_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");

    (dir, config, db)
}

pub fn completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

/// One sample of `kind` at noon on each day in `[start, end]`.
pub fn daily_samples_body(kind: &str, start: NaiveDate, end: NaiveDate, value: f64) -> String {
    let samples: Vec<serde_json::Value> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| json!({"kind": kind, "timestamp": format!("{}T12:00:00", d), "value": value}))
        .collect();
    json!(samples).to_string()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
