use anyhow::Result;
use std::fs;

use crate::core::AppConfig;
use crate::core::db::async_db;

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Initializing storage at {}...", config.storage_path);
    fs::create_dir_all(&config.storage_path)?;

    // Opening the db creates any missing tables
    async_db(&config.db_path).await?;
    println!("Finished initializing db at {}", config.db_path);

    Ok(())
}
