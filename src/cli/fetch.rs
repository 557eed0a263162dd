use anyhow::Result;
use chrono::Local;

use super::coordinator;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::health::{DataType, lookback_window};

pub async fn run(config: &AppConfig, data_type: DataType, days: u32, refresh: bool) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let coordinator = coordinator(config, &db);
    let (start, end) = lookback_window(Local::now().date_naive(), days)?;

    let report = if refresh {
        coordinator.refetch(data_type, start, end).await?
    } else {
        coordinator.fetch(data_type, start, end).await?
    };

    println!("{}:\n{}", report.data_type, report);
    Ok(())
}
