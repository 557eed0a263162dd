use anyhow::Result;

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::health::{DataType, RangeCache};

pub async fn run(config: &AppConfig, data_type: DataType) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    RangeCache::new(db).reset(data_type).await?;
    println!("Cleared cached {}", data_type);
    Ok(())
}
