use anyhow::Result;

use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::health::{DataType, RangeCache};

pub async fn run(config: &AppConfig) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let cache = RangeCache::new(db);

    for data_type in DataType::ALL {
        let mark = cache.watermark(data_type).await?;
        match mark.earliest_cached_day {
            Some(day) if mark.is_available => println!("{}: cached since {}", data_type, day),
            _ => println!("{}: not cached", data_type),
        }
    }

    Ok(())
}
