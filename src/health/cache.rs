//! SQLite backed per-day record cache with a low-water mark per data
//! type.
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;

use super::models::{CacheWatermark, DailyRecord, DailyValues, DataType};
use crate::core::Result;

const DAY_FORMAT: &str = "%Y-%m-%d";

fn parse_day(idx: usize, val: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(val, DAY_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

#[derive(Clone)]
pub struct RangeCache {
    db: Connection,
}

impl RangeCache {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }

    /// Returns the stored watermark or an empty one if nothing has
    /// been cached for `data_type` yet.
    pub async fn watermark(&self, data_type: DataType) -> Result<CacheWatermark> {
        let row = self
            .db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT is_available, earliest_cached_day
                         FROM cache_watermark WHERE data_type = ?",
                        [data_type.as_str()],
                        |row| {
                            let is_available: bool = row.get(0)?;
                            let day: Option<String> = row.get(1)?;
                            let day = day.map(|d| parse_day(1, &d)).transpose()?;
                            Ok((is_available, day))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let watermark = match row {
            Some((is_available, earliest_cached_day)) => CacheWatermark {
                data_type,
                is_available,
                earliest_cached_day,
            },
            None => CacheWatermark::empty(data_type),
        };
        Ok(watermark)
    }

    /// All stored records with `start <= day <= end`, ascending by day.
    pub async fn read(
        &self,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        let (start, end) = (format_day(start), format_day(end));
        let records = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT day, data FROM daily_record
                     WHERE data_type = ? AND day >= ? AND day <= ?
                     ORDER BY day ASC",
                )?;
                let rows = stmt
                    .query_map(params![data_type.as_str(), start, end], |row| {
                        let day: String = row.get(0)?;
                        let data: String = row.get(1)?;
                        let values: DailyValues = serde_json::from_str(&data).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                1,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                        Ok(DailyRecord::new(parse_day(0, &day)?, values))
                    })?
                    .collect::<rusqlite::Result<Vec<DailyRecord>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(records)
    }

    /// Writes each record, replacing any existing record for the same
    /// day, then lowers the watermark to the oldest day written. The
    /// watermark never moves forward.
    pub async fn upsert(&self, data_type: DataType, records: &[DailyRecord]) -> Result<()> {
        let Some(oldest) = records.iter().map(|r| r.day).min() else {
            return Ok(());
        };

        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            let data = serde_json::to_string(&r.values)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            rows.push((format_day(r.day), data));
        }
        let oldest = format_day(oldest);
        let count = rows.len();

        self.db
            .call(move |conn| {
                // Records and watermark are committed together so the
                // watermark never claims days that failed to write
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO daily_record (data_type, day, data) VALUES (?, ?, ?)
                         ON CONFLICT(data_type, day) DO UPDATE SET data = excluded.data",
                    )?;
                    for (day, data) in rows.iter() {
                        stmt.execute(params![data_type.as_str(), day, data])?;
                    }
                }
                tx.execute(
                    "INSERT INTO cache_watermark (data_type, is_available, earliest_cached_day)
                     VALUES (?1, 1, ?2)
                     ON CONFLICT(data_type) DO UPDATE SET
                         is_available = 1,
                         earliest_cached_day = CASE
                             WHEN earliest_cached_day IS NULL THEN excluded.earliest_cached_day
                             ELSE min(earliest_cached_day, excluded.earliest_cached_day)
                         END",
                    params![data_type.as_str(), oldest],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        tracing::debug!("Cached {} {} records", count, data_type);
        Ok(())
    }

    /// Deletes every record and the watermark for `data_type`.
    pub async fn reset(&self, data_type: DataType) -> Result<()> {
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM daily_record WHERE data_type = ?",
                    [data_type.as_str()],
                )?;
                tx.execute(
                    "DELETE FROM cache_watermark WHERE data_type = ?",
                    [data_type.as_str()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;

        tracing::info!("Reset cache for {}", data_type);
        Ok(())
    }
}
