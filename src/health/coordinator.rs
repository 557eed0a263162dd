//! Read-through fetching on top of the range cache.
//!
//! A request for `[start, end]` is compared against the cache
//! watermark `M` for its data type:
//! - `M <= start`: everything is cached, the source is not called
//! - `start < M <= end`: `[start, M)` comes from the source and
//!   `[M, end]` from the cache
//! - otherwise nothing usable is cached and the whole range is
//!   fetched
//!
//! Fetched records are written to the cache before they are merged
//! into the report.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use futures::future::join_all;
use tokio::sync::{Mutex, MutexGuard};

use super::cache::RangeCache;
use super::models::{AggregateReport, DailyRecord, DataType, ParsedQueryPair, Report};
use super::source::SourceRegistry;
use crate::core::{HealthError, Result};

/// The `days` complete days before `today`: `[today - days, today - 1]`.
/// Today is excluded because its data is still incomplete.
pub fn lookback_window(today: NaiveDate, days: u32) -> Result<(NaiveDate, NaiveDate)> {
    let days = u64::from(days);
    let start = today
        .checked_sub_days(Days::new(days))
        .ok_or(HealthError::DateComputation { from: today, days })?;
    let end = today
        .checked_sub_days(Days::new(1))
        .ok_or(HealthError::DateComputation { from: today, days: 1 })?;
    Ok((start, end))
}

pub struct FetchCoordinator {
    cache: RangeCache,
    sources: SourceRegistry,
    timeout: Duration,
    // One fetch per data type at a time so overlapping upserts for
    // the same days never race
    locks: HashMap<DataType, Mutex<()>>,
}

impl FetchCoordinator {
    pub fn new(cache: RangeCache, sources: SourceRegistry, timeout: Duration) -> Self {
        let locks = DataType::ALL
            .into_iter()
            .map(|t| (t, Mutex::new(())))
            .collect();
        Self {
            cache,
            sources,
            timeout,
            locks,
        }
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    async fn fetch_from_source(
        &self,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        let source = self.sources.get(data_type)?;
        tracing::debug!("Fetching {} from source for {} to {}", data_type, start, end);

        let records = tokio::time::timeout(self.timeout, source.fetch(start, end))
            .await
            .map_err(|_| {
                HealthError::source_fetch(
                    data_type,
                    format!("timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| HealthError::source_fetch(data_type, e))?;

        self.cache.upsert(data_type, &records).await?;
        Ok(records)
    }

    async fn lock(&self, data_type: DataType) -> Option<MutexGuard<'_, ()>> {
        match self.locks.get(&data_type) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }

    /// Returns every day in `[start, end]` for `data_type`, fetching
    /// only the part of the range the cache can't vouch for.
    pub async fn fetch(
        &self,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Report> {
        // Only the source lookup fails for unregistered types, but
        // checking up front keeps a full cache hit from masking it
        self.sources.get(data_type)?;

        let _guard = self.lock(data_type).await;
        self.fetch_unlocked(data_type, start, end).await
    }

    // Caller must hold the lock for `data_type`
    async fn fetch_unlocked(
        &self,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Report> {
        let mark = self.cache.watermark(data_type).await?.earliest_cached_day;

        let (fetched, cached) = match mark {
            Some(mark) if mark <= start => {
                tracing::debug!("{} fully cached from {}", data_type, mark);
                (vec![], self.cache.read(data_type, start, end).await?)
            }
            Some(mark) if mark <= end => {
                tracing::debug!("{} partially cached from {}", data_type, mark);
                let cached = self.cache.read(data_type, mark, end).await?;
                let missing_end = mark.pred_opt().ok_or(HealthError::DateComputation {
                    from: mark,
                    days: 1,
                })?;
                let fetched = self.fetch_from_source(data_type, start, missing_end).await?;
                (fetched, cached)
            }
            Some(mark) => {
                // Fetch up to the existing mark so lowering it to
                // `start` doesn't claim the never-fetched gap after `end`
                tracing::debug!(
                    "{} cached only from {}, after requested range",
                    data_type,
                    mark
                );
                let fetch_end = mark.pred_opt().unwrap_or(end).max(end);
                let fetched = self.fetch_from_source(data_type, start, fetch_end).await?;
                (fetched, vec![])
            }
            None => {
                tracing::debug!("{} not cached", data_type);
                (self.fetch_from_source(data_type, start, end).await?, vec![])
            }
        };

        // Merge by day so each day in range shows up once, ascending
        let merged: BTreeMap<NaiveDate, DailyRecord> = fetched
            .into_iter()
            .chain(cached)
            .filter(|r| r.day >= start && r.day <= end)
            .map(|r| (r.day, r))
            .collect();

        Ok(Report {
            data_type,
            records: merged.into_values().collect(),
        })
    }

    /// Clears the cache for `data_type` and fetches the range again.
    ///
    /// The reset and the fetch happen under one hold of the type's
    /// lock so an in-flight fetch can't refill the watermark in between.
    pub async fn refetch(
        &self,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Report> {
        self.sources.get(data_type)?;

        let _guard = self.lock(data_type).await;
        self.cache.reset(data_type).await?;
        self.fetch_unlocked(data_type, start, end).await
    }

    /// Fetches the look-back window of every pair concurrently. A
    /// failing data type is logged and recorded but doesn't stop the
    /// others.
    pub async fn fetch_many(&self, pairs: &[ParsedQueryPair], today: NaiveDate) -> AggregateReport {
        let futures = pairs.iter().map(|pair| async move {
            let result = match lookback_window(today, pair.look_back_days) {
                Ok((start, end)) => self.fetch(pair.data_type, start, end).await,
                Err(e) => Err(e),
            };
            (pair.data_type, result)
        });

        let mut aggregate = AggregateReport::default();
        for (data_type, result) in join_all(futures).await {
            match result {
                Ok(report) => aggregate.reports.push(report),
                Err(e) => {
                    tracing::error!("Error fetching data for {}: {}", data_type, e);
                    aggregate.failures.push((data_type, e));
                }
            }
        }
        aggregate
    }
}

pub type SharedCoordinator = Arc<FetchCoordinator>;
