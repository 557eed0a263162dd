//! Where uncached health data comes from.
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::models::{DailyRecord, DailyValues, DataType};
use crate::core::HealthError;

/// Fetches per-day records for one data type. Implementations must
/// return exactly one record per day in `[start, end]`, using zero
/// values for days without samples.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn data_type(&self) -> DataType;
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyRecord>, Error>;
}

pub type BoxedDataSource = Arc<dyn DataSource + Send + Sync + 'static>;

/// Maps each data type to the source that serves it.
#[derive(Clone, Default)]
pub struct SourceRegistry(HashMap<DataType, BoxedDataSource>);

impl SourceRegistry {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Registers `source` under its own data type, replacing any
    /// previous source for that type.
    pub fn register(mut self, source: BoxedDataSource) -> Self {
        self.0.insert(source.data_type(), source);
        self
    }

    pub fn get(&self, data_type: DataType) -> Result<&BoxedDataSource, HealthError> {
        self.0
            .get(&data_type)
            .ok_or_else(|| HealthError::UnknownDataType(data_type.to_string()))
    }

    /// A registry with an HTTP source for every data type.
    pub fn http(base_url: &str) -> Self {
        DataType::ALL.into_iter().fold(Self::new(), |registry, t| {
            registry.register(Arc::new(HttpDataSource::new(base_url, t)))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    HeartRate,
    RestingHeartRate,
    SleepMinutes,
    StepCount,
    WorkoutMinutes,
}

/// A single raw measurement from the health export service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub kind: SampleKind,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

fn round(v: f64) -> u32 {
    v.round().max(0.0) as u32
}

fn summarize(data_type: DataType, samples: &[&Sample]) -> DailyValues {
    let values_of = |kind: SampleKind| {
        samples
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.value)
            .collect::<Vec<f64>>()
    };

    match data_type {
        DataType::HeartRate => {
            let resting = values_of(SampleKind::RestingHeartRate);
            let avg_resting = if resting.is_empty() {
                0
            } else {
                round(resting.iter().sum::<f64>() / resting.len() as f64)
            };
            let rates = values_of(SampleKind::HeartRate);
            let min = rates.iter().copied().reduce(f64::min).map_or(0, round);
            let max = rates.iter().copied().reduce(f64::max).map_or(0, round);
            DailyValues::HeartRate {
                avg_resting,
                min,
                max,
            }
        }
        DataType::Sleep => DailyValues::Sleep {
            minutes: round(values_of(SampleKind::SleepMinutes).iter().sum()),
        },
        DataType::Step => DailyValues::Steps {
            count: round(values_of(SampleKind::StepCount).iter().sum()),
        },
        DataType::Workout => {
            let workouts = values_of(SampleKind::WorkoutMinutes);
            DailyValues::Workout {
                sessions: workouts.len() as u32,
                minutes: round(workouts.iter().sum()),
            }
        }
    }
}

/// Folds raw samples into one record per day of `[start, end]`.
/// Days without samples get zero values and samples outside the
/// range are dropped.
pub fn aggregate_daily(
    data_type: DataType,
    start: NaiveDate,
    end: NaiveDate,
    samples: &[Sample],
) -> Vec<DailyRecord> {
    let mut by_day: HashMap<NaiveDate, Vec<&Sample>> = HashMap::new();
    for s in samples {
        let day = s.timestamp.date();
        if day >= start && day <= end {
            by_day.entry(day).or_default().push(s);
        }
    }

    let mut records = Vec::new();
    let mut day = start;
    while day <= end {
        let values = match by_day.get(&day) {
            Some(day_samples) => summarize(data_type, day_samples),
            None => DailyValues::zero(data_type),
        };
        records.push(DailyRecord::new(day, values));
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    records
}

/// Pulls raw samples from a health export service over HTTP.
#[derive(Clone, Debug)]
pub struct HttpDataSource {
    api_base_url: String,
    data_type: DataType,
}

impl HttpDataSource {
    pub fn new(api_base_url: &str, data_type: DataType) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            data_type,
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyRecord>, Error> {
        let mut url = reqwest::Url::parse(&format!("{}/api/samples", self.api_base_url))?;
        url.query_pairs_mut()
            .append_pair("data_type", self.data_type.as_str())
            .append_pair("start", &start.to_string())
            .append_pair("end", &end.to_string());

        tracing::debug!("Fetching samples: {}", url);

        let samples: Vec<Sample> = reqwest::Client::new()
            .get(url.as_str())
            .header("Content-Type", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(aggregate_daily(self.data_type, start, end, &samples))
    }
}
