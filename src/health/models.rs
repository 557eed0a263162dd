//! Data types, daily records, and cache metadata for health data.
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::HealthError;

/// The health data streams the planner may ask for. The string form
/// is the name used in the structured LLM protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "HeartRateData")]
    HeartRate,
    #[serde(rename = "SleepData")]
    Sleep,
    #[serde(rename = "WorkoutData")]
    Workout,
    #[serde(rename = "StepData")]
    Step,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::HeartRate,
        DataType::Sleep,
        DataType::Workout,
        DataType::Step,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::HeartRate => "HeartRateData",
            DataType::Sleep => "SleepData",
            DataType::Workout => "WorkoutData",
            DataType::Step => "StepData",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HealthError::UnknownDataType(s.to_string()))
    }
}

// Lets clap accept `--data-type HeartRateData`
impl clap::ValueEnum for DataType {
    fn value_variants<'a>() -> &'a [Self] {
        &DataType::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Per-day values. Every field is a non-negative integer and zero
/// means no samples were recorded that day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DailyValues {
    HeartRate {
        avg_resting: u32,
        min: u32,
        max: u32,
    },
    Sleep {
        minutes: u32,
    },
    Workout {
        sessions: u32,
        minutes: u32,
    },
    Steps {
        count: u32,
    },
}

impl DailyValues {
    pub fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::HeartRate => DailyValues::HeartRate {
                avg_resting: 0,
                min: 0,
                max: 0,
            },
            DataType::Sleep => DailyValues::Sleep { minutes: 0 },
            DataType::Workout => DailyValues::Workout {
                sessions: 0,
                minutes: 0,
            },
            DataType::Step => DailyValues::Steps { count: 0 },
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DailyValues::HeartRate { .. } => DataType::HeartRate,
            DailyValues::Sleep { .. } => DataType::Sleep,
            DailyValues::Workout { .. } => DataType::Workout,
            DailyValues::Steps { .. } => DataType::Step,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day: NaiveDate,
    pub values: DailyValues,
}

impl DailyRecord {
    pub fn new(day: NaiveDate, values: DailyValues) -> Self {
        Self { day, values }
    }
}

impl fmt::Display for DailyRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Date: {}, ", self.day)?;
        match &self.values {
            DailyValues::HeartRate {
                avg_resting,
                min,
                max,
            } => write!(
                f,
                "Average Resting Heart Rate: {}, Min Heart Rate: {}, Max Heart Rate: {}",
                avg_resting, min, max
            ),
            DailyValues::Sleep { minutes } => write!(f, "Sleep Duration (minutes): {}", minutes),
            DailyValues::Workout { sessions, minutes } => {
                write!(f, "Workouts: {}, Workout Minutes: {}", sessions, minutes)
            }
            DailyValues::Steps { count } => write!(f, "Steps: {}", count),
        }
    }
}

/// How far back the cache is known to be complete for one data type.
///
/// Every day on or after `earliest_cached_day` and before today has
/// a stored record. Nothing is claimed about older days.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheWatermark {
    pub data_type: DataType,
    pub is_available: bool,
    pub earliest_cached_day: Option<NaiveDate>,
}

impl CacheWatermark {
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            is_available: false,
            earliest_cached_day: None,
        }
    }
}

/// One `dataType,days` request produced by the query planner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedQueryPair {
    pub data_type: DataType,
    pub look_back_days: u32,
}

impl ParsedQueryPair {
    pub fn new(data_type: DataType, look_back_days: u32) -> Self {
        Self {
            data_type,
            look_back_days,
        }
    }
}

/// Records for one data type over a date range, ascending by day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub data_type: DataType,
    pub records: Vec<DailyRecord>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines = self
            .records
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<String>>();
        f.write_str(&lines.join("\n"))
    }
}

/// The combined result of fetching several data types. Failed types
/// are kept alongside the successful ones so callers can warn about
/// them.
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub reports: Vec<Report>,
    pub failures: Vec<(DataType, HealthError)>,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Renders each report as a labelled block, the form the final
    /// answer prompt expects.
    pub fn to_context(&self) -> String {
        self.reports
            .iter()
            .map(|r| format!("{}:\n{}\n\n", r.data_type, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_data_type_round_trips_through_names() {
        for t in DataType::ALL {
            assert_eq!(t.as_str().parse::<DataType>().unwrap(), t);
        }
        assert!(matches!(
            "BloodOxygenData".parse::<DataType>(),
            Err(HealthError::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_daily_values_json_shape() {
        let values = DailyValues::HeartRate {
            avg_resting: 58,
            min: 47,
            max: 151,
        };
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"{"kind":"heart_rate","avg_resting":58,"min":47,"max":151}"#
        );
    }

    #[test]
    fn test_zero_values_match_data_type() {
        for t in DataType::ALL {
            assert_eq!(DailyValues::zero(t).data_type(), t);
        }
    }

    #[test]
    fn test_heart_rate_record_display() {
        let record = DailyRecord::new(
            day(1),
            DailyValues::HeartRate {
                avg_resting: 60,
                min: 50,
                max: 120,
            },
        );
        assert_eq!(
            record.to_string(),
            "Date: 2024-07-01, Average Resting Heart Rate: 60, \
             Min Heart Rate: 50, Max Heart Rate: 120"
        );
    }

    #[test]
    fn test_aggregate_context_labels_each_report() {
        let aggregate = AggregateReport {
            reports: vec![Report {
                data_type: DataType::Step,
                records: vec![
                    DailyRecord::new(day(1), DailyValues::Steps { count: 9000 }),
                    DailyRecord::new(day(2), DailyValues::Steps { count: 4000 }),
                ],
            }],
            failures: vec![],
        };
        assert_eq!(
            aggregate.to_context(),
            "StepData:\nDate: 2024-07-01, Steps: 9000\nDate: 2024-07-02, Steps: 4000\n\n"
        );
    }
}
