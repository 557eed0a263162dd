pub mod cache;
pub mod coordinator;
pub mod models;
pub mod planner;
pub mod query;
pub mod source;

pub use cache::RangeCache;
pub use coordinator::{FetchCoordinator, SharedCoordinator, lookback_window};
pub use models::{AggregateReport, DailyRecord, DailyValues, DataType, ParsedQueryPair, Report};
pub use query::{QueryEvent, QueryHandler, QueryState};
pub use source::{DataSource, HttpDataSource, SourceRegistry};
