//! Result aggregation, statistics and recommendations.

pub mod aggregator;
pub mod recommend;

pub use aggregator::{AggregateStats, CategoryStats, ResultAggregator};
pub use recommend::{Priority, Recommendation};
