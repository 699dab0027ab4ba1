//! Performance metrics: bounded histories, distribution summaries and the
//! aggregator that ties them together.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod aggregator;
pub mod distribution;
pub mod window;

pub use aggregator::{
    ActivityEntry, GenerationEvent, HealthIndicators, HealthSnapshot, HealthStatus,
    MetricsAggregator, QualitySummary, RealTimeMetrics, SeriesSummary, SourceStatistics,
    StatisticsSnapshot, ThroughputPoint, ThroughputWindow,
};
pub use distribution::{DistributionStats, Percentiles};
pub use window::RollingWindow;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
