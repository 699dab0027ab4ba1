//! Real-time generation metrics.
//!
//! [`MetricsAggregator::record_generation`] appends to bounded histories under
//! one lock. A monitor thread calls [`MetricsAggregator::refresh`] once per
//! second to derive the real-time figures (instantaneous, average and peak
//! throughput, average latency, requests per second). Snapshots are taken
//! under the same lock, so every snapshot is internally consistent.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::distribution::{DistributionStats, mean};
use super::unix_ms_now;
use super::window::RollingWindow;
use crate::config::{ConfigError, GeneratorConfig, validate_throughput};

/// Capacity of each quality-signal history.
pub const QUALITY_WINDOW: usize = 100;
/// Throughput samples averaged for the instantaneous figure.
pub const INSTANT_SAMPLES: usize = 10;
/// Entropy samples averaged for quality health.
pub const HEALTH_QUALITY_SAMPLES: usize = 10;
/// Events returned as recent activity.
pub const RECENT_EVENTS: usize = 20;
/// Events returned by the throughput window.
pub const THROUGHPUT_POINTS: usize = 60;
/// Horizon for requests/second and the "active" flag.
pub const ACTIVITY_HORIZON: Duration = Duration::from_secs(60);
/// Period of the monitor thread.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// One consumer call. Immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationEvent {
    #[serde(skip)]
    pub at: Instant,
    pub timestamp_ms: u64,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub source: String,
    pub throughput_mbps: f64,
}

/// Per-source aggregate. Counts only ever increase until a reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStatistics {
    pub request_count: u64,
    pub bytes_generated: u64,
    pub cumulative_time_secs: f64,
    pub error_count: u64,
    /// Recomputed from the cumulative totals on every event.
    pub average_throughput_mbps: f64,
}

/// Figures derived by the periodic refresh, plus lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RealTimeMetrics {
    pub instantaneous_throughput_mbps: f64,
    pub average_throughput_mbps: f64,
    pub peak_throughput_mbps: f64,
    pub average_latency_ms: f64,
    pub requests_per_second: f64,
    pub total_bytes_generated: u64,
    pub total_requests: u64,
    pub uptime_seconds: f64,
}

/// Current/average/min/max of one quality signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesSummary {
    fn of(window: &RollingWindow<f64>) -> Option<Self> {
        let current = *window.latest()?;
        let values = window.to_vec();
        Some(Self {
            current,
            average: mean(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub sample_count: usize,
    pub last_check_ms: Option<u64>,
    pub entropy: Option<SeriesSummary>,
    pub uniformity: Option<SeriesSummary>,
    pub correlation: Option<SeriesSummary>,
}

/// One row of recent activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp_ms: u64,
    pub size_bytes: u64,
    pub throughput_mbps: f64,
    pub latency_ms: f64,
    pub source: String,
}

/// Consistent view of everything the aggregator tracks.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSnapshot {
    pub timestamp_ms: u64,
    pub uptime_seconds: f64,
    pub real_time_metrics: RealTimeMetrics,
    pub source_statistics: BTreeMap<String, SourceStatistics>,
    pub quality_metrics: QualitySummary,
    /// In Mbps.
    pub throughput_distribution: Option<DistributionStats>,
    /// In milliseconds.
    pub latency_distribution: Option<DistributionStats>,
    pub recent_activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThroughputPoint {
    pub timestamp_ms: u64,
    pub throughput_mbps: f64,
    pub size_bytes: u64,
    pub source: String,
}

/// Recent throughput history for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputWindow {
    pub current_throughput_mbps: f64,
    pub target_throughput_mbps: f64,
    pub peak_throughput_mbps: f64,
    pub average_throughput_mbps: f64,
    /// `min(average / target · 100, 100)`.
    pub throughput_efficiency: f64,
    pub historical_data: Vec<ThroughputPoint>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// `> 0.8` healthy, `> 0.5` degraded, otherwise critical.
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Self::Healthy
        } else if score > 0.5 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthIndicators {
    pub throughput_health: f64,
    pub latency_health: f64,
    pub quality_health: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub overall_health_score: f64,
    pub status: HealthStatus,
    /// An event was recorded within the last 60 seconds.
    pub is_active: bool,
    pub health_indicators: HealthIndicators,
    pub last_activity_ms: Option<u64>,
    pub uptime_seconds: f64,
    pub timestamp_ms: u64,
}

struct State {
    target_mbps: f64,
    events: RollingWindow<GenerationEvent>,
    throughput: RollingWindow<f64>,
    latency_ms: RollingWindow<f64>,
    /// Request instants younger than `ACTIVITY_HORIZON`, oldest first.
    request_times: VecDeque<Instant>,
    sources: BTreeMap<String, SourceStatistics>,
    entropy: RollingWindow<f64>,
    uniformity: RollingWindow<f64>,
    correlation: RollingWindow<f64>,
    last_quality_check_ms: Option<u64>,
    realtime: RealTimeMetrics,
    started: Instant,
    last_event: Option<(Instant, u64)>,
}

impl State {
    fn new(history_size: usize, target_mbps: f64) -> Self {
        Self {
            target_mbps,
            events: RollingWindow::new(history_size),
            throughput: RollingWindow::new(history_size),
            latency_ms: RollingWindow::new(history_size),
            request_times: VecDeque::new(),
            sources: BTreeMap::new(),
            entropy: RollingWindow::new(QUALITY_WINDOW),
            uniformity: RollingWindow::new(QUALITY_WINDOW),
            correlation: RollingWindow::new(QUALITY_WINDOW),
            last_quality_check_ms: None,
            realtime: RealTimeMetrics::default(),
            started: Instant::now(),
            last_event: None,
        }
    }

    fn refresh(&mut self, now: Instant) {
        let rt = &mut self.realtime;
        rt.uptime_seconds = now.duration_since(self.started).as_secs_f64();

        evict_expired(&mut self.request_times, now);
        rt.requests_per_second = self.request_times.len() as f64 / ACTIVITY_HORIZON.as_secs_f64();

        if !self.throughput.is_empty() {
            let last: Vec<f64> = self.throughput.last_n(INSTANT_SAMPLES).copied().collect();
            let all = self.throughput.to_vec();
            rt.instantaneous_throughput_mbps = mean(&last);
            rt.average_throughput_mbps = mean(&all);
            rt.peak_throughput_mbps = all.iter().copied().fold(0.0, f64::max);
        }
        if !self.latency_ms.is_empty() {
            rt.average_latency_ms = mean(&self.latency_ms.to_vec());
        }
    }

    fn quality_summary(&self) -> QualitySummary {
        QualitySummary {
            sample_count: self.entropy.len(),
            last_check_ms: self.last_quality_check_ms,
            entropy: SeriesSummary::of(&self.entropy),
            uniformity: SeriesSummary::of(&self.uniformity),
            correlation: SeriesSummary::of(&self.correlation),
        }
    }
}

struct Shared {
    state: Mutex<State>,
    running: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe recorder of generation events.
pub struct MetricsAggregator {
    shared: Arc<Shared>,
    history_size: usize,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsAggregator {
    /// Build an aggregator without starting the monitor thread.
    pub fn new(history_size: usize, target_mbps: f64) -> Result<Self, ConfigError> {
        if history_size == 0 {
            return Err(ConfigError::ZeroHistorySize);
        }
        validate_throughput(target_mbps)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(history_size, target_mbps)),
                running: AtomicBool::new(false),
            }),
            history_size,
            monitor: Mutex::new(None),
        })
    }

    /// Build from the shared pipeline configuration.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        Self::new(config.metrics_history_size, config.target_throughput_mbps)
    }

    /// Build and start the monitor thread.
    pub fn spawn(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        let aggregator = Self::from_config(config)?;
        aggregator.start();
        Ok(aggregator)
    }

    /// Capacity of the event, throughput and latency histories.
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Start the once-per-second refresh thread. No-op if already running.
    pub fn start(&self) {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("qrng-metrics".into())
            .spawn(move || {
                while shared.running.load(Ordering::Acquire) {
                    shared.state().refresh(Instant::now());
                    std::thread::park_timeout(REFRESH_INTERVAL);
                }
            });
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                log::info!("Performance monitoring started");
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                log::error!("failed to spawn metrics thread: {e}; call refresh() manually");
            }
        }
    }

    /// Stop the refresh thread and wait for it to exit.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("metrics thread panicked");
            }
            log::info!("Performance monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Record one consumer call.
    ///
    /// A non-positive or non-finite duration is recorded as a zero-throughput,
    /// zero-latency event rather than rejected.
    pub fn record_generation(&self, size_bytes: usize, duration_secs: f64, source: &str) {
        let now = Instant::now();
        let timestamp_ms = unix_ms_now();
        let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            0.0
        };
        let throughput = throughput_mbps(size_bytes as u64, duration);

        let mut st = self.shared.state();
        st.events.push(GenerationEvent {
            at: now,
            timestamp_ms,
            size_bytes: size_bytes as u64,
            duration_secs: duration,
            source: source.to_string(),
            throughput_mbps: throughput,
        });
        st.throughput.push(throughput);
        st.latency_ms.push(duration * 1000.0);
        st.request_times.push_back(now);
        evict_expired(&mut st.request_times, now);

        let stats = st.sources.entry(source.to_string()).or_default();
        stats.request_count += 1;
        stats.bytes_generated += size_bytes as u64;
        stats.cumulative_time_secs += duration;
        stats.average_throughput_mbps =
            throughput_mbps(stats.bytes_generated, stats.cumulative_time_secs);

        st.realtime.total_bytes_generated += size_bytes as u64;
        st.realtime.total_requests += 1;
        st.last_event = Some((now, timestamp_ms));
    }

    /// Count a failed request against `source`.
    pub fn record_error(&self, source: &str) {
        let mut st = self.shared.state();
        st.sources.entry(source.to_string()).or_default().error_count += 1;
    }

    /// Record one set of quality signals for generated data.
    pub fn record_quality(&self, entropy: f64, uniformity: f64, correlation: f64) {
        let mut st = self.shared.state();
        st.entropy.push(entropy);
        st.uniformity.push(uniformity);
        st.correlation.push(correlation);
        st.last_quality_check_ms = Some(unix_ms_now());
    }

    /// Recompute the derived real-time figures now.
    pub fn refresh(&self) {
        self.shared.state().refresh(Instant::now());
    }

    /// Full snapshot. Real-time figures are as of the last refresh.
    pub fn get_statistics(&self) -> StatisticsSnapshot {
        let st = self.shared.state();
        let uptime = st.started.elapsed().as_secs_f64();
        let recent_activity = st
            .events
            .last_n(RECENT_EVENTS)
            .map(|e| ActivityEntry {
                timestamp_ms: e.timestamp_ms,
                size_bytes: e.size_bytes,
                throughput_mbps: round2(e.throughput_mbps),
                latency_ms: round2(e.duration_secs * 1000.0),
                source: e.source.clone(),
            })
            .collect();
        StatisticsSnapshot {
            timestamp_ms: unix_ms_now(),
            uptime_seconds: uptime,
            real_time_metrics: st.realtime,
            source_statistics: st.sources.clone(),
            quality_metrics: st.quality_summary(),
            throughput_distribution: DistributionStats::from_values(&st.throughput.to_vec()),
            latency_distribution: DistributionStats::from_values(&st.latency_ms.to_vec()),
            recent_activity,
        }
    }

    /// The last 60 events plus headline throughput figures.
    pub fn get_throughput_window(&self) -> ThroughputWindow {
        let st = self.shared.state();
        let rt = st.realtime;
        let historical_data = st
            .events
            .last_n(THROUGHPUT_POINTS)
            .map(|e| ThroughputPoint {
                timestamp_ms: e.timestamp_ms,
                throughput_mbps: e.throughput_mbps,
                size_bytes: e.size_bytes,
                source: e.source.clone(),
            })
            .collect();
        ThroughputWindow {
            current_throughput_mbps: rt.instantaneous_throughput_mbps,
            target_throughput_mbps: st.target_mbps,
            peak_throughput_mbps: rt.peak_throughput_mbps,
            average_throughput_mbps: rt.average_throughput_mbps,
            throughput_efficiency: (rt.average_throughput_mbps / st.target_mbps * 100.0).min(100.0),
            historical_data,
            timestamp_ms: unix_ms_now(),
        }
    }

    /// Composite health from throughput, latency and recent quality.
    pub fn get_health(&self) -> HealthSnapshot {
        let st = self.shared.state();
        let rt = st.realtime;

        let throughput_health = clamp01(rt.average_throughput_mbps / st.target_mbps);
        // Anything at or above one second per request scores zero.
        let latency_health = clamp01(1.0 - rt.average_latency_ms / 1000.0);
        let quality_health = if st.entropy.is_empty() {
            1.0
        } else {
            let recent: Vec<f64> = st.entropy.last_n(HEALTH_QUALITY_SAMPLES).copied().collect();
            clamp01(mean(&recent) / 8.0)
        };
        let overall = (throughput_health + latency_health + quality_health) / 3.0;

        HealthSnapshot {
            overall_health_score: overall,
            status: HealthStatus::from_score(overall),
            is_active: st
                .last_event
                .is_some_and(|(at, _)| at.elapsed() < ACTIVITY_HORIZON),
            health_indicators: HealthIndicators {
                throughput_health,
                latency_health,
                quality_health,
            },
            last_activity_ms: st.last_event.map(|(_, ms)| ms),
            uptime_seconds: st.started.elapsed().as_secs_f64(),
            timestamp_ms: unix_ms_now(),
        }
    }

    /// Target used for efficiency and health.
    pub fn target_throughput_mbps(&self) -> f64 {
        self.shared.state().target_mbps
    }

    pub fn set_target_throughput(&self, mbps: f64) -> Result<(), ConfigError> {
        validate_throughput(mbps)?;
        self.shared.state().target_mbps = mbps;
        Ok(())
    }

    /// Drop every event, counter and quality sample; restart the uptime clock.
    pub fn reset(&self) {
        {
            let mut st = self.shared.state();
            let target = st.target_mbps;
            *st = State::new(self.history_size, target);
        }
        log::info!("Performance statistics reset");
    }
}

impl Drop for MetricsAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn evict_expired(times: &mut VecDeque<Instant>, now: Instant) {
    while times
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) > ACTIVITY_HORIZON)
    {
        times.pop_front();
    }
}

fn throughput_mbps(bytes: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        bytes as f64 * 8.0 / (secs * 1_000_000.0)
    } else {
        0.0
    }
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(history: usize) -> MetricsAggregator {
        MetricsAggregator::new(history, 50.0).unwrap()
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(MetricsAggregator::new(0, 50.0).is_err());
        assert!(MetricsAggregator::new(10, 0.0).is_err());
    }

    #[test]
    fn test_record_updates_source_stats() {
        let m = aggregator(100);
        m.record_generation(1_000_000, 1.0, "fpga");
        m.record_generation(1_000_000, 1.0, "fpga");
        m.record_generation(500, 0.5, "anu");
        let stats = m.get_statistics();
        let fpga = &stats.source_statistics["fpga"];
        assert_eq!(fpga.request_count, 2);
        assert_eq!(fpga.bytes_generated, 2_000_000);
        assert!((fpga.cumulative_time_secs - 2.0).abs() < 1e-12);
        assert!((fpga.average_throughput_mbps - 8.0).abs() < 1e-9);
        assert_eq!(stats.source_statistics["anu"].request_count, 1);
        assert_eq!(stats.real_time_metrics.total_requests, 3);
        assert_eq!(stats.real_time_metrics.total_bytes_generated, 2_000_500);
    }

    #[test]
    fn test_non_positive_duration_is_zero_throughput() {
        let m = aggregator(10);
        m.record_generation(1024, 0.0, "fpga");
        m.record_generation(1024, -1.0, "fpga");
        m.record_generation(1024, f64::NAN, "fpga");
        m.refresh();
        let stats = m.get_statistics();
        assert_eq!(stats.real_time_metrics.total_requests, 3);
        assert_eq!(stats.real_time_metrics.peak_throughput_mbps, 0.0);
        assert_eq!(stats.source_statistics["fpga"].average_throughput_mbps, 0.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let m = aggregator(5);
        for i in 0..50 {
            m.record_generation(100 + i, 0.001, "fpga");
        }
        let stats = m.get_statistics();
        assert_eq!(stats.throughput_distribution.unwrap().count, 5);
        assert_eq!(stats.latency_distribution.unwrap().count, 5);
        assert_eq!(stats.recent_activity.len(), 5);
        assert_eq!(stats.recent_activity.last().unwrap().size_bytes, 149);
        assert_eq!(stats.recent_activity.first().unwrap().size_bytes, 145);
        // lifetime counters are not bounded by the window
        assert_eq!(stats.real_time_metrics.total_requests, 50);
    }

    #[test]
    fn test_refresh_derives_realtime() {
        let m = aggregator(100);
        // 1 MB in 1 s = 8 Mbps; 1 MB in 0.5 s = 16 Mbps
        m.record_generation(1_000_000, 1.0, "fpga");
        m.record_generation(1_000_000, 0.5, "fpga");
        m.refresh();
        let rt = m.get_statistics().real_time_metrics;
        assert!((rt.average_throughput_mbps - 12.0).abs() < 1e-9);
        assert!((rt.instantaneous_throughput_mbps - 12.0).abs() < 1e-9);
        assert!((rt.peak_throughput_mbps - 16.0).abs() < 1e-9);
        assert!((rt.average_latency_ms - 750.0).abs() < 1e-9);
        assert!((rt.requests_per_second - 2.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_requests_per_second_not_bounded_by_history() {
        let m = aggregator(5);
        for _ in 0..10 {
            m.record_generation(100, 0.001, "fpga");
        }
        m.refresh();
        let rt = m.get_statistics().real_time_metrics;
        assert!((rt.requests_per_second - 10.0 / 60.0).abs() < 1e-12);
        assert_eq!(rt.total_requests, 10);
    }

    #[test]
    fn test_evict_expired_drops_old_instants() {
        let now = Instant::now();
        let Some(old) = now.checked_sub(ACTIVITY_HORIZON + Duration::from_secs(1)) else {
            return;
        };
        let mut times: VecDeque<Instant> = [old, old, now].into_iter().collect();
        evict_expired(&mut times, now);
        assert_eq!(times.len(), 1);
    }

    #[test]
    fn test_instantaneous_uses_last_ten() {
        let m = aggregator(100);
        for _ in 0..10 {
            m.record_generation(125_000, 1.0, "fpga"); // 1 Mbps
        }
        for _ in 0..10 {
            m.record_generation(125_000, 0.5, "fpga"); // 2 Mbps
        }
        m.refresh();
        let rt = m.get_statistics().real_time_metrics;
        assert!((rt.instantaneous_throughput_mbps - 2.0).abs() < 1e-9);
        assert!((rt.average_throughput_mbps - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_record_error_creates_entry() {
        let m = aggregator(10);
        m.record_error("anu");
        m.record_error("anu");
        let stats = m.get_statistics();
        let anu = &stats.source_statistics["anu"];
        assert_eq!(anu.error_count, 2);
        assert_eq!(anu.request_count, 0);
    }

    #[test]
    fn test_quality_summary() {
        let m = aggregator(10);
        assert!(m.get_statistics().quality_metrics.entropy.is_none());
        m.record_quality(7.9, 0.99, 0.01);
        m.record_quality(7.5, 0.95, -0.03);
        let q = m.get_statistics().quality_metrics;
        assert_eq!(q.sample_count, 2);
        assert!(q.last_check_ms.is_some());
        let e = q.entropy.unwrap();
        assert_eq!(e.current, 7.5);
        assert_eq!(e.min, 7.5);
        assert_eq!(e.max, 7.9);
        assert!((e.average - 7.7).abs() < 1e-9);
        assert_eq!(q.correlation.unwrap().min, -0.03);
    }

    #[test]
    fn test_quality_window_bounded() {
        let m = aggregator(10);
        for i in 0..250 {
            m.record_quality(i as f64, 1.0, 0.0);
        }
        let q = m.get_statistics().quality_metrics;
        assert_eq!(q.sample_count, QUALITY_WINDOW);
        assert_eq!(q.entropy.unwrap().min, 150.0);
    }

    #[test]
    fn test_health_idle_aggregator() {
        let m = aggregator(10);
        let h = m.get_health();
        // no throughput, perfect latency, neutral quality → (0 + 1 + 1) / 3
        assert!((h.overall_health_score - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(h.status, HealthStatus::Degraded);
        assert!(!h.is_active);
        assert!(h.last_activity_ms.is_none());
    }

    #[test]
    fn test_health_healthy() {
        let m = aggregator(10);
        // 100 Mbps at 10 ms latency, well above the 50 Mbps target
        m.record_generation(125_000, 0.01, "fpga");
        m.record_quality(8.0, 1.0, 0.0);
        m.refresh();
        let h = m.get_health();
        assert_eq!(h.health_indicators.throughput_health, 1.0);
        assert!((h.health_indicators.latency_health - 0.99).abs() < 1e-9);
        assert_eq!(h.health_indicators.quality_health, 1.0);
        assert_eq!(h.status, HealthStatus::Healthy);
        assert!(h.is_active);
    }

    #[test]
    fn test_health_critical() {
        let m = aggregator(10);
        // slow request, terrible entropy
        m.record_generation(10, 5.0, "fpga");
        m.record_quality(0.5, 0.0, 0.9);
        m.refresh();
        let h = m.get_health();
        assert_eq!(h.health_indicators.latency_health, 0.0);
        assert_eq!(h.status, HealthStatus::Critical);
        assert_eq!(h.status.to_string(), "critical");
    }

    #[test]
    fn test_throughput_window() {
        let m = aggregator(200);
        for _ in 0..100 {
            m.record_generation(1_250_000, 1.0, "fpga"); // 10 Mbps
        }
        m.refresh();
        let w = m.get_throughput_window();
        assert_eq!(w.historical_data.len(), THROUGHPUT_POINTS);
        assert_eq!(w.target_throughput_mbps, 50.0);
        assert!((w.throughput_efficiency - 20.0).abs() < 1e-9);
        assert!((w.current_throughput_mbps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_capped() {
        let m = aggregator(10);
        m.record_generation(10_000_000, 0.1, "fpga"); // 800 Mbps
        m.refresh();
        assert_eq!(m.get_throughput_window().throughput_efficiency, 100.0);
    }

    #[test]
    fn test_reset() {
        let m = aggregator(10);
        m.record_generation(100, 0.1, "fpga");
        m.record_quality(7.0, 1.0, 0.0);
        m.record_error("anu");
        m.refresh();
        m.reset();
        let stats = m.get_statistics();
        assert!(stats.source_statistics.is_empty());
        assert!(stats.recent_activity.is_empty());
        assert!(stats.throughput_distribution.is_none());
        assert_eq!(stats.quality_metrics.sample_count, 0);
        assert_eq!(stats.real_time_metrics, RealTimeMetrics::default());
        assert_eq!(m.target_throughput_mbps(), 50.0);
    }

    #[test]
    fn test_monitor_thread_refreshes() {
        let m = aggregator(10);
        m.record_generation(1_000_000, 1.0, "fpga");
        m.start();
        assert!(m.is_running());
        let deadline = Instant::now() + Duration::from_secs(5);
        while m.get_statistics().real_time_metrics.average_throughput_mbps == 0.0
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!((m.get_statistics().real_time_metrics.average_throughput_mbps - 8.0).abs() < 1e-9);
        let t0 = Instant::now();
        m.stop();
        assert!(!m.is_running());
        // unpark wakes the thread well before the next one-second tick
        assert!(t0.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn test_concurrent_record() {
        let m = Arc::new(aggregator(50));
        std::thread::scope(|s| {
            for t in 0..8 {
                let m = &m;
                s.spawn(move || {
                    for _ in 0..200 {
                        m.record_generation(64, 0.001, if t % 2 == 0 { "fpga" } else { "anu" });
                    }
                });
            }
        });
        let stats = m.get_statistics();
        assert_eq!(stats.real_time_metrics.total_requests, 1600);
        let per_source: u64 = stats.source_statistics.values().map(|s| s.request_count).sum();
        assert_eq!(per_source, 1600);
        assert_eq!(stats.recent_activity.len(), RECENT_EVENTS);
        assert_eq!(stats.throughput_distribution.unwrap().count, 50);
    }
}
