//! Simulated FPGA quantum generator with a background-filled entropy buffer.
//!
//! Architecture:
//! 1. A producer thread repeatedly draws a raw chunk from the [`NoiseSource`],
//!    debiases it and appends it to the [`EntropyBuffer`] while there is room
//! 2. [`QuantumGenerator::generate`] serves requests from the buffer (FIFO)
//! 3. When the buffer cannot cover a request, the bytes are synthesized
//!    on the caller's thread instead; the buffer is left as it was
//! 4. Every request is paced to the configured target throughput, modelling a
//!    rate-limited hardware device
//!
//! The producer never waits on consumers and consumers never wait on the
//! producer. Shutdown is explicit: [`QuantumGenerator::stop`] clears the
//! running flag and joins the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::buffer::EntropyBuffer;
use crate::conditioning::debias;
use crate::config::{ConfigError, GeneratorConfig, NoiseParameters, validate_throughput};
use crate::noise::NoiseSource;
use crate::source::{EntropySource, SourceCategory, SourceError, SourceInfo};

/// Raw bytes generated per producer iteration.
pub const PRODUCER_CHUNK: usize = 1024;

/// Pause between producer iterations.
pub const PRODUCER_INTERVAL: Duration = Duration::from_millis(1);

/// Raw bytes drawn per requested output byte on the on-demand path.
/// Debiasing keeps about a quarter of the input.
const RAW_PER_OUTPUT_BYTE: usize = 5;

/// Longest pacing sleep a single `generate` call may take.
pub const MAX_PACING_DELAY: Duration = Duration::from_secs(1);

/// Label under which this generator reports to the metrics aggregator.
pub const SOURCE_LABEL: &str = "fpga";

static GENERATOR_INFO: SourceInfo = SourceInfo {
    name: SOURCE_LABEL,
    description: "Simulated FPGA quantum noise device (von Neumann debiased)",
    category: SourceCategory::Simulated,
};

/// Lifetime request counters.
#[derive(Debug)]
struct Counters {
    total_bytes_generated: u64,
    generation_requests: u64,
    buffer_hits: u64,
    buffer_misses: u64,
    started: Instant,
}

impl Counters {
    fn new() -> Self {
        Self {
            total_bytes_generated: 0,
            generation_requests: 0,
            buffer_hits: 0,
            buffer_misses: 0,
            started: Instant::now(),
        }
    }
}

/// State shared with the producer thread.
struct Shared {
    noise: NoiseSource,
    buffer: EntropyBuffer,
    running: AtomicBool,
    target_mbps: Mutex<f64>,
    counters: Mutex<Counters>,
}

impl Shared {
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn target_mbps(&self) -> f64 {
        *self.target_mbps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate `size` debiased bytes directly, bypassing the buffer.
    fn synthesize(&self, size: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(size);
        while out.len() < size {
            let shortfall = size - out.len();
            let raw = self.noise.generate(shortfall * RAW_PER_OUTPUT_BYTE + 64);
            out.extend(debias(&raw));
        }
        out.truncate(size);
        out
    }

    fn produce_once(&self) {
        if self.buffer.free_space() == 0 {
            return;
        }
        let raw = self.noise.generate(PRODUCER_CHUNK);
        let chunk = debias(&raw);
        self.buffer.fill(&chunk);
    }
}

/// Lifetime statistics of a generator.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorStats {
    pub total_bytes_generated: u64,
    pub generation_requests: u64,
    pub buffer_hits: u64,
    pub buffer_misses: u64,
    /// Bytes served × 8 over uptime, in Mbps.
    pub average_throughput_mbps: f64,
    pub uptime_seconds: f64,
}

/// Point-in-time generator status.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorStatus {
    pub running: bool,
    pub buffer_level_bytes: usize,
    pub buffer_capacity_bytes: usize,
    pub buffer_utilization: f64,
    pub target_throughput_mbps: f64,
    pub noise: NoiseParameters,
    pub stats: GeneratorStats,
}

/// Buffered simulated quantum generator.
pub struct QuantumGenerator {
    shared: Arc<Shared>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl QuantumGenerator {
    /// Build a generator without starting the producer thread.
    pub fn new(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                noise: NoiseSource::new(config.noise),
                buffer: EntropyBuffer::new(config.buffer_capacity),
                running: AtomicBool::new(false),
                target_mbps: Mutex::new(config.target_throughput_mbps),
                counters: Mutex::new(Counters::new()),
            }),
            producer: Mutex::new(None),
        })
    }

    /// Build a generator and start its producer thread.
    pub fn spawn(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        let generator = Self::new(config)?;
        generator.start();
        Ok(generator)
    }

    /// Start the background producer. No-op if it is already running.
    ///
    /// If the OS refuses to spawn the thread the generator keeps working
    /// through the on-demand path only.
    pub fn start(&self) {
        let mut slot = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("qrng-producer".into())
            .spawn(move || {
                while shared.running.load(Ordering::Acquire) {
                    shared.produce_once();
                    std::thread::sleep(PRODUCER_INTERVAL);
                }
            });
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                log::info!(
                    "FPGA simulator started with target throughput: {} Mbps",
                    self.shared.target_mbps()
                );
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                log::error!("failed to spawn producer thread: {e}; serving on demand only");
            }
        }
    }

    /// Stop the producer and wait for its current iteration to finish.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        let handle = self
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("producer thread panicked");
            }
            log::info!("FPGA simulator stopped");
        }
    }

    /// Whether the producer thread is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Return exactly `size` debiased bytes.
    ///
    /// Served from the buffer when it holds at least `size` bytes, otherwise
    /// synthesized on this thread. Then sleeps, if needed, so the request
    /// takes at least `size·8 / target` seconds.
    pub fn generate(&self, size: usize) -> Vec<u8> {
        let start = Instant::now();
        let (out, hit) = match self.shared.buffer.take_exact(size) {
            Some(bytes) => (bytes, true),
            None => {
                log::debug!(
                    "buffer miss: {size} bytes requested, {} buffered; synthesizing on demand",
                    self.shared.buffer.len()
                );
                (self.shared.synthesize(size), false)
            }
        };

        {
            let mut c = self.shared.counters();
            c.total_bytes_generated += size as u64;
            c.generation_requests += 1;
            if hit {
                c.buffer_hits += 1;
            } else {
                c.buffer_misses += 1;
            }
        }

        let expected = pacing_delay(size, self.shared.target_mbps());
        let elapsed = start.elapsed();
        if elapsed < expected {
            std::thread::sleep(expected - elapsed);
        }
        out
    }

    /// Run one producer iteration on the calling thread.
    pub fn fill_once(&self) {
        self.shared.produce_once();
    }

    /// Current buffer fill level in bytes.
    pub fn buffer_level(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Configured buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.shared.buffer.capacity()
    }

    pub fn target_throughput_mbps(&self) -> f64 {
        self.shared.target_mbps()
    }

    /// Change the pacing target.
    pub fn set_target_throughput(&self, mbps: f64) -> Result<(), ConfigError> {
        validate_throughput(mbps)?;
        *self
            .shared
            .target_mbps
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mbps;
        log::info!("Target throughput updated to {mbps} Mbps");
        Ok(())
    }

    /// Current noise parameters.
    pub fn noise_parameters(&self) -> NoiseParameters {
        self.shared.noise.parameters()
    }

    /// Replace the noise parameters used by subsequent generation.
    pub fn configure_noise(&self, params: NoiseParameters) -> Result<(), ConfigError> {
        self.shared.noise.set_parameters(params)?;
        log::info!("Updated noise parameters to {params:?}");
        Ok(())
    }

    /// Zero the lifetime counters and restart the uptime clock.
    pub fn reset_stats(&self) {
        *self.shared.counters() = Counters::new();
        log::info!("Statistics reset");
    }

    /// Snapshot of buffer level, configuration and counters.
    pub fn status(&self) -> GeneratorStatus {
        let level = self.shared.buffer.len();
        let capacity = self.shared.buffer.capacity();
        let stats = {
            let c = self.shared.counters();
            let uptime = c.started.elapsed().as_secs_f64();
            GeneratorStats {
                total_bytes_generated: c.total_bytes_generated,
                generation_requests: c.generation_requests,
                buffer_hits: c.buffer_hits,
                buffer_misses: c.buffer_misses,
                average_throughput_mbps: if uptime > 0.0 {
                    c.total_bytes_generated as f64 * 8.0 / (uptime * 1_000_000.0)
                } else {
                    0.0
                },
                uptime_seconds: uptime,
            }
        };
        GeneratorStatus {
            running: self.is_running(),
            buffer_level_bytes: level,
            buffer_capacity_bytes: capacity,
            buffer_utilization: if capacity > 0 {
                level as f64 / capacity as f64
            } else {
                0.0
            },
            target_throughput_mbps: self.shared.target_mbps(),
            noise: self.shared.noise.parameters(),
            stats,
        }
    }
}

impl Drop for QuantumGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl EntropySource for QuantumGenerator {
    fn info(&self) -> &SourceInfo {
        &GENERATOR_INFO
    }

    fn fetch(&self, n_bytes: usize) -> Result<Vec<u8>, SourceError> {
        Ok(self.generate(n_bytes))
    }
}

/// Minimum wall-clock time for `size` bytes at `mbps`, capped at
/// [`MAX_PACING_DELAY`].
fn pacing_delay(size: usize, mbps: f64) -> Duration {
    if !(mbps.is_finite() && mbps > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(size as f64 * 8.0 / (mbps * 1_000_000.0))
        .map_or(MAX_PACING_DELAY, |d| d.min(MAX_PACING_DELAY))
}
