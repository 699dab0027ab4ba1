//! # qrng-core
//!
//! Simulated quantum entropy pipeline.
//!
//! A noise model stands in for an FPGA quantum device: a uniform base stream
//! perturbed by thermal (Gaussian), shot (Poisson) and periodic interference
//! noise. A von Neumann extractor removes first-order bias, a producer thread
//! keeps a bounded buffer topped up, and every request is paced to a target
//! throughput. A metrics aggregator tracks throughput, latency, per-source
//! counts and data quality.
//!
//! ## Quick Start
//!
//! ```no_run
//! use qrng_core::{GeneratorConfig, MetricsAggregator, QuantumGenerator};
//!
//! let config = GeneratorConfig::default();
//! let generator = QuantumGenerator::spawn(&config).unwrap();
//! let metrics = MetricsAggregator::spawn(&config).unwrap();
//!
//! let start = std::time::Instant::now();
//! let bytes = generator.generate(256);
//! metrics.record_generation(bytes.len(), start.elapsed().as_secs_f64(), "fpga");
//! assert_eq!(bytes.len(), 256);
//! ```
//!
//! ## Architecture
//!
//! NoiseSource → debias → EntropyBuffer → QuantumGenerator::generate → caller
//!
//! The producer never blocks on consumers. When the buffer cannot cover a
//! request the bytes are synthesized on the caller's thread.
//!
//! Output is not suitable for cryptographic key material.

pub mod buffer;
pub mod conditioning;
pub mod config;
pub mod generator;
pub mod metrics;
pub mod noise;
pub mod source;

pub use buffer::EntropyBuffer;
pub use conditioning::{
    QuickMetrics, debias, ones_ratio, quick_metrics, quick_min_entropy, quick_shannon,
    von_neumann_debias,
};
pub use config::{ConfigError, GeneratorConfig, NoiseParameters};
pub use generator::{GeneratorStats, GeneratorStatus, QuantumGenerator};
pub use metrics::{HealthStatus, MetricsAggregator, unix_ms_now};
pub use noise::{NoiseError, NoiseSource};
pub use source::{EntropySource, SourceCategory, SourceError, SourceInfo};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
