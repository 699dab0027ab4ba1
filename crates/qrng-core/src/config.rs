//! Typed configuration for the generator and the metrics aggregator.
//!
//! One structure enumerates every knob the pipeline reads: buffer capacity,
//! target throughput, the noise model parameters, and the metrics history
//! size. Values are checked once by [`GeneratorConfig::validate`]; setters on
//! the running generator re-check the subset they touch.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default buffer capacity (1 MiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default target throughput in megabits per second.
pub const DEFAULT_TARGET_THROUGHPUT_MBPS: f64 = 50.0;

/// Default number of events kept by the metrics aggregator.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Errors raised while building or loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("buffer capacity must be at least 1 byte")]
    ZeroBufferCapacity,

    #[error("target throughput must be a positive finite number of Mbps, got {0}")]
    InvalidThroughput(f64),

    #[error("{name} must be a non-negative finite number, got {value}")]
    InvalidNoiseLevel { name: &'static str, value: f64 },

    #[error("metrics history size must be at least 1")]
    ZeroHistorySize,

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters of the simulated physical-noise model.
///
/// Read by the noise source on every generation call. The struct is `Copy`
/// so readers always work on a private snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParameters {
    /// Nominal oscillator frequency. Informational only.
    pub base_frequency_hz: f64,
    /// Standard deviation of the Gaussian thermal perturbation.
    pub thermal_noise_level: f64,
    /// Rate (lambda) of the Poisson shot-noise perturbation.
    pub shot_noise_factor: f64,
    /// Superimpose the deterministic sinusoidal interference term.
    pub interference: bool,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            base_frequency_hz: 1e9,
            thermal_noise_level: 0.1,
            shot_noise_factor: 0.05,
            interference: true,
        }
    }
}

impl NoiseParameters {
    /// Check that every level is usable by the noise model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_level("thermal_noise_level", self.thermal_noise_level)?;
        check_level("shot_noise_factor", self.shot_noise_factor)?;
        Ok(())
    }
}

fn check_level(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidNoiseLevel { name, value })
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Maximum number of debiased bytes held by the entropy buffer.
    pub buffer_capacity: usize,
    /// Simulated device rate used for pacing and health scoring.
    pub target_throughput_mbps: f64,
    /// Noise model parameters.
    pub noise: NoiseParameters,
    /// Capacity of the metrics aggregator's rolling windows.
    pub metrics_history_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            target_throughput_mbps: DEFAULT_TARGET_THROUGHPUT_MBPS,
            noise: NoiseParameters::default(),
            metrics_history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

impl GeneratorConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        validate_throughput(self.target_throughput_mbps)?;
        self.noise.validate()?;
        if self.metrics_history_size == 0 {
            return Err(ConfigError::ZeroHistorySize);
        }
        Ok(())
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Validate a target throughput value in Mbps.
pub fn validate_throughput(mbps: f64) -> Result<(), ConfigError> {
    if mbps.is_finite() && mbps > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThroughput(mbps))
    }
}
