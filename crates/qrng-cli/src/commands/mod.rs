pub mod generate;
pub mod serve;
pub mod status;
pub mod validate;

use clap::Args;
use qrng_core::{ConfigError, GeneratorConfig, QuantumGenerator};

/// Pipeline configuration flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GeneratorArgs {
    /// JSON config file; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Entropy buffer capacity in bytes
    #[arg(long, global = true)]
    pub buffer_capacity: Option<usize>,

    /// Target throughput in Mbps
    #[arg(long, global = true)]
    pub target_mbps: Option<f64>,

    /// Thermal noise standard deviation
    #[arg(long, global = true)]
    pub thermal: Option<f64>,

    /// Shot noise rate (0 disables)
    #[arg(long, global = true)]
    pub shot: Option<f64>,

    /// Disable the periodic interference term
    #[arg(long, global = true)]
    pub no_interference: bool,

    /// Metrics history size (events per rolling window)
    #[arg(long, global = true)]
    pub history_size: Option<usize>,
}

impl GeneratorArgs {
    /// Merge file (or defaults) with flag overrides and validate.
    pub fn to_config(&self) -> Result<GeneratorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::from_json_file(path)?,
            None => GeneratorConfig::default(),
        };
        if let Some(v) = self.buffer_capacity {
            config.buffer_capacity = v;
        }
        if let Some(v) = self.target_mbps {
            config.target_throughput_mbps = v;
        }
        if let Some(v) = self.thermal {
            config.noise.thermal_noise_level = v;
        }
        if let Some(v) = self.shot {
            config.noise.shot_noise_factor = v;
        }
        if self.no_interference {
            config.noise.interference = false;
        }
        if let Some(v) = self.history_size {
            config.metrics_history_size = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Build a generator or exit with a message.
pub fn make_generator(config: &GeneratorConfig) -> QuantumGenerator {
    match QuantumGenerator::new(config) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Failed to create generator: {e}");
            std::process::exit(2);
        }
    }
}
