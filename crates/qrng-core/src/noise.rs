//! Simulated physical-noise source.
//!
//! Each byte starts from the OS CSPRNG and is perturbed by three simulated
//! effects before being clamped and truncated back into the byte range:
//!
//! - **thermal**: Gaussian, `N(0, thermal_noise_level)`
//! - **shot**: Poisson, `Poisson(shot_noise_factor)`
//! - **interference**: `0.02·sin(2πt/100) + 0.01·cos(2πt/50)` indexed by byte
//!   position `t`, when enabled
//!
//! This is a demonstration model. The output is never better than the OS
//! stream it starts from and must not be presented as certified entropy.

use std::f64::consts::PI;
use std::sync::{Mutex, PoisonError};

use rand::RngCore;
use rand_distr::{Distribution, Normal, Poisson};

use crate::config::{ConfigError, NoiseParameters};

/// Failure inside a single perturbation pass. Never escapes [`NoiseSource::generate`].
#[derive(Debug, thiserror::Error)]
pub enum NoiseError {
    #[error("invalid thermal noise level {0}")]
    Thermal(f64),

    #[error("invalid shot noise factor {0}")]
    Shot(f64),
}

/// Layered noise generator. Parameters can be swapped while generation is in
/// flight; every call works on its own copy.
#[derive(Debug)]
pub struct NoiseSource {
    params: Mutex<NoiseParameters>,
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::new(NoiseParameters::default())
    }
}

impl NoiseSource {
    pub fn new(params: NoiseParameters) -> Self {
        Self {
            params: Mutex::new(params),
        }
    }

    /// Snapshot of the current parameters.
    pub fn parameters(&self) -> NoiseParameters {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the parameters after validating them.
    pub fn set_parameters(&self, params: NoiseParameters) -> Result<(), ConfigError> {
        params.validate()?;
        *self.params.lock().unwrap_or_else(PoisonError::into_inner) = params;
        Ok(())
    }

    /// Produce exactly `size` bytes of raw, not yet debiased, noise.
    ///
    /// If the perturbation pass fails the unperturbed OS bytes are returned,
    /// so the length contract always holds.
    pub fn generate(&self, size: usize) -> Vec<u8> {
        let params = self.parameters();
        let base = base_stream(size);
        match perturb(&base, &params) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("noise perturbation failed ({e}); using unperturbed base stream");
                base
            }
        }
    }
}

/// Cryptographically strong floor for every generated byte.
fn base_stream(size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    if let Err(e) = getrandom::fill(&mut buf) {
        log::warn!("OS CSPRNG unavailable ({e}); using thread-local CSPRNG");
        rand::rng().fill_bytes(&mut buf);
    }
    buf
}

/// Interference term at byte position `t`.
fn interference(t: usize) -> f64 {
    let t = t as f64;
    0.02 * (2.0 * PI * t / 100.0).sin() + 0.01 * (2.0 * PI * t / 50.0).cos()
}

/// Apply the noise layers to `base`.
pub fn perturb(base: &[u8], params: &NoiseParameters) -> Result<Vec<u8>, NoiseError> {
    let thermal = Normal::new(0.0, params.thermal_noise_level)
        .map_err(|_| NoiseError::Thermal(params.thermal_noise_level))?;
    // Poisson(0) is a point mass at zero and is rejected by the sampler.
    let shot = if params.shot_noise_factor > 0.0 {
        Some(
            Poisson::new(params.shot_noise_factor)
                .map_err(|_| NoiseError::Shot(params.shot_noise_factor))?,
        )
    } else if params.shot_noise_factor == 0.0 {
        None
    } else {
        return Err(NoiseError::Shot(params.shot_noise_factor));
    };

    let mut rng = rand::rng();
    let out = base
        .iter()
        .enumerate()
        .map(|(t, &b)| {
            let mut v = b as f64 + thermal.sample(&mut rng);
            if let Some(shot) = &shot {
                let k: f64 = shot.sample(&mut rng);
                v += k;
            }
            if params.interference {
                v += interference(t);
            }
            v.clamp(0.0, 255.0) as u8
        })
        .collect();
    Ok(out)
}
