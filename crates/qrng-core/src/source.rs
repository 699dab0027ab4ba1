//! Abstract entropy source trait.
//!
//! Anything that can hand out a byte stream implements [`EntropySource`]: the
//! local simulated device ([`crate::QuantumGenerator`]) and any remote quantum
//! API client plugged in by the caller. Remote sources are allowed to fail;
//! the caller records the failure against the source name.

/// Kind of entropy source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// In-process noise simulation.
    Simulated,
    /// Remote service reached over the network.
    Remote,
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => write!(f, "simulated"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Metadata about an entropy source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique label, also used as the metrics key (e.g. `"fpga"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Source category for classification.
    pub category: SourceCategory,
}

/// Why a source could not deliver bytes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("source {source_name} rate limited, retry in {retry_after_secs}s")]
    RateLimited {
        source_name: String,
        retry_after_secs: u64,
    },

    #[error("source {source_name} returned {got} bytes, expected {expected}")]
    ShortRead {
        source_name: String,
        expected: usize,
        got: usize,
    },
}

/// Trait that every entropy source must implement.
pub trait EntropySource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Check if this source can currently serve requests.
    fn is_available(&self) -> bool {
        true
    }

    /// Fetch exactly `n_bytes` bytes or fail.
    fn fetch(&self, n_bytes: usize) -> Result<Vec<u8>, SourceError>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

/// Enforce the exact-length contract on bytes returned by a source.
pub fn expect_len(source_name: &str, data: Vec<u8>, expected: usize) -> Result<Vec<u8>, SourceError> {
    if data.len() == expected {
        Ok(data)
    } else {
        Err(SourceError::ShortRead {
            source_name: source_name.to_string(),
            expected,
            got: data.len(),
        })
    }
}
