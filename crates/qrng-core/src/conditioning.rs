//! Centralized debiasing and quick quality helpers.
//!
//! All post-processing of raw noise lives here. The noise source produces raw
//! bytes; this module is the single gateway that turns them into output.
//!
//! # Bit order
//!
//! Bytes are expanded most-significant-bit first and debiased bits are repacked
//! most-significant-bit first, so identical input always yields identical
//! output.
//!
//! ```text
//! NoiseSource → raw bytes → von Neumann (this module) → EntropyBuffer
//! ```

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Von Neumann debiasing
// ---------------------------------------------------------------------------

/// Von Neumann transform without any fallback.
///
/// Takes non-overlapping bit pairs: (0,1) → 0, (1,0) → 1, same → discard.
/// Emitted bits are zero-padded up to the next byte boundary. Returns an empty
/// vector when no pair was informative.
///
/// Expected yield: ~25% of input bits (for unbiased input).
pub fn von_neumann_debias(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 + 1);
    let mut acc = 0u8;
    let mut filled = 0u8;
    for byte in data {
        for i in (0..8).step_by(2) {
            let b1 = (byte >> (7 - i)) & 1;
            let b2 = (byte >> (6 - i)) & 1;
            if b1 != b2 {
                acc |= b1 << (7 - filled);
                filled += 1;
                if filled == 8 {
                    out.push(acc);
                    acc = 0;
                    filled = 0;
                }
            }
        }
    }
    // Trailing partial byte: the remaining low bits are already zero.
    if filled > 0 {
        out.push(acc);
    }
    out
}

/// Debias raw noise, falling back to half of the input when nothing survives.
///
/// The fallback returns the first `len / 2` bytes of `data` unchanged. That
/// slice carries whatever bias the input had; it exists only so callers never
/// receive an empty chunk from non-empty input.
pub fn debias(data: &[u8]) -> Vec<u8> {
    let out = von_neumann_debias(data);
    if out.is_empty() && !data.is_empty() {
        log::warn!(
            "von Neumann debiasing produced no bits from {} bytes; returning biased half-length input",
            data.len()
        );
        return data[..data.len() / 2].to_vec();
    }
    out
}

// ---------------------------------------------------------------------------
// Quick analysis utilities
// ---------------------------------------------------------------------------

/// Quick Shannon entropy in bits/byte for a byte slice.
pub fn quick_shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let n = data.len() as f64;
    let mut h = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.log2();
        }
    }
    h
}

/// Min-entropy in bits/byte: `-log2(max p)`.
pub fn quick_min_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let max = counts.iter().copied().max().unwrap_or(0);
    let p_max = max as f64 / data.len() as f64;
    -p_max.log2()
}

/// Fraction of 1-bits across the whole slice.
pub fn ones_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.5;
    }
    let ones: u64 = data.iter().map(|b| b.count_ones() as u64).sum();
    ones as f64 / (data.len() as f64 * 8.0)
}

/// Low-overhead quality tag computed inline with generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuickMetrics {
    /// Shannon entropy in bits/byte.
    pub entropy: f64,
    /// Proportion of 1-bits.
    pub ones_ratio: f64,
    /// `1 - 2·|ones_ratio - 0.5|`, 1.0 for perfect bit balance.
    pub uniformity_score: f64,
}

/// Entropy and bit balance only. Empty input scores zero entropy and zero
/// uniformity.
pub fn quick_metrics(data: &[u8]) -> QuickMetrics {
    if data.is_empty() {
        return QuickMetrics {
            entropy: 0.0,
            ones_ratio: 0.5,
            uniformity_score: 0.0,
        };
    }
    let ratio = ones_ratio(data);
    QuickMetrics {
        entropy: quick_shannon(data),
        ones_ratio: ratio,
        uniformity_score: 1.0 - 2.0 * (ratio - 0.5).abs(),
    }
}
