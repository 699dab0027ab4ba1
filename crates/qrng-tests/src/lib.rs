//! Statistical quality battery for byte streams.
//!
//! Five independent sub-tests score an arbitrary buffer: monobit frequency,
//! runs, byte-distribution chi-square, Shannon entropy and lag-1 serial
//! correlation. Each returns a [`TestResult`] with its statistic, the pass
//! threshold, a p-value where one is defined, and a letter grade (A through F).
//! A sub-test that cannot be evaluated yields an error marker instead and is
//! left out of the aggregate score.
//!
//! [`score`] runs all five and summarizes them in a [`QualityReport`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single sub-test that could be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub statistic: f64,
    pub threshold: f64,
    pub p_value: Option<f64>,
    pub grade: char,
    pub details: String,
    /// Additional named figures, e.g. min-entropy for the entropy test.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<(String, f64)>,
}

impl TestResult {
    /// Assign a letter grade based on p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Look up a named extra figure.
    pub fn extra(&self, key: &str) -> Option<f64> {
        self.extras.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}

/// Why a sub-test could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TestError {
    #[error("insufficient data: need {needed} bytes, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("sub-test panicked")]
    Panicked,
}

/// Outcome of one sub-test inside a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Completed(TestResult),
    Error { name: String, error: String },
}

impl TestOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Completed(r) => &r.name,
            Self::Error { name, .. } => name,
        }
    }

    pub fn result(&self) -> Option<&TestResult> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Qualitative label for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Assessment {
    Good,
    Fair,
    Poor,
}

impl Assessment {
    /// GOOD at 0.8 and above, FAIR at 0.6 and above, otherwise POOR.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Good
        } else if score >= 0.6 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Good => write!(f, "GOOD"),
            Self::Fair => write!(f, "FAIR"),
            Self::Poor => write!(f, "POOR"),
        }
    }
}

/// Result of [`score`].
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub tests: Vec<TestOutcome>,
    pub passed_count: usize,
    /// Sub-tests that completed; errored ones are excluded.
    pub total_count: usize,
    /// `passed_count / total_count`, or 0 when nothing completed.
    pub quality_score: f64,
    pub assessment: Assessment,
    pub data_size_bytes: usize,
    pub timestamp_ms: u64,
}

impl QualityReport {
    /// Find a sub-test outcome by name.
    pub fn outcome(&self, name: &str) -> Option<&TestOutcome> {
        self.tests.iter().find(|t| t.name() == name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Unpack a byte slice into individual bits (MSB first per byte).
fn to_bits(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(data.len() * 8);
    for &byte in data {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

fn require(data: &[u8], needed: usize) -> Result<(), TestError> {
    if data.len() < needed {
        return Err(TestError::InsufficientData {
            needed,
            got: data.len(),
        });
    }
    Ok(())
}

fn byte_counts(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

/// Upper-tail probability of a chi-square statistic.
fn chi2_sf(statistic: f64, df: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|d| d.sf(statistic))
}

/// Two-sided standard-normal tail probability of `z`.
fn two_sided_p(z: f64) -> Option<f64> {
    Normal::new(0.0, 1.0)
        .ok()
        .map(|n| 2.0 * n.sf(z.abs()))
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. FREQUENCY
// ═══════════════════════════════════════════════════════════════════════════════

pub const FREQUENCY_CRITICAL: f64 = 3.841;

/// Monobit frequency: chi-square of 1-bit vs 0-bit counts against 50/50, 1 df.
pub fn frequency_test(data: &[u8]) -> Result<TestResult, TestError> {
    require(data, 1)?;
    let n = data.len() as f64 * 8.0;
    let ones = data.iter().map(|b| b.count_ones() as f64).sum::<f64>();
    let zeros = n - ones;
    let expected = n / 2.0;
    let chi2 = ((ones - expected).powi(2) + (zeros - expected).powi(2)) / expected;
    let p = chi2_sf(chi2, 1.0);
    Ok(TestResult {
        name: "frequency".to_string(),
        passed: chi2 < FREQUENCY_CRITICAL,
        statistic: chi2,
        threshold: FREQUENCY_CRITICAL,
        p_value: p,
        grade: TestResult::grade_from_p(p),
        details: format!("ones={ones}, zeros={zeros}, ratio={:.6}", ones / n),
        extras: vec![("ones_ratio".to_string(), ones / n)],
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RUNS
// ═══════════════════════════════════════════════════════════════════════════════

pub const RUNS_CRITICAL_Z: f64 = 1.96;

/// Runs test: observed number of maximal equal-bit runs against the
/// expectation given the observed 1-bit proportion.
///
/// A zero variance (all bits identical) passes with z = 0.
pub fn runs_test(data: &[u8]) -> Result<TestResult, TestError> {
    require(data, 1)?;
    let bits = to_bits(data);
    let n = bits.len() as f64;
    let ones = bits.iter().filter(|&&b| b == 1).count() as f64;
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();

    let mix = ones * (n - ones);
    let expected = 2.0 * mix / n + 1.0;
    let variance = 2.0 * mix * (2.0 * mix - n) / (n * n * (n - 1.0));

    let (z, p, details) = if variance > 0.0 {
        let z = (runs as f64 - expected).abs() / variance.sqrt();
        (z, two_sided_p(z), format!("runs={runs}, expected={expected:.2}"))
    } else {
        (
            0.0,
            Some(1.0),
            format!("runs={runs}, zero variance (degenerate input)"),
        )
    };
    Ok(TestResult {
        name: "runs".to_string(),
        passed: z < RUNS_CRITICAL_Z,
        statistic: z,
        threshold: RUNS_CRITICAL_Z,
        p_value: p,
        grade: TestResult::grade_from_p(p),
        details,
        extras: vec![
            ("runs".to_string(), runs as f64),
            ("expected_runs".to_string(), expected),
        ],
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. BYTE DISTRIBUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// 95% critical value of chi-square with 255 degrees of freedom.
pub const CHI_SQUARE_CRITICAL: f64 = 293.25;

/// Chi-square of the byte-value histogram against uniform, 255 df.
pub fn chi_square_test(data: &[u8]) -> Result<TestResult, TestError> {
    require(data, 1)?;
    let expected = data.len() as f64 / 256.0;
    let chi2: f64 = byte_counts(data)
        .iter()
        .map(|&c| (c as f64 - expected).powi(2) / expected)
        .sum();
    let p = chi2_sf(chi2, 255.0);
    Ok(TestResult {
        name: "chi_square".to_string(),
        passed: chi2 < CHI_SQUARE_CRITICAL,
        statistic: chi2,
        threshold: CHI_SQUARE_CRITICAL,
        p_value: p,
        grade: TestResult::grade_from_p(p),
        details: format!("n={}, expected per bin={expected:.2}, df=255", data.len()),
        extras: vec![("degrees_of_freedom".to_string(), 255.0)],
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// 4. ENTROPY
// ═══════════════════════════════════════════════════════════════════════════════

pub const ENTROPY_THRESHOLD: f64 = 7.5;

/// Shannon entropy of the byte distribution in bits per byte; passes above 7.5.
///
/// Also reports min-entropy (−log2 of the most frequent value's probability)
/// and the ratio to the 8-bit maximum.
pub fn entropy_test(data: &[u8]) -> Result<TestResult, TestError> {
    require(data, 1)?;
    let n = data.len() as f64;
    let counts = byte_counts(data);
    let mut h = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.log2();
        }
    }
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let min_entropy = -(max_count as f64 / n).log2();
    let ratio = h / 8.0;
    let grade = match h {
        h if h > 7.9 => 'A',
        h if h > ENTROPY_THRESHOLD => 'B',
        h if h > 7.0 => 'C',
        h if h > 6.0 => 'D',
        _ => 'F',
    };
    Ok(TestResult {
        name: "entropy".to_string(),
        passed: h > ENTROPY_THRESHOLD,
        statistic: h,
        threshold: ENTROPY_THRESHOLD,
        p_value: None,
        grade,
        details: format!("H={h:.4}/8.0 bits, min-entropy={min_entropy:.4}, ratio={ratio:.4}"),
        extras: vec![
            ("max_entropy".to_string(), 8.0),
            ("min_entropy".to_string(), min_entropy),
            ("entropy_ratio".to_string(), ratio),
        ],
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// 5. SERIAL CORRELATION
// ═══════════════════════════════════════════════════════════════════════════════

pub const SERIAL_CORRELATION_LIMIT: f64 = 0.1;

/// Pearson correlation between the bytes and themselves shifted by one.
///
/// Constant input has no defined correlation; it is reported as 0.0 and
/// does not pass.
pub fn serial_correlation_test(data: &[u8]) -> Result<TestResult, TestError> {
    require(data, 2)?;
    let x = &data[..data.len() - 1];
    let y = &data[1..];
    let m = x.len() as f64;
    let mean_x = x.iter().map(|&b| b as f64).sum::<f64>() / m;
    let mean_y = y.iter().map(|&b| b as f64).sum::<f64>() / m;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let dx = a as f64 - mean_x;
        let dy = b as f64 - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();

    let (r, passed, p, details) = if denom > 0.0 {
        let r = sxy / denom;
        // under independence r is approximately N(0, 1/m)
        let p = two_sided_p(r * m.sqrt());
        (
            r,
            r.abs() < SERIAL_CORRELATION_LIMIT,
            p,
            format!("r={r:.6}, n={}", data.len()),
        )
    } else {
        (0.0, false, None, "zero variance (constant input)".to_string())
    };
    Ok(TestResult {
        name: "serial_correlation".to_string(),
        passed,
        statistic: r,
        threshold: SERIAL_CORRELATION_LIMIT,
        p_value: p,
        grade: TestResult::grade_from_p(p),
        details,
        extras: Vec::new(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Battery
// ═══════════════════════════════════════════════════════════════════════════════

pub type SubTest = fn(&[u8]) -> Result<TestResult, TestError>;

/// The five sub-tests in report order.
pub const SUB_TESTS: [(&str, SubTest); 5] = [
    ("frequency", frequency_test),
    ("runs", runs_test),
    ("chi_square", chi_square_test),
    ("entropy", entropy_test),
    ("serial_correlation", serial_correlation_test),
];

/// Run one sub-test, turning an error or a panic into an error marker.
fn run_isolated(name: &str, test: impl FnOnce() -> Result<TestResult, TestError>) -> TestOutcome {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(test))
        .unwrap_or(Err(TestError::Panicked));
    match outcome {
        Ok(result) => TestOutcome::Completed(result),
        Err(e) => {
            log::debug!("{name} test not evaluated: {e}");
            TestOutcome::Error {
                name: name.to_string(),
                error: e.to_string(),
            }
        }
    }
}

/// Run all five sub-tests on `data`.
pub fn run_all_tests(data: &[u8]) -> Vec<TestOutcome> {
    SUB_TESTS
        .iter()
        .map(|(name, test)| run_isolated(name, || test(data)))
        .collect()
}

/// Score `data` and summarize the five sub-tests.
pub fn score(data: &[u8]) -> QualityReport {
    let tests = run_all_tests(data);
    let total_count = tests.iter().filter(|t| !t.is_error()).count();
    let passed_count = tests
        .iter()
        .filter_map(TestOutcome::result)
        .filter(|r| r.passed)
        .count();
    let quality_score = if total_count > 0 {
        passed_count as f64 / total_count as f64
    } else {
        0.0
    };
    log::debug!(
        "validated {} bytes: {passed_count}/{total_count} passed",
        data.len()
    );
    QualityReport {
        tests,
        passed_count,
        total_count,
        quality_score,
        assessment: Assessment::from_score(quality_score),
        data_size_bytes: data.len(),
        timestamp_ms: unix_ms_now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate pseudo-random data for testing (simple LCG).
    fn pseudo_random(n: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(n);
        let mut state: u64 = 0xDEAD_BEEF_CAFE_BABE;
        for _ in 0..n {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            data.push((state >> 33) as u8);
        }
        data
    }

    fn all_byte_values() -> Vec<u8> {
        (0..=255u8).collect()
    }

    #[test]
    fn test_to_bits() {
        let data = [0b10110001u8];
        let bits = to_bits(&data);
        assert_eq!(bits, vec![1, 0, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_grade_from_p() {
        assert_eq!(TestResult::grade_from_p(Some(0.5)), 'A');
        assert_eq!(TestResult::grade_from_p(Some(0.05)), 'B');
        assert_eq!(TestResult::grade_from_p(Some(0.005)), 'C');
        assert_eq!(TestResult::grade_from_p(Some(0.0005)), 'D');
        assert_eq!(TestResult::grade_from_p(Some(0.00000001)), 'F');
        assert_eq!(TestResult::grade_from_p(None), 'F');
    }

    #[test]
    fn test_frequency_all_zero_fails() {
        let r = frequency_test(&[0u8; 1000]).unwrap();
        // 8000 zeros: chi = (4000² + 4000²) / 4000 = 8000
        assert!((r.statistic - 8000.0).abs() < 1e-9);
        assert!(!r.passed);
        assert_eq!(r.grade, 'F');
    }

    #[test]
    fn test_frequency_balanced_passes() {
        let r = frequency_test(&[0x55; 100]).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(r.passed);
        assert_eq!(r.extra("ones_ratio"), Some(0.5));
    }

    #[test]
    fn test_runs_alternating_fails() {
        // 0x55 = 01010101: every bit starts a new run
        let r = runs_test(&[0x55; 100]).unwrap();
        assert_eq!(r.extra("runs"), Some(800.0));
        assert!((r.extra("expected_runs").unwrap() - 401.0).abs() < 1e-9);
        assert!(!r.passed);
    }

    #[test]
    fn test_runs_constant_is_degenerate_pass() {
        let r = runs_test(&[0u8; 64]).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(r.passed);
        assert!(r.details.contains("zero variance"));
    }

    #[test]
    fn test_chi_square_uniform_histogram() {
        let r = chi_square_test(&all_byte_values()).unwrap();
        assert!(r.statistic.abs() < 1e-9);
        assert!(r.passed);
    }

    #[test]
    fn test_chi_square_constant_fails() {
        let r = chi_square_test(&[7u8; 2560]).unwrap();
        assert!(!r.passed);
    }

    #[test]
    fn test_entropy_extremes() {
        let zero = entropy_test(&[0u8; 1000]).unwrap();
        assert!(zero.statistic.abs() < 1e-12);
        assert!(!zero.passed);

        let full = entropy_test(&all_byte_values()).unwrap();
        assert!((full.statistic - 8.0).abs() < 1e-9);
        assert!((full.extra("min_entropy").unwrap() - 8.0).abs() < 1e-9);
        assert!((full.extra("entropy_ratio").unwrap() - 1.0).abs() < 1e-9);
        assert!(full.passed);
        assert_eq!(full.grade, 'A');
    }

    #[test]
    fn test_serial_correlation_needs_two_bytes() {
        assert_eq!(
            serial_correlation_test(&[1]),
            Err(TestError::InsufficientData { needed: 2, got: 1 })
        );
    }

    #[test]
    fn test_serial_correlation_constant_input() {
        let r = serial_correlation_test(&[42u8; 100]).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(!r.passed);
        assert_eq!(r.p_value, None);
    }

    #[test]
    fn test_serial_correlation_ramp_fails() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 256) as u8).collect();
        let r = serial_correlation_test(&data).unwrap();
        assert!(r.statistic > 0.9);
        assert!(!r.passed);
    }

    #[test]
    fn test_pseudo_random_scores_well() {
        let report = score(&pseudo_random(100_000));
        assert_eq!(report.total_count, 5);
        assert!(report.quality_score >= 0.6, "score {}", report.quality_score);
        let entropy = report.outcome("entropy").and_then(TestOutcome::result).unwrap();
        assert!(entropy.passed);
        let serial = report
            .outcome("serial_correlation")
            .and_then(TestOutcome::result)
            .unwrap();
        assert!(serial.passed);
    }

    #[test]
    fn test_constant_data_is_poor() {
        let report = score(&[0u8; 1000]);
        assert_eq!(report.total_count, 5);
        // only the degenerate runs test passes
        assert_eq!(report.passed_count, 1);
        assert_eq!(report.assessment, Assessment::Poor);
    }

    #[test]
    fn test_empty_input_all_errors() {
        let report = score(&[]);
        assert_eq!(report.tests.len(), 5);
        assert!(report.tests.iter().all(TestOutcome::is_error));
        assert_eq!(report.total_count, 0);
        assert_eq!(report.quality_score, 0.0);
        assert_eq!(report.assessment, Assessment::Poor);
    }

    #[test]
    fn test_single_byte_excludes_serial_correlation() {
        let report = score(&[0xA5]);
        assert!(report.outcome("serial_correlation").unwrap().is_error());
        assert_eq!(report.total_count, 4);
        assert!(report.passed_count <= report.total_count);
    }

    #[test]
    fn test_panicking_sub_test_becomes_error_marker() {
        let outcome = run_isolated("boom", || panic!("sub-test blew up"));
        assert_eq!(
            outcome,
            TestOutcome::Error {
                name: "boom".to_string(),
                error: TestError::Panicked.to_string(),
            }
        );
    }

    #[test]
    fn test_assessment_thresholds() {
        assert_eq!(Assessment::from_score(1.0), Assessment::Good);
        assert_eq!(Assessment::from_score(0.8), Assessment::Good);
        assert_eq!(Assessment::from_score(0.6), Assessment::Fair);
        assert_eq!(Assessment::from_score(0.59), Assessment::Poor);
    }

    #[test]
    fn test_report_serializes() {
        let report = score(&all_byte_values());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["data_size_bytes"], 256);
        assert_eq!(json["tests"][0]["status"], "completed");
        assert_eq!(json["tests"][0]["name"], "frequency");
        assert!(json["assessment"].is_string());
    }

    #[test]
    fn test_score_invariants() {
        for data in [vec![], vec![1], vec![0; 10], pseudo_random(1000)] {
            let report = score(&data);
            assert!(report.passed_count <= report.total_count);
            assert!((0.0..=1.0).contains(&report.quality_score));
        }
    }
}
