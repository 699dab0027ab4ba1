//! HTTP front end for the entropy pipeline.
//!
//! Thin JSON layer over [`QuantumGenerator`], [`MetricsAggregator`] and the
//! `qrng-tests` battery. Generation may sleep for throughput pacing, so it
//! always runs on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use qrng_core::conditioning::{QuickMetrics, quick_metrics};
use qrng_core::generator::SOURCE_LABEL;
use qrng_core::metrics::{HealthSnapshot, StatisticsSnapshot, ThroughputWindow};
use qrng_core::source::expect_len;
use qrng_core::{
    EntropySource, GeneratorStatus, MetricsAggregator, QuantumGenerator, SourceError, unix_ms_now,
};
use qrng_tests::QualityReport;

/// Largest `/api/v1/random` request.
pub const MAX_RANDOM_BYTES: usize = 65_536;
/// Largest `/api/v1/validate` and `/api/v1/quality` request.
pub const MAX_VALIDATE_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_RANDOM_BYTES: usize = 32;
const DEFAULT_VALIDATE_BYTES: usize = 1024 * 1024;
const DEFAULT_QUALITY_BYTES: usize = 1024;

/// Shared server state.
pub struct AppState {
    generator: Arc<QuantumGenerator>,
    metrics: Arc<MetricsAggregator>,
    sources: BTreeMap<&'static str, Arc<dyn EntropySource>>,
}

impl AppState {
    /// State with the generator registered as the `"fpga"` source.
    pub fn new(generator: Arc<QuantumGenerator>, metrics: Arc<MetricsAggregator>) -> Self {
        let mut sources: BTreeMap<&'static str, Arc<dyn EntropySource>> = BTreeMap::new();
        sources.insert(SOURCE_LABEL, generator.clone());
        Self {
            generator,
            metrics,
            sources,
        }
    }

    /// Make another source selectable via `"source"` in random requests.
    pub fn register_source(&mut self, source: Arc<dyn EntropySource>) {
        log::info!("registered entropy source {}", source.name());
        self.sources.insert(source.name(), source);
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.keys().copied().collect()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn check_size(size: usize, max: usize) -> Result<(), ApiError> {
    if size == 0 || size > max {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("size_bytes must be between 1 and {max}, got {size}"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    #[default]
    Hex,
    Uint8,
    Uint16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RandomRequest {
    size_bytes: usize,
    source: String,
    format: String,
}

impl Default for RandomRequest {
    fn default() -> Self {
        Self {
            size_bytes: DEFAULT_RANDOM_BYTES,
            source: SOURCE_LABEL.to_string(),
            format: "hex".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RandomResponse {
    data: serde_json::Value,
    format: OutputFormat,
    size_bytes: usize,
    source: String,
    generation_time_ms: f64,
    quality: QuickMetrics,
    timestamp_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SizeRequest {
    size_bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    report: QualityReport,
    generation_time_ms: f64,
}

#[derive(Debug, Serialize)]
struct QualityResponse {
    size_bytes: usize,
    metrics: QuickMetrics,
    generation_time_ms: f64,
    timestamp_ms: u64,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    generator: GeneratorStatus,
    sources: Vec<&'static str>,
    timestamp_ms: u64,
}

/// Encode bytes as a hex string or a JSON array of integers.
///
/// `uint16` reads little-endian pairs; a trailing odd byte is dropped.
fn encode(bytes: &[u8], format: OutputFormat) -> serde_json::Value {
    match format {
        OutputFormat::Hex => {
            serde_json::Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }
        OutputFormat::Uint8 => bytes.iter().map(|&b| serde_json::Value::from(b)).collect(),
        OutputFormat::Uint16 => bytes
            .chunks_exact(2)
            .map(|c| serde_json::Value::from(u16::from_le_bytes([c[0], c[1]])))
            .collect(),
    }
}

fn source_error_status(e: &SourceError) -> StatusCode {
    match e {
        SourceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SourceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        SourceError::ShortRead { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// Fetch `size` bytes from `source` on the blocking pool. Returns the bytes
/// and the elapsed seconds.
async fn fetch_blocking(
    source: Arc<dyn EntropySource>,
    size: usize,
) -> Result<(Result<Vec<u8>, SourceError>, f64), ApiError> {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let fetched = source
            .fetch(size)
            .and_then(|bytes| expect_len(source.name(), bytes, size));
        (fetched, start.elapsed().as_secs_f64())
    })
    .await
    .map_err(|e| {
        log::error!("generation task failed: {e}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "generation task failed")
    })
}

/// Generate from the local device, record the event, and return the bytes.
async fn generate_recorded(state: &AppState, size: usize) -> Result<(Vec<u8>, f64), ApiError> {
    let (fetched, secs) = fetch_blocking(state.generator.clone(), size).await?;
    let bytes = fetched.map_err(|e| {
        log::warn!("source {SOURCE_LABEL} failed: {e}");
        state.metrics.record_error(SOURCE_LABEL);
        api_error(source_error_status(&e), e.to_string())
    })?;
    state.metrics.record_generation(bytes.len(), secs, SOURCE_LABEL);
    Ok((bytes, secs))
}

async fn handle_random(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RandomRequest>,
) -> ApiResult<RandomResponse> {
    check_size(req.size_bytes, MAX_RANDOM_BYTES)?;
    let format: OutputFormat =
        serde_json::from_value(serde_json::Value::String(req.format.clone())).map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("unknown format {:?}; use hex, uint8 or uint16", req.format),
            )
        })?;
    let source = state.sources.get(req.source.as_str()).cloned().ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "unknown source {:?}; available: {}",
                req.source,
                state.source_names().join(", ")
            ),
        )
    })?;
    let label = source.name();
    if !source.is_available() {
        log::warn!("source {label} is unavailable");
        state.metrics.record_error(label);
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("source {label} is unavailable"),
        ));
    }

    let (fetched, secs) = fetch_blocking(source, req.size_bytes).await?;
    let bytes = match fetched {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("source {label} failed: {e}");
            state.metrics.record_error(label);
            return Err(api_error(source_error_status(&e), e.to_string()));
        }
    };
    state.metrics.record_generation(bytes.len(), secs, label);

    Ok(Json(RandomResponse {
        data: encode(&bytes, format),
        format,
        size_bytes: bytes.len(),
        source: label.to_string(),
        generation_time_ms: secs * 1000.0,
        quality: quick_metrics(&bytes),
        timestamp_ms: unix_ms_now(),
    }))
}

async fn handle_validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SizeRequest>,
) -> ApiResult<ValidateResponse> {
    let size = req.size_bytes.unwrap_or(DEFAULT_VALIDATE_BYTES);
    check_size(size, MAX_VALIDATE_BYTES)?;
    let (bytes, secs) = generate_recorded(&state, size).await?;

    let report = tokio::task::spawn_blocking(move || qrng_tests::score(&bytes))
        .await
        .map_err(|e| {
            log::error!("validation task failed: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "validation task failed")
        })?;

    let stat = |name: &str| {
        report
            .outcome(name)
            .and_then(|o| o.result())
            .map(|r| r.statistic)
    };
    let entropy = stat("entropy").unwrap_or(0.0);
    let correlation = stat("serial_correlation").unwrap_or(0.0);
    let uniformity = report
        .outcome("frequency")
        .and_then(|o| o.result())
        .and_then(|r| r.extra("ones_ratio"))
        .map(|ratio| 1.0 - 2.0 * (ratio - 0.5).abs())
        .unwrap_or(0.0);
    state.metrics.record_quality(entropy, uniformity, correlation);

    Ok(Json(ValidateResponse {
        report,
        generation_time_ms: secs * 1000.0,
    }))
}

async fn handle_quality(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SizeRequest>,
) -> ApiResult<QualityResponse> {
    let size = req.size_bytes.unwrap_or(DEFAULT_QUALITY_BYTES);
    check_size(size, MAX_VALIDATE_BYTES)?;
    let (bytes, secs) = generate_recorded(&state, size).await?;
    Ok(Json(QualityResponse {
        size_bytes: bytes.len(),
        metrics: quick_metrics(&bytes),
        generation_time_ms: secs * 1000.0,
        timestamp_ms: unix_ms_now(),
    }))
}

async fn handle_stats(State(state): State<Arc<AppState>>) -> Json<StatisticsSnapshot> {
    Json(state.metrics.get_statistics())
}

async fn handle_throughput(State(state): State<Arc<AppState>>) -> Json<ThroughputWindow> {
    Json(state.metrics.get_throughput_window())
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthSnapshot> {
    Json(state.metrics.get_health())
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: qrng_core::VERSION,
        generator: state.generator.status(),
        sources: state.source_names(),
        timestamp_ms: unix_ms_now(),
    })
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "QRNG Server",
        "version": qrng_core::VERSION,
        "sources": state.source_names(),
        "notice": "Simulated quantum noise. Not suitable for cryptographic keys.",
        "endpoints": {
            "/": "This API index",
            "/api/v1/random": {
                "method": "POST",
                "description": "Get random bytes",
                "body": {
                    "size_bytes": format!("Number of bytes (1-{MAX_RANDOM_BYTES}, default: {DEFAULT_RANDOM_BYTES})"),
                    "source": format!("Source name (default: {SOURCE_LABEL})"),
                    "format": "hex, uint8 or uint16 (default: hex)",
                }
            },
            "/api/v1/validate": {
                "method": "POST",
                "description": "Generate and run the statistical test battery",
                "body": { "size_bytes": format!("1-{MAX_VALIDATE_BYTES}, default: {DEFAULT_VALIDATE_BYTES}") }
            },
            "/api/v1/quality": {
                "method": "POST",
                "description": "Generate and compute quick quality metrics",
                "body": { "size_bytes": format!("1-{MAX_VALIDATE_BYTES}, default: {DEFAULT_QUALITY_BYTES}") }
            },
            "/api/v1/stats": "Performance statistics",
            "/api/v1/throughput": "Recent throughput history",
            "/api/v1/health": "Health score and status",
            "/api/v1/status": "Generator status",
        }
    }))
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/v1/random", post(handle_random))
        .route("/api/v1/validate", post(handle_validate))
        .route("/api/v1/quality", post(handle_quality))
        .route("/api/v1/stats", get(handle_stats))
        .route("/api/v1/throughput", get(handle_throughput))
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .with_state(state)
}

/// Run the HTTP server until it fails.
pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("QRNG server listening on http://{addr}");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use qrng_core::{GeneratorConfig, SourceCategory, SourceInfo};
    use tower::ServiceExt;

    struct OfflineSource;

    static OFFLINE_INFO: SourceInfo = SourceInfo {
        name: "anu",
        description: "Remote quantum API that is always down",
        category: SourceCategory::Remote,
    };

    impl EntropySource for OfflineSource {
        fn info(&self) -> &SourceInfo {
            &OFFLINE_INFO
        }

        fn fetch(&self, _n_bytes: usize) -> Result<Vec<u8>, SourceError> {
            Err(SourceError::Unavailable {
                source_name: "anu".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct DisabledSource;

    static DISABLED_INFO: SourceInfo = SourceInfo {
        name: "disabled",
        description: "Source that reports itself unavailable",
        category: SourceCategory::Remote,
    };

    impl EntropySource for DisabledSource {
        fn info(&self) -> &SourceInfo {
            &DISABLED_INFO
        }

        fn is_available(&self) -> bool {
            false
        }

        fn fetch(&self, n_bytes: usize) -> Result<Vec<u8>, SourceError> {
            Ok(vec![0; n_bytes])
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = GeneratorConfig {
            buffer_capacity: 4096,
            target_throughput_mbps: 100_000.0,
            ..GeneratorConfig::default()
        };
        let generator = Arc::new(QuantumGenerator::new(&config).unwrap());
        let metrics = Arc::new(MetricsAggregator::from_config(&config).unwrap());
        let mut state = AppState::new(generator, metrics);
        state.register_source(Arc::new(OfflineSource));
        state.register_source(Arc::new(DisabledSource));
        Arc::new(state)
    }

    async fn post(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let app = build_router(test_state());
        let (status, body) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], qrng_core::VERSION);
        assert!(body["endpoints"]["/api/v1/random"].is_object());
        assert_eq!(body["sources"], serde_json::json!(["anu", "disabled", "fpga"]));
    }

    #[tokio::test]
    async fn random_defaults_to_32_hex_bytes() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, body) = post(app, "/api/v1/random", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["format"], "hex");
        assert_eq!(body["source"], "fpga");
        assert_eq!(body["data"].as_str().unwrap().len(), 64);

        let stats = state.metrics.get_statistics();
        assert_eq!(stats.real_time_metrics.total_requests, 1);
        assert_eq!(stats.source_statistics["fpga"].bytes_generated, 32);
    }

    #[tokio::test]
    async fn random_integer_formats() {
        let app = build_router(test_state());
        let (status, body) = post(
            app.clone(),
            "/api/v1/random",
            serde_json::json!({"size_bytes": 16, "format": "uint8"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let values = body["data"].as_array().unwrap();
        assert_eq!(values.len(), 16);
        assert!(values.iter().all(|v| v.as_u64().unwrap() <= 255));

        let (status, body) = post(
            app,
            "/api/v1/random",
            serde_json::json!({"size_bytes": 16, "format": "uint16"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn random_rejects_bad_requests() {
        let app = build_router(test_state());
        for body in [
            serde_json::json!({"size_bytes": 0}),
            serde_json::json!({"size_bytes": MAX_RANDOM_BYTES + 1}),
            serde_json::json!({"format": "base64"}),
            serde_json::json!({"source": "nope"}),
        ] {
            let (status, json) = post(app.clone(), "/api/v1/random", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(json["error"].is_string());
        }
    }

    #[tokio::test]
    async fn failing_source_is_recorded_as_error() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, body) = post(
            app,
            "/api/v1/random",
            serde_json::json!({"source": "anu"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("anu"));

        let stats = state.metrics.get_statistics();
        assert_eq!(stats.source_statistics["anu"].error_count, 1);
        assert_eq!(stats.real_time_metrics.total_requests, 0);
    }

    #[tokio::test]
    async fn unavailable_source_is_not_fetched() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, body) = post(
            app,
            "/api/v1/random",
            serde_json::json!({"source": "disabled", "size_bytes": 8}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("unavailable"));

        let stats = state.metrics.get_statistics();
        assert_eq!(stats.source_statistics["disabled"].error_count, 1);
        assert_eq!(stats.real_time_metrics.total_requests, 0);
    }

    #[tokio::test]
    async fn validate_scores_and_records_quality() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, body) = post(
            app,
            "/api/v1/validate",
            serde_json::json!({"size_bytes": 65_536}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let report = &body["report"];
        assert_eq!(report["data_size_bytes"], 65_536);
        assert_eq!(report["total_count"], 5);
        assert_eq!(report["tests"].as_array().unwrap().len(), 5);

        let quality = state.metrics.get_statistics().quality_metrics;
        assert_eq!(quality.sample_count, 1);
        assert!(quality.entropy.unwrap().current > 7.9);
    }

    #[tokio::test]
    async fn validate_rejects_oversized() {
        let app = build_router(test_state());
        let (status, _) = post(
            app,
            "/api/v1/validate",
            serde_json::json!({"size_bytes": MAX_VALIDATE_BYTES + 1}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn quality_returns_quick_metrics() {
        let app = build_router(test_state());
        let (status, body) = post(
            app,
            "/api/v1/quality",
            serde_json::json!({"size_bytes": 4096}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["size_bytes"], 4096);
        assert!(body["metrics"]["entropy"].as_f64().unwrap() > 7.0);
    }

    #[tokio::test]
    async fn monitoring_endpoints_respond() {
        let state = test_state();
        state.metrics.record_generation(1000, 0.01, "fpga");
        state.metrics.refresh();
        let app = build_router(state);

        let (status, stats) = get_json(app.clone(), "/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["real_time_metrics"]["total_requests"], 1);

        let (status, window) = get_json(app.clone(), "/api/v1/throughput").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(window["historical_data"].as_array().unwrap().len(), 1);

        let (status, health) = get_json(app.clone(), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(health["status"].is_string());
        assert_eq!(health["is_active"], true);

        let (status, status_body) = get_json(app, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(status_body["generator"]["buffer_capacity_bytes"], 4096);
        assert_eq!(status_body["generator"]["running"], false);
    }

    #[test]
    fn encode_formats() {
        assert_eq!(encode(&[0x00, 0xff], OutputFormat::Hex), "00ff");
        assert_eq!(encode(&[1, 2, 3], OutputFormat::Uint8), serde_json::json!([1, 2, 3]));
        // little-endian pairs, trailing odd byte dropped
        assert_eq!(
            encode(&[0x01, 0x02, 0x03], OutputFormat::Uint16),
            serde_json::json!([0x0201])
        );
    }
}
