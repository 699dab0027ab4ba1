use std::sync::Arc;

use qrng_core::{GeneratorConfig, MetricsAggregator};
use qrng_server::AppState;

pub fn run(config: &GeneratorConfig, host: &str, port: u16) {
    let generator = Arc::new(super::make_generator(config));
    let metrics = match MetricsAggregator::from_config(config) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Failed to create metrics aggregator: {e}");
            std::process::exit(2);
        }
    };
    generator.start();
    metrics.start();

    let base = format!("http://{host}:{port}");
    println!("QRNG Server v{}", qrng_core::VERSION);
    println!("   {base}");
    println!(
        "   buffer {} bytes, target {} Mbps",
        config.buffer_capacity, config.target_throughput_mbps
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                   API index (try: curl {base})");
    println!("     POST /api/v1/random      Random bytes {{size_bytes, source, format}}");
    println!("     POST /api/v1/validate    Statistical test battery {{size_bytes}}");
    println!("     POST /api/v1/quality     Quick quality metrics {{size_bytes}}");
    println!("     GET  /api/v1/stats       Performance statistics");
    println!("     GET  /api/v1/throughput  Recent throughput history");
    println!("     GET  /api/v1/health      Health score");
    println!("     GET  /api/v1/status      Generator status");
    println!();
    println!("   Example:");
    println!(
        "     curl -X POST -H 'content-type: application/json' -d '{{\"size_bytes\":32,\"format\":\"uint8\"}}' {base}/api/v1/random"
    );
    println!();
    println!("   Simulated noise. Not for cryptographic keys.");
    println!();

    let state = Arc::new(AppState::new(generator.clone(), metrics.clone()));
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };
    let result = rt.block_on(qrng_server::run_server(state, host, port));

    generator.stop();
    metrics.stop();
    if let Err(e) = result {
        eprintln!("Server error on {host}:{port}: {e}");
        std::process::exit(1);
    }
}
