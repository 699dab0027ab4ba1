//! Generate a few requests, record them, and print the resulting metrics.
//!
//! Run: `cargo run --example basic`

use std::time::Instant;

use qrng_core::{GeneratorConfig, MetricsAggregator, QuantumGenerator, quick_metrics};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GeneratorConfig::default();
    let generator = QuantumGenerator::spawn(&config)?;
    let metrics = MetricsAggregator::new(config.metrics_history_size, config.target_throughput_mbps)?;

    for size in [32, 256, 4096, 65_536] {
        let start = Instant::now();
        let bytes = generator.generate(size);
        metrics.record_generation(bytes.len(), start.elapsed().as_secs_f64(), "fpga");

        let q = quick_metrics(&bytes);
        metrics.record_quality(q.entropy, q.uniformity_score, 0.0);
        println!(
            "{size:>6} bytes  entropy {:.3} bits/byte  ones {:.4}",
            q.entropy, q.ones_ratio
        );
    }

    metrics.refresh();
    let stats = metrics.get_statistics();
    let rt = stats.real_time_metrics;
    println!();
    println!("requests:        {}", rt.total_requests);
    println!("bytes:           {}", rt.total_bytes_generated);
    println!("avg throughput:  {:.2} Mbps", rt.average_throughput_mbps);
    println!("avg latency:     {:.2} ms", rt.average_latency_ms);

    let health = metrics.get_health();
    println!(
        "health:          {} ({:.2})",
        health.status, health.overall_health_score
    );

    let status = generator.status();
    println!(
        "buffer:          {}/{} bytes, {} hits / {} misses",
        status.buffer_level_bytes,
        status.buffer_capacity_bytes,
        status.stats.buffer_hits,
        status.stats.buffer_misses
    );

    generator.stop();
    Ok(())
}
