use std::time::{Duration, Instant};

use qrng_core::{GeneratorConfig, MetricsAggregator};

pub fn run(config: &GeneratorConfig, warmup_ms: u64, json: bool) {
    let generator = super::make_generator(config);
    let metrics = match MetricsAggregator::from_config(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to create metrics aggregator: {e}");
            std::process::exit(2);
        }
    };

    generator.start();
    std::thread::sleep(Duration::from_millis(warmup_ms));

    // one probe request so the health figures have something to report
    let t0 = Instant::now();
    let sample = generator.generate(1024);
    metrics.record_generation(sample.len(), t0.elapsed().as_secs_f64(), "fpga");
    let q = qrng_core::quick_metrics(&sample);
    metrics.record_quality(q.entropy, q.uniformity_score, 0.0);
    metrics.refresh();

    let status = generator.status();
    let health = metrics.get_health();
    generator.stop();

    if json {
        let value = serde_json::json!({ "generator": status, "health": health });
        match serde_json::to_string_pretty(&value) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize status: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("QRNG v{}", qrng_core::VERSION);
    println!(
        "  buffer       {}/{} bytes ({:.1}%)",
        status.buffer_level_bytes,
        status.buffer_capacity_bytes,
        status.buffer_utilization * 100.0
    );
    println!("  target       {} Mbps", status.target_throughput_mbps);
    println!(
        "  noise        thermal {} shot {} interference {}",
        status.noise.thermal_noise_level,
        status.noise.shot_noise_factor,
        if status.noise.interference { "on" } else { "off" }
    );
    println!(
        "  requests     {} ({} hits, {} misses)",
        status.stats.generation_requests, status.stats.buffer_hits, status.stats.buffer_misses
    );
    println!(
        "  health       {} ({:.2})  throughput {:.2}  latency {:.2}  quality {:.2}",
        health.status,
        health.overall_health_score,
        health.health_indicators.throughput_health,
        health.health_indicators.latency_health,
        health.health_indicators.quality_health
    );
}
