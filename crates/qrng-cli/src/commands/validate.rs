use std::time::Instant;

use qrng_core::GeneratorConfig;
use qrng_tests::{QualityReport, TestOutcome};

pub fn run(config: &GeneratorConfig, n_bytes: usize, file: Option<&str>, json: bool) {
    let (data, origin) = match file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => (data, path.to_string()),
            Err(e) => {
                eprintln!("Failed to read {path}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            let generator = super::make_generator(config);
            let t0 = Instant::now();
            let data = generator.generate(n_bytes);
            log::info!(
                "generated {} bytes in {:.3}s",
                data.len(),
                t0.elapsed().as_secs_f64()
            );
            (data, "fpga".to_string())
        }
    };

    let report = qrng_tests::score(&data);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_report(&origin, &report);
    }
}

fn print_report(origin: &str, report: &QualityReport) {
    println!(
        "Quality battery on {} bytes from {origin}\n",
        report.data_size_bytes
    );
    println!(
        "  {:<20} {:>6} {:>14} {:>10} {:>6}",
        "Test", "Result", "Statistic", "Threshold", "Grade"
    );
    println!("  {}", "-".repeat(60));
    for outcome in &report.tests {
        match outcome {
            TestOutcome::Completed(r) => println!(
                "  {:<20} {:>6} {:>14.4} {:>10.3} {:>6}",
                r.name,
                if r.passed { "PASS" } else { "FAIL" },
                r.statistic,
                r.threshold,
                r.grade
            ),
            TestOutcome::Error { name, error } => println!("  {name:<20} {:>6}  {error}", "ERROR"),
        }
    }
    println!("  {}", "-".repeat(60));
    println!(
        "  {}/{} passed, score {:.2} → {}",
        report.passed_count, report.total_count, report.quality_score, report.assessment
    );
}
