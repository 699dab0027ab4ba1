use std::io::Write;

use qrng_core::GeneratorConfig;

pub fn run(config: &GeneratorConfig, n_bytes: usize, format: &str) {
    let generator = super::make_generator(config);
    let data = generator.generate(n_bytes);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = match format {
        "raw" => out.write_all(&data),
        _ => {
            let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "{hex}")
        }
    };
    if let Err(e) = written.and_then(|_| out.flush()) {
        // broken pipe is not worth a message
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            eprintln!("Failed to write output: {e}");
            std::process::exit(1);
        }
    }
}
