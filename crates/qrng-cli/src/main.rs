//! CLI for qrng: serve, generate and validate simulated quantum entropy.

mod commands;

use clap::{Parser, Subcommand};

use commands::GeneratorArgs;

#[derive(Parser)]
#[command(name = "qrng")]
#[command(about = "qrng: simulated quantum noise, debiased, buffered and monitored")]
#[command(version = qrng_core::VERSION)]
struct Cli {
    #[command(flatten)]
    generator: GeneratorArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8042")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Write random bytes to stdout
    Generate {
        /// Number of bytes
        #[arg(long, default_value = "32")]
        bytes: usize,

        /// Output format
        #[arg(long, default_value = "hex", value_parser = ["hex", "raw"])]
        format: String,
    },

    /// Run the five-test quality battery on generated data or a file
    Validate {
        /// Bytes to generate (ignored with --file)
        #[arg(long, default_value = "1048576")]
        bytes: usize,

        /// Validate the contents of this file instead
        #[arg(long, conflicts_with = "bytes")]
        file: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Warm up a generator and print its status and health
    Status {
        /// Milliseconds to let the producer fill the buffer
        #[arg(long, default_value = "500")]
        warmup_ms: u64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match cli.generator.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(&config, &host, port),
        Commands::Generate { bytes, format } => commands::generate::run(&config, bytes, &format),
        Commands::Validate { bytes, file, json } => {
            commands::validate::run(&config, bytes, file.as_deref(), json)
        }
        Commands::Status { warmup_ms, json } => commands::status::run(&config, warmup_ms, json),
    }
}
