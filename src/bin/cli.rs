//! StrataKV CLI
//!
//! Interactive prompt or command-script runner for the storage engine.

use std::path::PathBuf;

use clap::Parser;
use stratakv::command::Interpreter;
use stratakv::{Config, Database};
use tracing_subscriber::{fmt, EnvFilter};

/// StrataKV CLI
#[derive(Parser, Debug)]
#[command(name = "stratakv-cli")]
#[command(about = "Indexed-sequential key-value storage engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./stratakv_data")]
    data_dir: PathBuf,

    /// Command script to run instead of the interactive prompt
    script: Option<PathBuf>,

    /// Delete the area files under the data directory and exit
    #[arg(long)]
    clean: bool,

    /// Overflow fill ratio that triggers reorganisation (GAMMA)
    #[arg(long, default_value_t = 0.75)]
    reorganise_threshold: f64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stratakv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if args.clean {
        if let Err(e) = Database::delete_files(&args.data_dir) {
            tracing::error!("Failed to delete area files: {}", e);
            std::process::exit(1);
        }
        tracing::info!("Area files removed from {}", args.data_dir.display());
        return;
    }

    tracing::info!("StrataKV v{}", stratakv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .reorganise_threshold(args.reorganise_threshold)
        .build();

    let db = match Database::open(config) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut interpreter = Interpreter::new(db);
    let result = match &args.script {
        Some(path) => interpreter.run_script(path),
        None => interpreter.run_interactive(),
    };

    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = interpreter.close() {
        tracing::error!("Failed to close database: {}", e);
        std::process::exit(1);
    }
}
