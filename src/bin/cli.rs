//! CLI application for facial expression classification.
//!
//! Usage:
//!   face-emotion --image face.jpg --model emotion_model.bin
//!   face-emotion --image face.jpg --model emotion_model.bin.bz2 --pretty
//!   face-emotion --image face.jpg --model emotion_model.bin -o result.json
//!
//! Stdout carries only the JSON result; diagnostics go to stderr.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use clap::Parser;
use face_emotion::{classify_files_with, ClassificationResult, Report, SeetaLocalizer};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "face-emotion")]
#[command(author, version, about = "Facial expression classification", long_about = None)]
struct Args {
    /// Input image file
    #[arg(long)]
    image: PathBuf,

    /// Trained classifier weights (raw or .bz2)
    #[arg(long)]
    model: PathBuf,

    /// Face detector model path
    #[arg(long, env = "FACE_EMOTION_DETECTOR", default_value = "seeta_fd_frontal_v1.0.bin")]
    detector: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,

    /// Show debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let report = match panic::catch_unwind(AssertUnwindSafe(|| classify(&args))) {
        Ok(report) => report,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("classification panicked: {message}");
            Report::failure(format!("internal error: {message}"))
        }
    };

    if let Err(e) = write_result(&args, &report.result) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    std::process::exit(report.exit_code());
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn classify(args: &Args) -> Report {
    debug!(
        "classifying {} with weights {}",
        args.image.display(),
        args.model.display()
    );
    classify_files_with(&args.image, &args.model, || {
        debug!("loading face detector from {}", args.detector.display());
        SeetaLocalizer::shared(&args.detector)
    })
}

fn write_result(
    args: &Args,
    result: &ClassificationResult,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, format!("{json}\n"))?;
        debug!("result written to {}", path.display());
    } else {
        println!("{}", json);
    }
    Ok(())
}
