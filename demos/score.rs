use clap::{Parser, Subcommand};
use ridgescore::{AnalysisConfig, Ensemble, FingerprintImage, QualityEngine};
use std::fs;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to an ensemble model file; the embedded default is used when absent
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Expected SHA-256 hash of the model file (required with --model)
    #[arg(long = "model-hash")]
    model_hash: Option<String>,

    /// Log file path
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a raw 8-bit grayscale image file
    Raw {
        /// Path to the raw pixel file (width * height bytes)
        #[arg(short = 'f', long)]
        file: String,

        #[arg(long)]
        width: u32,

        #[arg(long)]
        height: u32,

        /// Capture resolution in dots per inch
        #[arg(long, default_value_t = 500)]
        ppi: u16,
    },
}

fn initialize_logging(log_file: Option<String>) {
    let console_writer = std::io::stdout.with_max_level(tracing::Level::INFO);

    let file_appender = if let Some(log_file) = log_file {
        RollingFileAppender::new(Rotation::NEVER, ".", log_file)
            .with_max_level(tracing::Level::INFO)
    } else {
        RollingFileAppender::new(Rotation::NEVER, ".", "default.log")
            .with_max_level(tracing::Level::INFO)
    };

    let writer = console_writer.and(file_appender);

    let subscriber = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {e}");
        std::process::exit(1);
    }
}

fn load_ensemble(model: Option<String>, hash: Option<String>) -> Option<Ensemble> {
    match (model, hash) {
        (Some(path), Some(hash)) => match Ensemble::from_file(&path, &hash) {
            Ok(ensemble) => Some(ensemble),
            Err(e) => {
                error!("Failed to load model {path}: {e}");
                None
            }
        },
        (Some(_), None) => {
            error!("--model requires --model-hash");
            None
        }
        _ => match Ensemble::load_default() {
            Ok(ensemble) => Some(ensemble),
            Err(e) => {
                error!("Failed to load embedded model: {e}");
                None
            }
        },
    }
}

fn main() {
    let args = Args::parse();
    initialize_logging(args.log_file);

    let Some(ensemble) = load_ensemble(args.model, args.model_hash) else {
        std::process::exit(1);
    };
    info!("Using ensemble `{}` ({} trees, hash {})", ensemble.name, ensemble.tree_count(), ensemble.parameter_hash());

    let engine = match QualityEngine::new(
        &ensemble,
        Some(AnalysisConfig { measure_speed: true, ..AnalysisConfig::default() }),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create engine: {e}");
            std::process::exit(1);
        }
    };

    match args.command {
        Commands::Raw { file, width, height, ppi } => {
            let pixels = match fs::read(&file) {
                Ok(pixels) => pixels,
                Err(e) => {
                    error!("Failed to read {file}: {e}");
                    std::process::exit(1);
                }
            };
            let image = match FingerprintImage::new(pixels, width, height, ppi, 0) {
                Ok(image) => image,
                Err(e) => {
                    error!("Invalid image: {e}");
                    std::process::exit(1);
                }
            };

            // No minutiae extractor is wired into this demo; region and
            // orientation metrics alone still produce a bounded score.
            match engine.assess(&image, &[]) {
                Ok(assessment) => {
                    info!("{assessment}");
                    let mut values: Vec<String> =
                        assessment.features.iter().map(|v| v.to_string()).collect();
                    values.sort();
                    for line in values {
                        info!("  {line}");
                    }
                    for speed in &assessment.speeds {
                        info!("  {} took {:.2} ms", speed.group, speed.ms);
                    }
                    for feedback in &assessment.actionable {
                        info!("  actionable {feedback}");
                    }
                    println!("{}", assessment.score);
                }
                Err(e) => {
                    error!("Scoring failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
