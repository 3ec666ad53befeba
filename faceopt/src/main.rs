//! faceopt - simulated face-detection optimization workflow
//!
//! Drives the RetinaFace-Ghost / MobileNetV3 optimization pipeline simulator
//! from the terminal: run a session, export and import configurations, try
//! the detection simulator and compare synthesized models.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/faceopt/config.toml (~/.config/faceopt/config.toml)
//! - Logs: $XDG_STATE_HOME/faceopt/faceopt.log (~/.local/state/faceopt/faceopt.log)

mod report;
mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceopt_core::comparison::ComparisonBoard;
use faceopt_core::dataset::DatasetStats;
use faceopt_core::detection::DetectionSimulator;
use faceopt_core::{
    transfer, Clock, Config, OptimizationConfig, RandomSynthesizer, SystemClock, VirtualClock,
};

#[derive(Parser)]
#[command(name = "faceopt")]
#[command(about = "Simulated face-detection model optimization")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the optimization pipeline and stream its progress
    Run {
        /// Exported configuration document to run with
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip the simulated delays (virtual clock)
        #[arg(long)]
        fast: bool,

        /// Print the final session as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration document
    Export {
        /// Exported configuration document to re-export
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory (default: [export] directory, then current directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Read and validate a configuration document
    Import {
        /// Document previously written by `export`
        file: PathBuf,
    },

    /// Run the simulated detector over images
    Detect {
        /// Image paths or URLs (used only as labels)
        #[arg(required = true)]
        images: Vec<String>,

        /// Skip the simulated processing delay
        #[arg(long)]
        fast: bool,
    },

    /// Compare synthesized results across configurations
    Compare {
        /// Configuration documents (default: built-in and comparison presets)
        configs: Vec<PathBuf>,
    },

    /// Show dataset statistics and the configured split
    Dataset {
        /// Configuration document providing the split
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show configuration, paths and runner timing
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        faceopt_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("faceopt starting");

    match args.command {
        Command::Run {
            config: file,
            fast,
            json,
        } => {
            let optimization = resolve_optimization(&config, file.as_deref())?;
            run::cmd_run(&config, optimization, fast, json).await
        }
        Command::Export {
            config: file,
            out_dir,
        } => cmd_export(&config, file.as_deref(), out_dir),
        Command::Import { file } => cmd_import(&file),
        Command::Detect { images, fast } => cmd_detect(&images, fast).await,
        Command::Compare { configs } => cmd_compare(&config, &configs),
        Command::Dataset { config: file } => cmd_dataset(&config, file.as_deref()),
        Command::Status => cmd_status(&config),
    }
}

/// Configuration from `file`, or the `[defaults]` preset
fn resolve_optimization(config: &Config, file: Option<&Path>) -> Result<OptimizationConfig> {
    match file {
        Some(path) => transfer::import_from_path(path)
            .with_context(|| format!("failed to import {}", path.display())),
        None => Ok(config.default_optimization()),
    }
}

fn clock_for(fast: bool) -> Arc<dyn Clock> {
    if fast {
        Arc::new(VirtualClock::new())
    } else {
        Arc::new(SystemClock)
    }
}

fn cmd_export(config: &Config, file: Option<&Path>, out_dir: Option<PathBuf>) -> Result<()> {
    let optimization = resolve_optimization(config, file)?;
    let dir = match out_dir {
        Some(dir) => dir,
        None => config
            .export
            .directory()
            .context("failed to resolve export directory")?,
    };

    let path = transfer::export_to_dir(&optimization, &dir)
        .with_context(|| format!("failed to export to {}", dir.display()))?;

    println!("Exported configuration to {}", path.display());
    Ok(())
}

fn cmd_import(file: &Path) -> Result<()> {
    let optimization = transfer::import_from_path(file)
        .with_context(|| format!("failed to import {}", file.display()))?;

    println!("Imported configuration from {}", file.display());
    println!();
    report::print_config(&optimization);

    if !optimization.dataset.is_balanced() {
        println!();
        println!(
            "Warning: dataset split sums to {:.3}, expected 1.0",
            optimization.dataset.total()
        );
    }
    Ok(())
}

async fn cmd_detect(images: &[String], fast: bool) -> Result<()> {
    let simulator = DetectionSimulator::new(clock_for(fast));

    for image in images {
        let result = simulator.detect(image).await;
        report::print_detection(&result);
    }
    Ok(())
}

fn cmd_compare(config: &Config, files: &[PathBuf]) -> Result<()> {
    let configs = if files.is_empty() {
        vec![
            config.default_optimization(),
            OptimizationConfig::comparison_preset(),
        ]
    } else {
        files
            .iter()
            .map(|path| resolve_optimization(config, Some(path)))
            .collect::<Result<Vec<_>>>()?
    };

    let mut board = ComparisonBoard::new();
    for optimization in configs {
        board
            .add_synthesized(optimization, &RandomSynthesizer)
            .context("failed to synthesize comparison results")?;
    }

    report::print_board(&board);
    Ok(())
}

fn cmd_dataset(config: &Config, file: Option<&Path>) -> Result<()> {
    let optimization = resolve_optimization(config, file)?;
    let stats = DatasetStats::reference();
    let split = stats.split_counts(&optimization.dataset);

    println!("Dataset:");
    println!("  Total images:       {}", stats.total_images);
    println!("  Total faces:        {}", stats.total_faces);
    println!("  Background samples: {}", stats.background_samples);
    println!("  Faces per image:    {:.2}", stats.avg_faces_per_image());
    println!("  Face ratio:         {:.1}%", stats.face_ratio() * 100.0);
    println!();
    println!("Configured split:");
    println!(
        "  Train:      {:>6} ({:.0}%)",
        split.train,
        optimization.dataset.train_split * 100.0
    );
    println!(
        "  Validation: {:>6} ({:.0}%)",
        split.validation,
        optimization.dataset.validation_split * 100.0
    );
    println!(
        "  Test:       {:>6} ({:.0}%)",
        split.test,
        optimization.dataset.test_split * 100.0
    );
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let config_path = Config::config_path();

    println!("Configuration:");
    println!(
        "  Config file: {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!(
        "  Log file:    {}",
        faceopt_core::logging::log_file_path().display()
    );
    println!("  Log level:   {}", config.logging.level);
    match &config.export.directory {
        Some(dir) => println!("  Export dir:  {}", dir.display()),
        None => println!("  Export dir:  (current directory)"),
    }
    println!();

    let timing = config.runner;
    let steps = faceopt_core::catalog::DEFAULT_CATALOG.len();
    println!("Runner:");
    println!(
        "  Step duration: {}-{} ms",
        timing.step_min_ms, timing.step_max_ms
    );
    println!("  Step pause:    {} ms", timing.step_pause_ms);
    println!("  Steps:         {}", steps);
    println!(
        "  Minimum run:   {:.1} s",
        timing.minimum_run_duration(steps).as_secs_f64()
    );
    println!(
        "  Preset:        {}",
        if config.defaults.is_some() { "[defaults]" } else { "built-in" }
    );
    Ok(())
}
