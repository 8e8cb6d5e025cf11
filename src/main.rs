mod audio;
mod cli;
mod config;
mod error;
mod waveform;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use audio::source::SymphoniaSource;
use cli::Cli;
use waveform::job::{ExtractionJob, ExtractionOutcome};
use waveform::reducer::{ReducerOptions, TailPolicy};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect wavepeek.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("wavepeek.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("wavepeek").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.points == 100 {
                cli.points = cfg.waveform.points;
            }
            if cli.scale == 0.25 {
                cli.scale = cfg.waveform.scale;
            }
            if !cli.flush_tail {
                cli.flush_tail = cfg.waveform.flush_tail;
            }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }
    if cli.points == 0 {
        anyhow::bail!("--points must be at least 1");
    }

    log::info!("Input: {}", cli.input.display());
    log::info!("Points: {}", cli.points);

    let options = ReducerOptions {
        scale: cli.scale,
        tail: if cli.flush_tail {
            TailPolicy::Flush
        } else {
            TailPolicy::Drop
        },
    };

    let input = cli.input.clone();
    let (job, outcome_rx) =
        ExtractionJob::start(move || SymphoniaSource::open(&input), cli.points, options);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} decoding... ({elapsed})")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = outcome_rx
        .recv()
        .context("Extraction worker disappeared without reporting")?;
    spinner.finish_and_clear();
    job.join();

    match outcome {
        ExtractionOutcome::Completed(points) => {
            let count = points.len();
            let report = serde_json::json!({
                "source": cli.input.display().to_string(),
                "points": count,
                "waveform": points,
            });
            let body = serde_json::to_string_pretty(&report)?;
            if cli.output == "-" {
                println!("{}", body);
            } else {
                std::fs::write(&cli.output, body)
                    .with_context(|| format!("Failed to write {}", cli.output))?;
                log::info!("Wrote {} points to {}", count, cli.output);
            }
            Ok(())
        }
        ExtractionOutcome::Cancelled => {
            log::warn!("Extraction cancelled");
            std::process::exit(2);
        }
        ExtractionOutcome::Failed { code, message } => {
            anyhow::bail!("Extraction failed ({}): {}", code, message)
        }
    }
}
