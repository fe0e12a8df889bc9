//! WMA Lossless Encoder
//!
//! Converts audio files to WMA Lossless by driving ffmpeg, several files at
//! a time.

mod audio;
mod conversion;
mod core;
mod logging;
#[cfg(test)]
mod test_fixtures;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use crate::audio::FfprobeProbe;
use crate::conversion::{
    locate_tool, CancelToken, EncodeJob, EncodeJobRunner, FfmpegEncoder, JobEvent, JobReport,
    OutputMode, Tool,
};
use crate::core::{collect_audio_files, AppSettings, EncodingModeKind, OutputModeKind};

/// Convert audio files to WMA Lossless
#[derive(Parser, Debug)]
#[command(name = "wma-encoder", author, version, about, long_about = None)]
struct Args {
    /// Audio files or folders (folders are scanned recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Where to write the .wma files
    #[arg(short = 'o', long, value_enum)]
    output_mode: Option<OutputModeKind>,

    /// Output directory (implies `--output-mode custom`)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Subfolder name for `--output-mode subfolder`
    #[arg(long)]
    subfolder_name: Option<String>,

    /// Probe each file and round up to the nearest supported tier
    #[arg(long, conflicts_with = "manual")]
    auto: bool,

    /// Use the same bit depth and sample rate for every file
    #[arg(long)]
    manual: bool,

    /// Bit depth for manual mode (16 or 24)
    #[arg(short = 'b', long)]
    bit_depth: Option<u32>,

    /// Sample rate in kHz for manual mode (44, 48 or 96)
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Maximum number of simultaneous encodes
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Remember these options as the new defaults
    #[arg(long)]
    save_defaults: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Apply command-line choices on top of the saved settings
fn merge_settings(mut settings: AppSettings, args: &Args) -> AppSettings {
    if let Some(dir) = &args.output_dir {
        settings.output_dir = Some(dir.clone());
        settings.output_mode = OutputModeKind::Custom;
    }
    if let Some(mode) = args.output_mode {
        settings.output_mode = mode;
    }
    if let Some(name) = &args.subfolder_name {
        settings.subfolder_name = name.clone();
    }
    if args.auto {
        settings.encoding_mode = EncodingModeKind::Auto;
    }
    if args.manual {
        settings.encoding_mode = EncodingModeKind::Manual;
    }
    if let Some(bits) = args.bit_depth {
        settings.bit_depth = bits;
    }
    if let Some(rate) = args.sample_rate {
        settings.sample_rate_khz = rate;
    }
    if let Some(jobs) = args.jobs {
        settings.concurrency = jobs;
    }
    if let Some(path) = &args.ffmpeg {
        settings.ffmpeg_path = Some(path.clone());
    }
    if let Some(path) = &args.ffprobe {
        settings.ffprobe_path = Some(path.clone());
    }
    settings
}

/// Command line beats environment, environment beats saved settings
fn tool_override(tool: Tool, cli: Option<&PathBuf>, saved: Option<&PathBuf>) -> Option<PathBuf> {
    cli.cloned()
        .or_else(|| tool.env_override())
        .or_else(|| saved.cloned())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_path = logging::init_logging(args.verbose);

    let code = match run(args).await {
        Ok(report) => exit_code(&report),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(2)
        }
    };
    if code != ExitCode::SUCCESS
        && let Some(path) = log_path
    {
        log::info!("Full log: {}", path.display());
    }
    code
}

fn exit_code(report: &JobReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

async fn run(args: Args) -> Result<JobReport> {
    let settings = merge_settings(AppSettings::load(), &args);
    let encoding_mode = settings
        .encoding_mode()
        .context("Invalid encoding options")?;
    let output_mode = settings.output_mode();

    if matches!(output_mode, OutputMode::Custom { directory: None }) {
        bail!("Custom output mode needs an output directory (--output-dir)");
    }

    if args.save_defaults {
        let path = settings.save().context("Failed to save defaults")?;
        log::info!("Saved defaults to {}", path.display());
    }

    let ffmpeg = locate_tool(
        Tool::Ffmpeg,
        tool_override(Tool::Ffmpeg, args.ffmpeg.as_ref(), settings.ffmpeg_path.as_ref()).as_deref(),
    )?;
    // ffprobe is only needed to pick parameters per file
    let ffprobe = if encoding_mode.is_auto() {
        locate_tool(
            Tool::Ffprobe,
            tool_override(Tool::Ffprobe, args.ffprobe.as_ref(), settings.ffprobe_path.as_ref())
                .as_deref(),
        )?
    } else {
        PathBuf::from(Tool::Ffprobe.binary_name())
    };
    log::debug!("Using ffmpeg at {:?}", ffmpeg);

    let files = collect_audio_files(&args.inputs).context("Failed to scan inputs")?;
    if files.is_empty() {
        bail!("No audio files found in the given inputs");
    }

    let job = EncodeJob::new(files, settings.concurrency, output_mode, encoding_mode);

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancelToken::new();
    let runner = EncodeJobRunner::new(
        Arc::new(FfmpegEncoder::new(ffmpeg)),
        Arc::new(FfprobeProbe::new(ffprobe)),
    )
    .with_events(tx)
    .with_cancel_token(cancel.clone());

    let printer = tokio::spawn(print_events(rx));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted - finishing files in progress, skipping the rest");
            cancel.cancel();
        }
    });

    let report = runner.run(&job).await;
    // Dropping the runner closes the event channel so the printer can finish
    drop(runner);
    let _ = printer.await;

    print_summary(&report);
    // Report failures leave the exit code to the job result
    if let Some(path) = &args.report
        && let Err(e) = write_report(&report, path)
    {
        log::error!("{:#}", e);
    }

    Ok(report)
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<JobEvent>) {
    while let Some(event) = rx.recv().await {
        match &event {
            JobEvent::ParametersResolved { path, params } => {
                log::debug!("{}: {}", path.display(), params.label());
            }
            JobEvent::FileFinished {
                completed,
                progress,
                ..
            } => {
                log::info!(
                    "[{:>3.0}%] ({}/{}) {}",
                    progress.fraction * 100.0,
                    completed,
                    progress.total,
                    progress.status
                );
            }
            _ => {}
        }
        if event.is_terminal() {
            break;
        }
    }
}

fn print_summary(report: &JobReport) {
    log::info!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded,
        report.failed,
        report.skipped()
    );
    for file in report.failures() {
        log::error!(
            "  {}: {}",
            file.input.display(),
            file.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn write_report(report: &JobReport, path: &Path) -> Result<()> {
    let json = report.to_json().context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    log::info!("Report written to {}", path.display());
    Ok(())
}
