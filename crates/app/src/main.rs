use std::{
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use beatsync_core::{AppConfig, BeatSyncEngine, BeatSyncError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = report(&err, &mut std::io::stderr());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> beatsync_core::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let engine = BeatSyncEngine::from_config(&config)?;

    match cli.command {
        Commands::Analyze { input, output } => {
            run_analyze(&engine, &input, output.as_deref()).await
        }
        Commands::Cuts {
            input,
            target,
            cuts_per_beat,
        } => run_cuts(&engine, &input, target, cuts_per_beat).await,
        Commands::Mux {
            video,
            audio,
            output,
        } => engine.create_beat_matched_video(&video, &audio, &output).await,
    }
}

/// Prints the failure once, using its `Display` form.
fn report(err: &BeatSyncError, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "error: {err}")
}

fn load_config(path: Option<&Path>) -> beatsync_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

async fn run_analyze(
    engine: &BeatSyncEngine,
    input: &Path,
    output: Option<&Path>,
) -> beatsync_core::Result<()> {
    tracing::info!(?input, "analysing track");
    let result = engine.analyze_audio(input).await?;

    match output {
        Some(path) => {
            std::fs::write(path, to_json(&result)?)?;
            tracing::info!(?path, "analysis written");
        }
        None => println!("{}", to_json(&result)?),
    }
    Ok(())
}

async fn run_cuts(
    engine: &BeatSyncEngine,
    input: &Path,
    target: f64,
    cuts_per_beat: usize,
) -> beatsync_core::Result<()> {
    tracing::info!(?input, target, cuts_per_beat, "planning cuts");
    let plan = engine
        .generate_beat_synced_cuts(input, target, cuts_per_beat)
        .await?;
    println!("{}", to_json(&plan)?);
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> beatsync_core::Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| BeatSyncError::msg(err.to_string()))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Beat-synchronised cut planning for social video",
    long_about = None
)]
struct Cli {
    /// JSON file overriding the default analysis settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect beats, tempo and energy segments of an audio or video file.
    Analyze {
        /// Path to the media file that should be analysed.
        input: PathBuf,
        /// Write the JSON result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print beat-aligned cut timestamps for a clip of the given length.
    Cuts {
        /// Path to the soundtrack.
        input: PathBuf,
        /// Length of the edit in seconds.
        #[arg(short, long)]
        target: f64,
        /// Cut on every n-th beat.
        #[arg(long, default_value_t = 1)]
        cuts_per_beat: usize,
    },
    /// Replace the soundtrack of a video.
    Mux {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
    },
}
