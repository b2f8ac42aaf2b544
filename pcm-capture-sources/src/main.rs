use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use pcm_capture_core::models::config::DEFAULT_BUFFER_SIZE;
use pcm_capture_core::{
    CaptureConfiguration, CaptureDelegate, CaptureError, CaptureSession, CaptureState, GainParameters,
};
use pcm_capture_sources::{open_source, SourceChoice};

/// Record mono 16-bit 44.1 kHz PCM and wrap it in a WAV container.
#[derive(Parser)]
#[command(name = "pcm-capture", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    record: RecordArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Wrap an existing raw PCM file in a WAV container.
    Convert {
        /// Headerless 16-bit mono PCM input.
        raw: PathBuf,
        /// Container to write; replaced if it exists.
        wav: PathBuf,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// Raw PCM file to record from, or `-` for stdin.
    #[arg(long, value_name = "PATH", conflicts_with = "tone")]
    input: Option<String>,

    /// Record a synthetic sine tone at this frequency instead.
    #[arg(long, value_name = "HZ")]
    tone: Option<f64>,

    /// Stop after this many seconds.
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Soft-knee gain applied while recording.
    #[arg(long, value_name = "SCALE")]
    gain: Option<f32>,

    /// Directory for the raw stream and the container.
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Bytes per capture read; must be even.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Skip the JSON metadata sidecar.
    #[arg(long)]
    no_metadata: bool,
}

/// Logs session events for the terminal user.
struct ConsoleDelegate;

impl CaptureDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: &CaptureState) {
        log::debug!("state: {}", state.name());
    }

    fn on_error(&self, error: &CaptureError) {
        log::warn!("{}", error);
    }

    fn on_capture_finished(&self, state: &CaptureState) {
        if let CaptureState::Completed(result) = state {
            log::info!(
                "{} bytes ({:.2}s), {} read errors",
                result.payload_bytes,
                result.duration_secs,
                result.read_errors
            );
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Some(Command::Convert { raw, wav }) => convert(raw, wav),
        None => record(cli.record),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pcm-capture: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn convert(raw: PathBuf, wav: PathBuf) -> Result<()> {
    let summary = pcm_capture_core::convert(&raw, &wav)
        .with_context(|| format!("converting {} to {}", raw.display(), wav.display()))?;
    println!("{} ({} bytes, sha256 {})", wav.display(), summary.payload_bytes, summary.checksum);
    Ok(())
}

fn record(args: RecordArgs) -> Result<()> {
    let duration = args
        .duration
        .map(|secs| match Duration::try_from_secs_f64(secs) {
            Ok(d) if !d.is_zero() => Ok(d),
            _ => bail!("--duration must be a positive number of seconds, got {}", secs),
        })
        .transpose()?;

    let choice = match (args.input.as_deref(), args.tone) {
        (_, Some(frequency)) => SourceChoice::Tone { frequency, duration },
        (None, None) | (Some("-"), None) => SourceChoice::Stdin,
        (Some(path), None) => SourceChoice::File(PathBuf::from(path)),
    };

    let config = CaptureConfiguration {
        output_directory: args.output_dir,
        buffer_size: args.buffer_size,
        gain: args.gain.map(GainParameters::new),
        write_metadata: !args.no_metadata,
        ..CaptureConfiguration::default()
    };
    config.validate().context("invalid configuration")?;

    let session = CaptureSession::new(config);
    session.set_delegate(Arc::new(ConsoleDelegate));
    session.provide_source(open_source(&choice).context("opening capture source")?);
    session.start().context("starting capture")?;

    let outcome = match duration {
        Some(limit) => match session.wait_for_outcome(Some(limit)) {
            Some(outcome) => outcome,
            None => stop_and_wait(&session),
        },
        None if choice.is_finite() => session.wait_for_outcome(None).unwrap_or(Err(CaptureError::Unknown(
            "session ended without an outcome".into(),
        ))),
        None => {
            eprintln!("Recording; press Enter to stop.");
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).context("reading stdin")?;
            stop_and_wait(&session)
        }
    };

    let result = outcome.context("capture failed")?;
    println!("{}", result.container_path.display());
    Ok(())
}

fn stop_and_wait(session: &CaptureSession) -> std::result::Result<pcm_capture_core::RecordingResult, CaptureError> {
    session.stop();
    session
        .wait_for_outcome(None)
        .unwrap_or(Err(CaptureError::Unknown("session ended without an outcome".into())))
}
