//! Source selection for the command-line driver.

use std::path::PathBuf;
use std::time::Duration;

use pcm_capture_core::{CaptureError, CaptureSource};

use crate::stream_source::StreamSource;
use crate::tone_source::ToneSource;

/// Where the driver gets its audio from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChoice {
    Stdin,
    File(PathBuf),
    Tone { frequency: f64, duration: Option<Duration> },
}

impl SourceChoice {
    /// Whether the source ends on its own without a stop command.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Stdin | Self::File(_) => true,
            Self::Tone { duration, .. } => duration.is_some(),
        }
    }
}

/// Open the chosen source, ready to hand to a session.
pub fn open_source(choice: &SourceChoice) -> Result<Box<dyn CaptureSource>, CaptureError> {
    let source: Box<dyn CaptureSource> = match choice {
        SourceChoice::Stdin => Box::new(StreamSource::stdin()),
        SourceChoice::File(path) => Box::new(StreamSource::open(path)?),
        SourceChoice::Tone { frequency, duration } => {
            let mut tone = ToneSource::new(*frequency)?.realtime(true);
            if let Some(duration) = duration {
                tone = tone.with_duration(*duration);
            }
            Box::new(tone)
        }
    };
    log::info!("Opened {}", source.description());
    Ok(source)
}
