use std::path::PathBuf;

use crate::models::error::CaptureError;
use crate::processing::sample_gain::GainParameters;

/// Default capture buffer size in bytes; also the encoder's copy chunk size.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Directory where the raw stream and the container are written.
    pub output_directory: PathBuf,

    /// File name of the headerless PCM stream (default: `record.pcm`).
    pub raw_file_name: String,

    /// File name of the finished WAV container (default: `output.wav`).
    pub container_file_name: String,

    /// Bytes requested per read from the capture source. Must be even.
    pub buffer_size: usize,

    /// Soft-knee gain applied while draining, or None to store samples as captured.
    pub gain: Option<GainParameters>,

    /// Write a JSON metadata sidecar next to the container (default: true).
    pub write_metadata: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_size == 0 || self.buffer_size % 2 != 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "buffer size must be a positive multiple of 2, got {}",
                self.buffer_size
            )));
        }
        if self.raw_file_name.is_empty() || self.container_file_name.is_empty() {
            return Err(CaptureError::ConfigurationFailed("file names must not be empty".into()));
        }
        if self.raw_file_name == self.container_file_name {
            return Err(CaptureError::ConfigurationFailed(
                "raw stream and container must use different file names".into(),
            ));
        }
        if let Some(gain) = &self.gain {
            gain.validate()?;
        }
        Ok(())
    }

    pub fn raw_path(&self) -> PathBuf {
        self.output_directory.join(&self.raw_file_name)
    }

    pub fn container_path(&self) -> PathBuf {
        self.output_directory.join(&self.container_file_name)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            raw_file_name: "record.pcm".into(),
            container_file_name: "output.wav".into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            gain: None,
            write_metadata: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = CaptureConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.raw_path(), PathBuf::from("./record.pcm"));
        assert_eq!(config.container_path(), PathBuf::from("./output.wav"));
    }

    #[test]
    fn rejects_odd_or_zero_buffer() {
        for buffer_size in [0, 1, 4095] {
            let config = CaptureConfiguration {
                buffer_size,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(CaptureError::ConfigurationFailed(_))));
        }
    }

    #[test]
    fn rejects_colliding_file_names() {
        let config = CaptureConfiguration {
            raw_file_name: "take.wav".into(),
            container_file_name: "take.wav".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfiguration {
            raw_file_name: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_gain() {
        let config = CaptureConfiguration {
            gain: Some(GainParameters::new(-2.0)),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfiguration {
            gain: Some(GainParameters::new(2.0)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
