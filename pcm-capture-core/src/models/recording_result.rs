use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::TerminationReason;
use crate::processing::sample_gain::GainParameters;
use crate::processing::wav_format::PcmFormat;

/// Result delivered when a capture session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub container_path: PathBuf,
    pub raw_path: PathBuf,
    pub payload_bytes: u64,
    pub duration_secs: f64,
    pub checksum: String,
    pub termination: TerminationReason,
    pub read_errors: u64,
    pub metadata: RecordingMetadata,
}

/// Metadata stored alongside a recording.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub duration_secs: f64,
    pub payload_bytes: u64,
    pub checksum: String,
    pub format: PcmFormat,
    pub gain: Option<GainParameters>,
    pub termination: TerminationReason,
    pub read_errors: u64,
}

impl RecordingMetadata {
    /// Creates metadata for a mono capture-format recording.
    pub fn new_mono(
        file_path: &str,
        payload_bytes: u64,
        checksum: &str,
        gain: Option<GainParameters>,
        termination: TerminationReason,
        read_errors: u64,
    ) -> Self {
        let format = PcmFormat::CAPTURE;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            duration_secs: format.duration_secs(payload_bytes),
            payload_bytes,
            checksum: checksum.to_string(),
            format,
            gain,
            termination,
            read_errors,
        }
    }
}
