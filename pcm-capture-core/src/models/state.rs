use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::recording_result::RecordingResult;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → stopping → encoding → completed / failed
///   ↑                                           │
///   └──────────────── reset / start ────────────┘
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopping,
    Encoding,
    Completed(RecordingResult),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Recording, stopping or encoding: a worker owns session resources.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Stopping | Self::Encoding)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Encoding => "encoding",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }

    /// The terminal outcome, if the session has finished.
    pub fn outcome(&self) -> Option<Result<RecordingResult, CaptureError>> {
        match self {
            Self::Completed(result) => Some(Ok(result.clone())),
            Self::Failed(error) => Some(Err(error.clone())),
            _ => None,
        }
    }
}

/// Why the capture loop stopped draining the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The session asked the loop to stop.
    StoppedByRequest,
    /// The source left the recording state on its own.
    SourceEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_states() {
        assert!(CaptureState::Idle.is_idle());
        assert!(CaptureState::Recording.is_active());
        assert!(CaptureState::Stopping.is_active());
        assert!(CaptureState::Encoding.is_active());
        assert!(!CaptureState::Idle.is_active());

        let failed = CaptureState::Failed(CaptureError::IoError("disk full".into()));
        assert!(failed.is_terminal());
        assert!(!failed.is_active());
        assert_eq!(failed.name(), "failed");
        assert_eq!(failed.outcome(), Some(Err(CaptureError::IoError("disk full".into()))));
        assert_eq!(CaptureState::Encoding.outcome(), None);
    }

    #[test]
    fn termination_reason_serializes_snake_case() {
        let json = serde_json::to_string(&TerminationReason::StoppedByRequest).unwrap();
        assert_eq!(json, "\"stopped_by_request\"");
    }
}
