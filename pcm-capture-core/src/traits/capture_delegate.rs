use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// Methods may be called from the session's worker threads as well as the
/// thread issuing commands, and never while the session lock is held.
/// Implementations should marshal to a UI thread if they render anything.
pub trait CaptureDelegate: Send + Sync {
    /// Called after every state transition.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called for errors that do not end the session, such as a source read
    /// returning an error code.
    fn on_error(&self, error: &CaptureError);

    /// Called once per stop cycle with the terminal state
    /// (`Completed` or `Failed`).
    fn on_capture_finished(&self, state: &CaptureState);
}
