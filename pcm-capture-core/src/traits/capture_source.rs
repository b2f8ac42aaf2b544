use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::error::{CaptureError, ReadError};

/// Outcome of a single blocking read from a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes at the front of the buffer are valid.
    Data(usize),
    /// The source reported an error code instead of data.
    Error(ReadError),
}

/// Shared on/off flag for a source's recording state.
///
/// The source holds one clone and consults it; the session keeps another so
/// it can end recording while the capture worker owns the source.
#[derive(Debug, Clone, Default)]
pub struct RecordingSwitch(Arc<AtomicBool>);

impl RecordingSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn_on(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn turn_off(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An opened, authorized source of mono 16-bit little-endian PCM at 44.1 kHz.
///
/// Acquiring and authorizing the source is the platform's job; the session
/// only moves an already-opened source into its capture worker.
pub trait CaptureSource: Send {
    /// Handle used to end recording from another thread.
    fn switch(&self) -> RecordingSwitch;

    /// Begin producing audio. Called once, before the capture worker starts.
    fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.switch().turn_on();
        Ok(())
    }

    /// Whether the source is in the active recording state.
    fn is_recording(&self) -> bool {
        self.switch().is_on()
    }

    /// Block until data or an error code is available.
    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome;

    /// Human-readable name for logs.
    fn description(&self) -> String {
        "capture source".into()
    }
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn switch(&self) -> RecordingSwitch {
        (**self).switch()
    }

    fn start_recording(&mut self) -> Result<(), CaptureError> {
        (**self).start_recording()
    }

    fn is_recording(&self) -> bool {
        (**self).is_recording()
    }

    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        (**self).read(buf)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}
