//! # pcm-capture-core
//!
//! Platform-agnostic PCM capture core library.
//!
//! Drains a mono 16-bit capture source into a headerless raw file, optionally
//! through a soft-knee gain stage, then wraps the raw file in a WAV container.
//! Capture backends implement the `CaptureSource` trait and are handed to a
//! `CaptureSession`, which runs the whole cycle on worker threads.
//!
//! ## Architecture
//!
//! ```text
//! pcm-capture-core (this crate)
//! ├── traits/       ← CaptureSource, CaptureDelegate
//! ├── models/       ← CaptureError, ReadError, CaptureState, CaptureConfiguration, RecordingResult
//! ├── processing/   ← soft-knee gain, WAV header layout
//! ├── session/      ← CaptureSession (start/stop state machine)
//! └── storage/      ← RawStreamWriter, ContainerEncoder, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::CaptureConfiguration;
pub use models::error::{CaptureError, ReadError};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{CaptureState, TerminationReason};
pub use processing::sample_gain::{gain, GainParameters};
pub use processing::wav_format::{ContainerHeader, PcmFormat};
pub use session::capture_session::CaptureSession;
pub use storage::container_encoder::{convert, ContainerEncoder, EncodeSummary};
pub use storage::raw_stream_writer::{RawStreamWriter, WriterReport};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_source::{CaptureSource, ReadOutcome, RecordingSwitch};
