//! # pcm-capture-sources
//!
//! Capture sources for pcm-capture-core, and the `pcm-capture` driver.
//!
//! Provides:
//! - `StreamSource`: raw PCM from any reader (file, FIFO, stdin)
//! - `ToneSource`: synthetic sine wave at the capture rate
//! - `open_source`: resolves a command-line input choice to a boxed source
//!
//! ## Usage
//! ```ignore
//! use pcm_capture_core::{CaptureConfiguration, CaptureSession};
//! use pcm_capture_sources::StreamSource;
//!
//! let session = CaptureSession::new(CaptureConfiguration::default());
//! session.provide_source(StreamSource::stdin());
//! session.start()?;
//! let outcome = session.wait_for_outcome(None);
//! ```

pub mod provider;
pub mod stream_source;
pub mod tone_source;

pub use provider::{open_source, SourceChoice};
pub use stream_source::StreamSource;
pub use tone_source::ToneSource;
