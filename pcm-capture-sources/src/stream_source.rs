//! Reader-backed capture source.
//!
//! Treats any `Read` as a live PCM feed: a raw file, a FIFO, or stdin piped
//! from a recorder such as `arecord -f S16_LE -r 44100 -c 1 -t raw`.
//! End of stream takes the source out of the recording state.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use pcm_capture_core::{CaptureError, CaptureSource, ReadError, ReadOutcome, RecordingSwitch};

/// Consecutive failed reads after which the stream is treated as gone.
pub const DEFAULT_ERROR_LIMIT: u32 = 16;

pub struct StreamSource<R: Read + Send> {
    reader: R,
    name: String,
    switch: RecordingSwitch,
    consecutive_errors: u32,
    error_limit: u32,
}

impl<R: Read + Send> StreamSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            switch: RecordingSwitch::new(),
            consecutive_errors: 0,
            error_limit: DEFAULT_ERROR_LIMIT,
        }
    }

    /// Leave the recording state after `limit` failed reads in a row.
    pub fn with_error_limit(mut self, limit: u32) -> Self {
        self.error_limit = limit.max(1);
        self
    }
}

impl StreamSource<BufReader<File>> {
    /// Open a raw PCM file. A missing or unreadable file is `SourceUnavailable`.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path).map_err(|e| {
            log::error!("Cannot open capture input {}: {}", path.display(), e);
            CaptureError::SourceUnavailable
        })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl StreamSource<io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(io::stdin(), "stdin")
    }
}

/// Map an I/O failure onto the recorder's error codes.
pub fn read_error_for(kind: ErrorKind) -> ReadError {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::InvalidData => ReadError::BadValue,
        ErrorKind::PermissionDenied | ErrorKind::Unsupported | ErrorKind::WouldBlock => ReadError::InvalidOperation,
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => ReadError::DeadObject,
        _ => ReadError::Generic,
    }
}

impl<R: Read + Send> CaptureSource for StreamSource<R> {
    fn switch(&self) -> RecordingSwitch {
        self.switch.clone()
    }

    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        match self.reader.read(buf) {
            Ok(0) => {
                log::info!("End of stream on {}", self.name);
                self.switch.turn_off();
                ReadOutcome::Data(0)
            }
            Ok(n) => {
                self.consecutive_errors = 0;
                ReadOutcome::Data(n)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => ReadOutcome::Data(0),
            Err(e) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.error_limit {
                    log::warn!(
                        "{} failed {} reads in a row, giving up: {}",
                        self.name,
                        self.consecutive_errors,
                        e
                    );
                    self.switch.turn_off();
                }
                ReadOutcome::Error(read_error_for(e.kind()))
            }
        }
    }

    fn description(&self) -> String {
        format!("stream {}", self.name)
    }
}
