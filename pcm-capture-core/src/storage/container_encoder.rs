use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::config::DEFAULT_BUFFER_SIZE;
use crate::models::error::CaptureError;
use crate::processing::wav_format::ContainerHeader;

/// What a successful conversion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    pub header: ContainerHeader,
    pub payload_bytes: u64,
    /// SHA-256 of the whole container (header and payload), hex encoded.
    pub checksum: String,
}

/// Wraps a finished raw PCM stream in a WAV container.
///
/// ## File Format
/// ```text
/// [44-byte WAV header, sizes computed from the input length]
/// [input bytes, copied verbatim]
/// ```
///
/// The payload is streamed in `chunk_size` pieces and never held in memory
/// as a whole. A failure mid-copy leaves the partial output on disk.
#[derive(Debug, Clone)]
pub struct ContainerEncoder {
    chunk_size: usize,
}

impl ContainerEncoder {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn convert(&self, input: &Path, output: &Path) -> Result<EncodeSummary, CaptureError> {
        if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
            return Err(CaptureError::InvalidArgument(
                "input and output paths must not be empty".into(),
            ));
        }

        let input_file = File::open(input)
            .map_err(|e| CaptureError::InputNotFound(format!("{}: {}", input.display(), e)))?;
        let input_meta = input_file
            .metadata()
            .map_err(|e| CaptureError::InputNotFound(format!("{}: {}", input.display(), e)))?;
        if !input_meta.is_file() {
            return Err(CaptureError::InputNotFound(format!(
                "{}: not a regular file",
                input.display()
            )));
        }

        let payload_len = input_meta.len();
        let header = ContainerHeader::for_payload(payload_len)?;

        if output.exists() {
            if let Err(e) = fs::remove_file(output) {
                log::warn!("Could not remove existing {}: {}", output.display(), e);
            }
        }

        let mut output_file = File::create(output)
            .map_err(|e| CaptureError::IoError(format!("failed to create {}: {}", output.display(), e)))?;

        let checksum = self.write_container(input_file, header, payload_len, &mut output_file)?;
        output_file
            .sync_all()
            .map_err(|e| CaptureError::IoError(format!("failed to sync {}: {}", output.display(), e)))?;

        log::info!(
            "Encoded {} ({} payload bytes) into {}",
            input.display(),
            payload_len,
            output.display()
        );

        Ok(EncodeSummary {
            header,
            payload_bytes: payload_len,
            checksum,
        })
    }

    /// Write `header` then exactly `payload_len` bytes of `reader` to `out`.
    ///
    /// Returns the hex SHA-256 of everything written.
    fn write_container<R: Read, W: Write>(
        &self,
        reader: R,
        header: ContainerHeader,
        payload_len: u64,
        out: &mut W,
    ) -> Result<String, CaptureError> {
        let mut hasher = Sha256::new();
        let header_bytes = header.to_bytes();
        out.write_all(&header_bytes)
            .map_err(|e| CaptureError::IoError(format!("header write failed: {}", e)))?;
        hasher.update(header_bytes);

        let mut reader = reader.take(payload_len);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CaptureError::IoError(format!("payload read failed: {}", e))),
            };
            out.write_all(&chunk[..n])
                .map_err(|e| CaptureError::IoError(format!("payload write failed: {}", e)))?;
            hasher.update(&chunk[..n]);
            copied += n as u64;
        }

        if copied != payload_len {
            return Err(CaptureError::IoError(format!(
                "input ended after {} of {} bytes",
                copied, payload_len
            )));
        }

        out.flush()
            .map_err(|e| CaptureError::IoError(format!("flush failed: {}", e)))?;
        Ok(hex_encode(&hasher.finalize()))
    }
}

impl Default for ContainerEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Convert a raw PCM file to a WAV container using the default chunk size.
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<EncodeSummary, CaptureError> {
    ContainerEncoder::default().convert(input.as_ref(), output.as_ref())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
