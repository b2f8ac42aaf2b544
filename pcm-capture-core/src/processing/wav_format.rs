//! WAV container header synthesis and parsing.
//!
//! The capture pipeline writes headerless PCM while recording; the 44-byte
//! RIFF header is computed once, after capture, from the final payload length.
use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest payload whose sizes still fit the 32-bit RIFF fields.
pub const MAX_PAYLOAD_SIZE: u64 = (u32::MAX - 36) as u64;

const PCM_FORMAT_CODE: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;

/// Linear PCM stream layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// The capture format: 44.1 kHz, mono, 16-bit.
    pub const CAPTURE: PcmFormat = PcmFormat {
        sample_rate: 44_100,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Playback duration of `payload_bytes` of audio in this format.
    pub fn duration_secs(&self, payload_bytes: u64) -> f64 {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        payload_bytes as f64 / byte_rate as f64
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::CAPTURE
    }
}

/// The fixed 44-byte header preceding a PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub format: PcmFormat,
    pub data_size: u32,
}

impl ContainerHeader {
    /// Header for a capture-format payload of `payload_len` bytes.
    pub fn for_payload(payload_len: u64) -> Result<Self, CaptureError> {
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(CaptureError::InvalidArgument(format!(
                "payload of {} bytes exceeds the RIFF size limit",
                payload_len
            )));
        }
        Ok(Self {
            format: PcmFormat::CAPTURE,
            data_size: payload_len as u32,
        })
    }

    /// RIFF chunk size: everything after the first 8 bytes.
    pub fn chunk_size(&self) -> u32 {
        36 + self.data_size
    }

    pub fn to_bytes(&self) -> [u8; WAV_HEADER_SIZE] {
        generate_wav_header(
            self.format.sample_rate,
            self.format.bits_per_sample,
            self.format.channels,
            self.data_size,
        )
    }

    /// Parse a canonical 44-byte PCM header.
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(CaptureError::InvalidArgument(format!(
                "header too short: {} bytes",
                bytes.len()
            )));
        }

        let tag = |offset: usize, expected: &[u8; 4]| -> Result<(), CaptureError> {
            if &bytes[offset..offset + 4] != expected {
                return Err(CaptureError::InvalidArgument(format!(
                    "expected {:?} tag at offset {}",
                    String::from_utf8_lossy(expected),
                    offset
                )));
            }
            Ok(())
        };
        tag(0, b"RIFF")?;
        tag(8, b"WAVE")?;
        tag(12, b"fmt ")?;
        tag(36, b"data")?;

        if read_u32(bytes, 16) != FMT_CHUNK_SIZE {
            return Err(CaptureError::InvalidArgument("unexpected fmt chunk size".into()));
        }
        let format_code = read_u16(bytes, 20);
        if format_code != PCM_FORMAT_CODE {
            return Err(CaptureError::InvalidArgument(format!(
                "unsupported audio format code: {}",
                format_code
            )));
        }

        Ok(Self {
            format: PcmFormat {
                sample_rate: read_u32(bytes, 24),
                channels: read_u16(bytes, 22),
                bits_per_sample: read_u16(bytes, 34),
            },
            data_size: read_u32(bytes, 40),
        })
    }
}

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_CODE.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk; the raw stream carries no header of its own
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
