use std::fmt;

use thiserror::Error;

/// Errors that can occur during capture, encoding, and session control.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no capture source available")]
    SourceUnavailable,

    #[error("session busy: cannot {action} while {state}")]
    SessionBusy { action: &'static str, state: &'static str },

    #[error("transient read error: {0}")]
    TransientRead(ReadError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("input not found: {0}")]
    InputNotFound(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Read errors are reported and capture continues; everything else ends
    /// the operation that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRead(_))
    }
}

/// Error codes a capture source can return from a read instead of data.
///
/// Codes match the platform recorder's negative status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadError {
    Generic,
    BadValue,
    InvalidOperation,
    DeadObject,
}

impl ReadError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Generic => -1,
            Self::BadValue => -2,
            Self::InvalidOperation => -3,
            Self::DeadObject => -6,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Generic => "ERROR",
            Self::BadValue => "ERROR_BAD_VALUE",
            Self::InvalidOperation => "ERROR_INVALID_OPERATION",
            Self::DeadObject => "ERROR_DEAD_OBJECT",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Generic),
            -2 => Some(Self::BadValue),
            -3 => Some(Self::InvalidOperation),
            -6 => Some(Self::DeadObject),
            _ => None,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.category(), self.code())
    }
}
