//! Error types for RomArc operations.
//!
//! A single error enum covers every failure the codec can report: I/O from
//! the underlying reader or writer, rejected configuration, malformed headers,
//! truncated or corrupted compressed data, and internal invariant breaks.

use std::io;
use thiserror::Error;

/// The main error type for RomArc operations.
#[derive(Debug, Error)]
pub enum RomArcError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoder or decoder parameters outside their legal range.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Which parameter was rejected and why.
        message: String,
    },

    /// Invalid header format.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// The compressed stream ended before decoding was complete.
    #[error("Truncated stream: input ended after {offset} bytes")]
    TruncatedStream {
        /// Number of compressed bytes consumed before the end was hit.
        offset: u64,
    },

    /// Corrupted data in the compressed stream.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid distance in a match back-reference.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: u64,
        /// Bytes of history available when the match was decoded.
        history_size: u64,
    },

    /// An internal consistency check failed.
    #[error("Internal invariant violated: {message}")]
    InvariantViolation {
        /// What was found to be inconsistent.
        message: String,
    },
}

/// Result type alias for RomArc operations.
pub type Result<T> = std::result::Result<T, RomArcError>;

impl RomArcError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a truncated stream error.
    pub fn truncated(offset: u64) -> Self {
        Self::TruncatedStream { offset }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: u64, history_size: u64) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Whether the error was caused by rejected parameters.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Whether the error means the compressed input ran out early.
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::TruncatedStream { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl From<RomArcError> for io::Error {
    fn from(err: RomArcError) -> Self {
        match err {
            RomArcError::Io(e) => e,
            RomArcError::TruncatedStream { .. } => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            RomArcError::InvalidConfig { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RomArcError::invalid_config("fast bytes 300 out of range 5..=273");
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("300"));

        let err = RomArcError::truncated(42);
        assert!(err.to_string().contains("42 bytes"));

        let err = RomArcError::invalid_distance(70_000, 65_536);
        assert!(err.to_string().contains("70000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: RomArcError = io_err.into();
        assert!(matches!(err, RomArcError::Io(_)));
    }

    #[test]
    fn test_classification() {
        assert!(RomArcError::invalid_config("lc").is_config_error());
        assert!(!RomArcError::invalid_header("short").is_config_error());
        assert!(RomArcError::truncated(0).is_truncation());

        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(RomArcError::from(eof).is_truncation());
        assert!(!RomArcError::corrupted(3, "bad").is_truncation());
    }

    #[test]
    fn test_into_io_error() {
        let io_err: io::Error = RomArcError::truncated(7).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);

        let io_err: io::Error = RomArcError::corrupted(1, "bad symbol").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    }
}
