//! Error types for glyphcore

use crate::vm::backend::TransferError;
use thiserror::Error;

/// Failure to turn an image + dictionary document into a program.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The image could not be read from its source
    #[error("Image fetch failed for {source_name}: {reason}")]
    ImageFetch { source_name: String, reason: String },

    /// Raw RGBA buffer does not match the declared dimensions
    #[error("Malformed image: expected {expected} bytes for {width}x{height}, got {actual}")]
    MalformedImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Dictionary document could not be read or parsed
    #[error("Dictionary unreadable: {0}")]
    Dictionary(String),

    /// Dictionary document has no `type` field
    #[error("Dictionary document is missing its type marker")]
    MissingTypeMarker,

    /// Dictionary document declares a type other than the morphological one
    #[error("Unsupported dictionary type: {0:?}")]
    UnsupportedType(String),

    /// Dictionary instruction list is empty
    #[error("Dictionary instruction list is empty")]
    EmptyDictionary,
}

/// Glyphcore error type
#[derive(Debug, Error)]
pub enum GlyphError {
    /// Decoder failure
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Encoder failure
    #[error("Encode error: {0}")]
    Encode(String),

    /// No free core slot
    #[error("No free core slot ({max_cores} cores in use)")]
    Capacity { max_cores: usize },

    /// Compute backend unavailable; execution disabled but manager usable
    #[error("Backend initialization failed: {0}")]
    Init(String),

    /// Execution was requested on a manager whose backend never came up
    #[error("Execution disabled: {0}")]
    ExecutionDisabled(String),

    /// A dispatch is already outstanding against the shared region
    #[error("Dispatch {0} still in flight")]
    DispatchInFlight(u64),

    /// Transient shared-memory transfer failure
    #[error("Host I/O error: {0}")]
    HostIo(#[from] TransferError),

    /// Transfer retry ceiling reached
    #[error("Transfer failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransferError },

    /// Program offset or length outside program memory
    #[error("Program range 0x{offset:05X}+{len} outside program memory")]
    ProgramOutOfBounds { offset: u32, len: usize },

    /// Program offset not word aligned
    #[error("Program offset 0x{0:05X} is not 4-byte aligned")]
    UnalignedProgramOffset(u32),

    /// Position key has no core slot
    #[error("No core assigned to {0}")]
    UnknownGlyph(String),

    /// Compute backend reported a dispatch failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlyphError {
    /// Whether the error ends the run (as opposed to a retryable condition)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RetriesExhausted { .. } | Self::Backend(_) | Self::ExecutionDisabled(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GlyphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_converts() {
        let err: GlyphError = DecodeError::EmptyDictionary.into();
        assert!(matches!(err, GlyphError::Decode(DecodeError::EmptyDictionary)));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_fatal_classification() {
        let exhausted = GlyphError::RetriesExhausted {
            attempts: 3,
            last: TransferError::Unavailable,
        };
        assert!(exhausted.is_fatal());
        assert!(!GlyphError::HostIo(TransferError::Unavailable).is_fatal());
        assert!(!GlyphError::Capacity { max_cores: 64 }.is_fatal());
    }
}
