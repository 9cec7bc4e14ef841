//! Compute backend contract
//!
//! The Execution Manager never touches device memory directly. It owns two
//! buffers on a [`ComputeBackend`] (the shared memory region and the flat
//! register bank buffer) and talks to them through uploads, dispatches and
//! copy-out reads.
//!
//! ## Copy-out reads
//!
//! ```text
//! device buffer ──copy──▶ scratch ──map──▶ host view ──copy──▶ caller buffer
//!                                                              └─ release scratch
//! ```
//!
//! A scratch buffer is never held across a dispatch; [`read_back`] performs
//! the whole sequence and releases the scratch buffer on every path.

use super::memory::BufferId;
use std::fmt;

/// Shared-memory transfer failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Backend lost or never acquired its device
    Unavailable,
    /// Buffer was not allocated
    NotAllocated(BufferId),
    /// Range falls outside the buffer
    OutOfRange {
        buffer: BufferId,
        offset: usize,
        len: usize,
    },
    /// Scratch handle unknown or already released
    UnknownScratch(u32),
    /// Scratch buffer could not be made host-visible
    MapFailed(u32),
    /// Dispatch submission or completion failed
    Dispatch(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "backend unavailable"),
            Self::NotAllocated(buffer) => write!(f, "{} buffer not allocated", buffer),
            Self::OutOfRange { buffer, offset, len } => write!(
                f,
                "range 0x{:05X}+{} outside {} buffer",
                offset, len, buffer
            ),
            Self::UnknownScratch(id) => write!(f, "unknown scratch buffer #{}", id),
            Self::MapFailed(id) => write!(f, "failed to map scratch buffer #{}", id),
            Self::Dispatch(msg) => write!(f, "dispatch failed: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {}

/// Handle to a transient host-readable copy of a device range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchId(pub u32);

/// One execution step over a set of cores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Monotonic dispatch number
    pub id: u64,
    /// Core ids to advance
    pub cores: Vec<u32>,
    /// Instructions each core may retire
    pub cycle_budget: u32,
}

/// Device that holds the shared region and register banks and runs cores.
///
/// All calls come from the single thread that owns the Execution Manager.
pub trait ComputeBackend: Send {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Whether a device is present; checked once by `initialize`
    fn is_available(&self) -> bool;

    /// Allocate (or reallocate, zeroed) both buffers
    fn allocate(&mut self, memory_bytes: usize, register_bytes: usize) -> Result<(), TransferError>;

    /// Upload `data` into `buffer` at `offset`
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<(), TransferError>;

    /// Device-side copy of `len` bytes into a fresh scratch buffer
    fn copy_to_scratch(&mut self, buffer: BufferId, offset: usize, len: usize) -> Result<ScratchId, TransferError>;

    /// Host view of a scratch buffer
    fn map_scratch(&mut self, scratch: ScratchId) -> Result<&[u8], TransferError>;

    /// Drop a scratch buffer; unknown handles are ignored
    fn release_scratch(&mut self, scratch: ScratchId);

    /// Start a dispatch. The caller guarantees no other dispatch is in flight.
    fn submit(&mut self, dispatch: &Dispatch) -> Result<(), TransferError>;

    /// Block until the submitted dispatch has completed
    fn wait(&mut self) -> Result<(), TransferError>;
}

/// Copy `out.len()` bytes at `offset` of `buffer` into `out`.
///
/// The scratch buffer is released whether or not mapping succeeds.
pub fn read_back<B: ComputeBackend + ?Sized>(
    backend: &mut B,
    buffer: BufferId,
    offset: usize,
    out: &mut [u8],
) -> Result<(), TransferError> {
    let scratch = backend.copy_to_scratch(buffer, offset, out.len())?;
    let result = match backend.map_scratch(scratch) {
        Ok(view) if view.len() == out.len() => {
            out.copy_from_slice(view);
            Ok(())
        }
        Ok(_) => Err(TransferError::MapFailed(scratch.0)),
        Err(e) => Err(e),
    };
    backend.release_scratch(scratch);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::software::SoftwareBackend;

    #[test]
    fn test_read_back_releases_scratch() {
        let mut backend = SoftwareBackend::new();
        backend.allocate(64, 64).unwrap();
        backend.write_buffer(BufferId::Memory, 8, &[1, 2, 3, 4]).unwrap();

        let mut out = [0u8; 4];
        read_back(&mut backend, BufferId::Memory, 8, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(backend.live_scratch_buffers(), 0);
    }

    #[test]
    fn test_read_back_out_of_range() {
        let mut backend = SoftwareBackend::new();
        backend.allocate(16, 16).unwrap();
        let mut out = [0u8; 8];
        let result = read_back(&mut backend, BufferId::Registers, 12, &mut out);
        assert!(matches!(result, Err(TransferError::OutOfRange { .. })));
        assert_eq!(backend.live_scratch_buffers(), 0);
    }

    #[test]
    fn test_transfer_error_display() {
        let err = TransferError::OutOfRange {
            buffer: BufferId::Memory,
            offset: 0xFF000,
            len: 64,
        };
        assert_eq!(err.to_string(), "range 0xFF000+64 outside memory buffer");
        assert_eq!(TransferError::Unavailable.to_string(), "backend unavailable");
    }
}
