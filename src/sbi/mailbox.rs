//! Mailbox channel - typed request/response over the shared window
//!
//! ```text
//! 0x00  flag       guest sets 1, host clears to 0 after answering
//! 0x04  eid
//! 0x08  fid
//! 0x0C  args[0..6]
//! 0x24  ret error  (i32, two's complement)
//! 0x28  ret value
//! 0x2C  sequence   guest increments on every call
//! ```
//!
//! All words are little-endian. The flag is the only synchronization
//! signal: the host writes both return words first and clears the flag
//! last, after checking the sequence word still names the call it answered.

use super::{SbiRequest, SbiResponse};
use crate::vm::backend::TransferError;
use crate::vm::memory::{BufferId, MAILBOX};

/// Field offsets relative to the mailbox base
pub mod offsets {
    pub const FLAG: u32 = 0x00;
    pub const EID: u32 = 0x04;
    pub const FID: u32 = 0x08;
    pub const ARGS: u32 = 0x0C;
    pub const RET_ERROR: u32 = 0x24;
    pub const RET_VALUE: u32 = 0x28;
    pub const SEQUENCE: u32 = 0x2C;
}

/// Bytes covered by the mailbox fields
pub const MAILBOX_BYTES: usize = MAILBOX.len as usize;

/// Byte transport under the channel. Offsets are relative to the mailbox
/// base and must stay inside it.
pub trait Mailbox {
    fn read(&mut self, offset: u32, out: &mut [u8]) -> Result<(), TransferError>;
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), TransferError>;
}

/// Reject ranges that leave the mailbox window
pub(crate) fn check_window(offset: u32, len: usize) -> Result<(), TransferError> {
    if (offset as usize).saturating_add(len) > MAILBOX_BYTES {
        return Err(TransferError::OutOfRange {
            buffer: BufferId::Memory,
            offset: MAILBOX.base as usize + offset as usize,
            len,
        });
    }
    Ok(())
}

fn word_at(bytes: &[u8], offset: u32) -> u32 {
    let i = offset as usize;
    u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
}

fn read_word<M: Mailbox + ?Sized>(mailbox: &mut M, offset: u32) -> Result<u32, TransferError> {
    let mut word = [0u8; 4];
    mailbox.read(offset, &mut word)?;
    Ok(u32::from_le_bytes(word))
}

/// Outcome of the flag-clear step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Flag cleared for the expected call
    Cleared,
    /// Sequence moved on; the flag belongs to a newer call and was left set
    Stale { expected: u32, found: u32 },
}

/// Typed operations on a [`Mailbox`]
pub struct MailboxChannel;

impl MailboxChannel {
    /// Read the pending flag without modifying anything
    pub fn is_pending<M: Mailbox + ?Sized>(mailbox: &mut M) -> Result<bool, TransferError> {
        Ok(read_word(mailbox, offsets::FLAG)? != 0)
    }

    /// One batched read of the whole request
    pub fn read_request<M: Mailbox + ?Sized>(mailbox: &mut M) -> Result<SbiRequest, TransferError> {
        let mut raw = [0u8; MAILBOX_BYTES];
        mailbox.read(0, &mut raw)?;

        let mut args = [0u32; 6];
        for (i, arg) in args.iter_mut().enumerate() {
            *arg = word_at(&raw, offsets::ARGS + i as u32 * 4);
        }
        Ok(SbiRequest {
            eid: word_at(&raw, offsets::EID),
            fid: word_at(&raw, offsets::FID),
            args,
            sequence: word_at(&raw, offsets::SEQUENCE),
        })
    }

    /// Commit both return words in one write
    pub fn write_response<M: Mailbox + ?Sized>(
        mailbox: &mut M,
        response: &SbiResponse,
    ) -> Result<(), TransferError> {
        let mut words = [0u8; 8];
        words[..4].copy_from_slice(&response.error_word().to_le_bytes());
        words[4..].copy_from_slice(&response.value.to_le_bytes());
        mailbox.write(offsets::RET_ERROR, &words)
    }

    /// Clear the flag if the mailbox still holds call `expected`
    pub fn clear_pending<M: Mailbox + ?Sized>(
        mailbox: &mut M,
        expected: u32,
    ) -> Result<ClearOutcome, TransferError> {
        let found = read_word(mailbox, offsets::SEQUENCE)?;
        if found != expected {
            return Ok(ClearOutcome::Stale { expected, found });
        }
        mailbox.write(offsets::FLAG, &0u32.to_le_bytes())?;
        Ok(ClearOutcome::Cleared)
    }
}

/// In-process mailbox, for hosts without a device and for tests.
///
/// Also plays the guest side: [`post`](Self::post) writes a request the
/// way a core's `ecall` would.
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    bytes: [u8; MAILBOX_BYTES],
    fail_reads: u32,
    fail_writes: u32,
    writes: Vec<u32>,
}

impl LocalMailbox {
    pub fn new() -> Self {
        Self {
            bytes: [0; MAILBOX_BYTES],
            fail_reads: 0,
            fail_writes: 0,
            writes: Vec::new(),
        }
    }

    /// Guest side: fill in a call, bump the sequence, raise the flag
    pub fn post(&mut self, eid: u32, fid: u32, args: [u32; 6]) -> u32 {
        let sequence = self.word(offsets::SEQUENCE).unwrap_or(0).wrapping_add(1);
        self.put(offsets::EID, eid);
        self.put(offsets::FID, fid);
        for (i, arg) in args.iter().enumerate() {
            self.put(offsets::ARGS + i as u32 * 4, *arg);
        }
        self.put(offsets::SEQUENCE, sequence);
        self.put(offsets::FLAG, 1);
        sequence
    }

    fn put(&mut self, offset: u32, value: u32) {
        let i = offset as usize;
        if let Some(word) = self.bytes.get_mut(i..i + 4) {
            word.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Word at `offset`, `None` outside the window
    pub fn word(&self, offset: u32) -> Option<u32> {
        check_window(offset, 4).ok()?;
        Some(word_at(&self.bytes, offset))
    }

    /// Guest-side store; stores outside the window are rejected
    pub fn set_word(&mut self, offset: u32, value: u32) -> Result<(), TransferError> {
        check_window(offset, 4)?;
        self.put(offset, value);
        Ok(())
    }

    /// `(error, value)` return words
    pub fn response(&self) -> (i32, u32) {
        (
            self.word(offsets::RET_ERROR).unwrap_or(0) as i32,
            self.word(offsets::RET_VALUE).unwrap_or(0),
        )
    }

    pub fn is_pending(&self) -> bool {
        self.word(offsets::FLAG).map_or(false, |flag| flag != 0)
    }

    pub fn fail_next_reads(&mut self, count: u32) {
        self.fail_reads = count;
    }

    pub fn fail_next_writes(&mut self, count: u32) {
        self.fail_writes = count;
    }

    /// Offsets of every successful write, oldest first
    pub fn write_log(&self) -> &[u32] {
        &self.writes
    }
}

impl Default for LocalMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox for LocalMailbox {
    fn read(&mut self, offset: u32, out: &mut [u8]) -> Result<(), TransferError> {
        check_window(offset, out.len())?;
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(TransferError::Unavailable);
        }
        let start = offset as usize;
        out.copy_from_slice(&self.bytes[start..start + out.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), TransferError> {
        check_window(offset, data.len())?;
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(TransferError::Unavailable);
        }
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self.writes.push(offset);
        Ok(())
    }
}
