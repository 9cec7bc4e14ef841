//! Supervisor Call Bridge
//!
//! Running cores raise privileged calls by filling the mailbox window and
//! raising its flag. The bridge polls between dispatches, decodes the call,
//! routes it by extension id, writes the answer and clears the flag.
//!
//! ## Extension IDs
//!
//! ```text
//! 0x01         Console        putchar / getchar
//! 0x10         Base           identity + probing
//! 0x53525354   SystemReset    "SRST"
//! ```
//!
//! Every other EID (Timer, IPI, RFENCE, HSM, ...) is answered with
//! `NOT_SUPPORTED`. A call is never dropped.

pub mod base;
mod bridge;
pub mod console;
pub mod mailbox;
pub mod reset;

pub use bridge::{BridgeStats, SbiBridge, SbiCallRecord};
pub use console::Console;
pub use mailbox::{ClearOutcome, LocalMailbox, Mailbox, MailboxChannel};
pub use reset::{ResetRequest, ResetType};

use std::fmt;

// =============================================================================
// Extension IDs
// =============================================================================

pub const EID_CONSOLE: u32 = 0x01;
pub const EID_BASE: u32 = 0x10;
pub const EID_SRST: u32 = 0x5352_5354;
pub const EID_TIME: u32 = 0x5449_4D45;
pub const EID_IPI: u32 = 0x0073_5049;
pub const EID_RFENCE: u32 = 0x5246_4E43;
pub const EID_HSM: u32 = 0x0048_534D;

/// Extensions this bridge implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbiExtension {
    Base,
    Console,
    SystemReset,
}

impl SbiExtension {
    pub const ALL: [SbiExtension; 3] = [Self::Base, Self::Console, Self::SystemReset];

    pub fn from_eid(eid: u32) -> Result<Self, ProtocolError> {
        match eid {
            EID_BASE => Ok(Self::Base),
            EID_CONSOLE => Ok(Self::Console),
            EID_SRST => Ok(Self::SystemReset),
            other => Err(ProtocolError::UnknownExtension(other)),
        }
    }

    pub const fn eid(&self) -> u32 {
        match self {
            Self::Base => EID_BASE,
            Self::Console => EID_CONSOLE,
            Self::SystemReset => EID_SRST,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Console => "console",
            Self::SystemReset => "srst",
        }
    }
}

// =============================================================================
// Status codes and envelopes
// =============================================================================

/// Error word of a supervisor call answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SbiStatus {
    Success = 0,
    Failed = -1,
    NotSupported = -2,
    InvalidParam = -3,
    Denied = -4,
    InvalidAddress = -5,
}

impl SbiStatus {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            -1 => Some(Self::Failed),
            -2 => Some(Self::NotSupported),
            -3 => Some(Self::InvalidParam),
            -4 => Some(Self::Denied),
            -5 => Some(Self::InvalidAddress),
            _ => None,
        }
    }
}

/// Call read out of the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbiRequest {
    pub eid: u32,
    pub fid: u32,
    pub args: [u32; 6],
    /// Guest call sequence number
    pub sequence: u32,
}

/// Answer written back to the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbiResponse {
    pub error: SbiStatus,
    pub value: u32,
}

impl SbiResponse {
    pub const fn success(value: u32) -> Self {
        Self {
            error: SbiStatus::Success,
            value,
        }
    }

    pub const fn error(error: SbiStatus) -> Self {
        Self { error, value: 0 }
    }

    pub const fn not_supported() -> Self {
        Self::error(SbiStatus::NotSupported)
    }

    /// Error as the raw mailbox word
    pub const fn error_word(&self) -> u32 {
        self.error.code() as u32
    }
}

/// Call the bridge cannot route. Always answered with `NOT_SUPPORTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownExtension(u32),
    UnknownFunction { eid: u32, fid: u32 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownExtension(eid) => write!(f, "unknown SBI extension 0x{:08X}", eid),
            Self::UnknownFunction { eid, fid } => {
                write!(f, "unknown function {} in SBI extension 0x{:08X}", fid, eid)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
