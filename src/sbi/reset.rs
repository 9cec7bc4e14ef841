//! System-reset extension (EID "SRST")
//!
//! The bridge only records the request. Whether any core halts is up to
//! the owner of the Execution Manager.

use super::{ProtocolError, SbiResponse, EID_SRST};
use std::fmt;

pub const FID_SYSTEM_RESET: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    Shutdown,
    ColdReboot,
    WarmReboot,
    /// Reserved or vendor-specific type, kept as sent
    Other(u32),
}

impl ResetType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Shutdown,
            1 => Self::ColdReboot,
            2 => Self::WarmReboot,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::ColdReboot => write!(f, "cold reboot"),
            Self::WarmReboot => write!(f, "warm reboot"),
            Self::Other(raw) => write!(f, "reset type 0x{:08X}", raw),
        }
    }
}

/// Reset recorded from a guest call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequest {
    pub kind: ResetType,
    pub reason: u32,
}

pub fn handle(fid: u32, args: &[u32; 6]) -> Result<(SbiResponse, ResetRequest), ProtocolError> {
    if fid != FID_SYSTEM_RESET {
        return Err(ProtocolError::UnknownFunction { eid: EID_SRST, fid });
    }
    let request = ResetRequest {
        kind: ResetType::from_raw(args[0]),
        reason: args[1],
    };
    log::info!("guest requested {} (reason {})", request.kind, request.reason);
    Ok((SbiResponse::success(0), request))
}
