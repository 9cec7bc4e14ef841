//! Base extension (EID 0x10): implementation identity and probing

use super::{ProtocolError, SbiExtension, SbiResponse, EID_BASE};

pub const FID_GET_SPEC_VERSION: u32 = 0;
pub const FID_GET_IMPL_ID: u32 = 1;
pub const FID_GET_IMPL_VERSION: u32 = 2;
pub const FID_PROBE_EXTENSION: u32 = 3;
pub const FID_GET_MVENDORID: u32 = 4;
pub const FID_GET_MARCHID: u32 = 5;
pub const FID_GET_MIMPID: u32 = 6;

/// SBI v1.0: major in bits 24..31, minor in 0..24
pub const SPEC_VERSION: u32 = 0x0100_0000;
pub const IMPL_ID: u32 = 0;
pub const IMPL_VERSION: u32 = 1;

pub fn handle(fid: u32, args: &[u32; 6]) -> Result<SbiResponse, ProtocolError> {
    let value = match fid {
        FID_GET_SPEC_VERSION => SPEC_VERSION,
        FID_GET_IMPL_ID => IMPL_ID,
        FID_GET_IMPL_VERSION => IMPL_VERSION,
        FID_PROBE_EXTENSION => SbiExtension::from_eid(args[0]).is_ok() as u32,
        FID_GET_MVENDORID | FID_GET_MARCHID | FID_GET_MIMPID => 0,
        _ => return Err(ProtocolError::UnknownFunction { eid: EID_BASE, fid }),
    };
    Ok(SbiResponse::success(value))
}
