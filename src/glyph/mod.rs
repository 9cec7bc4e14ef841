//! Glyph Instruction Decoder - pixel images to instruction streams
//!
//! A glyph program is an RGBA image plus a dictionary document. Each pixel
//! names one instruction:
//!
//! ```text
//! R: visual glyph index (rendering only, never executed)
//! G: TokenID high byte  ┐
//! B: TokenID low byte   ┘ TokenID = (G << 8) | B
//! A: 0xFF = executable, anything else = no-op
//! ```
//!
//! The dictionary maps TokenID → 32-bit instruction word:
//!
//! ```json
//! { "type": "riscv-morphological",
//!   "dictionary": { "instructions": [19, 115, null, 1048691] } }
//! ```
//!
//! Decoding never fails per pixel: non-executable pixels, out-of-range
//! tokens and absent (`null`) entries all become [`NOP`]. Only the
//! document-level checks (type marker, empty list, unreadable image) fail.

mod decoder;
mod dictionary;
mod encoder;

pub use decoder::{
    decode_pixel, decode_rgba, decode_token_id, lookup_instruction, DecodeReport, DecodedProgram,
    PixelClass,
};
pub use dictionary::{DictionaryDocument, DictionaryBody, InstructionDictionary};
pub use encoder::{encode_program, EncodedImage};

/// Canonical no-op: `addi x0, x0, 0`
pub const NOP: u32 = 0x0000_0013;

/// Halt: `ebreak`
pub const HALT: u32 = 0x0010_0073;

/// Supervisor call: `ecall`
pub const ECALL: u32 = 0x0000_0073;

/// Alpha value marking a pixel as executable
pub const EXECUTABLE_ALPHA: u8 = 0xFF;

/// Required `type` of a dictionary document
pub const DICTIONARY_TYPE: &str = "riscv-morphological";

/// Number of distinct TokenIDs
pub const MAX_TOKENS: usize = 1 << 16;
