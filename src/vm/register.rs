//! Register - per-core register bank layout
//!
//! ## Slot Layout (46 × u32 per core)
//!
//! ```text
//! General  (0x00-0x1F): x0..x31, x0 hard-wired to zero
//! Control  (0x20-0x25): pc, cycles lo, cycles hi, status, program base, sbi calls
//! Reserved (0x26-0x2D): zero
//! ```
//!
//! Banks for all cores live in one flat buffer; core `n` starts at byte
//! `n * REGISTERS_PER_CORE * 4`.

use std::fmt;

/// Slots per core
pub const REGISTERS_PER_CORE: usize = 46;

/// Bytes per core bank
pub const BANK_BYTES: usize = REGISTERS_PER_CORE * 4;

/// Number of general-purpose registers
pub const GENERAL_REGISTERS: usize = 32;

/// A slot in a core's register bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(pub u8);

impl Register {
    pub const PC: Self = Self(0x20);
    pub const CYCLES_LO: Self = Self(0x21);
    pub const CYCLES_HI: Self = Self(0x22);
    pub const STATUS: Self = Self(0x23);
    pub const PROGRAM_BASE: Self = Self(0x24);
    pub const SBI_CALLS: Self = Self(0x25);

    // Supervisor call ABI
    pub const A0: Self = Self(10);
    pub const A1: Self = Self(11);
    pub const A6: Self = Self(16);
    pub const A7: Self = Self(17);

    /// General register x`n`
    pub const fn x(n: u8) -> Self {
        debug_assert!(n < 32, "General register index must be 0-31");
        Self(n & 0x1F)
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    pub const fn is_general(&self) -> bool {
        (self.0 as usize) < GENERAL_REGISTERS
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PC => write!(f, "pc"),
            Self::CYCLES_LO => write!(f, "cycles_lo"),
            Self::CYCLES_HI => write!(f, "cycles_hi"),
            Self::STATUS => write!(f, "status"),
            Self::PROGRAM_BASE => write!(f, "base"),
            Self::SBI_CALLS => write!(f, "sbi_calls"),
            r if r.is_general() => write!(f, "x{}", r.0),
            r => write!(f, "r{}", r.0),
        }
    }
}

/// Core status bits (stored in [`Register::STATUS`])
pub mod status {
    /// Halt instruction retired, or fault
    pub const HALTED: u32 = 1 << 0;
    /// `ecall` posted, waiting for the bridge to answer
    pub const AWAITING_SBI: u32 = 1 << 1;
    /// pc left program memory
    pub const FAULT: u32 = 1 << 2;
}

/// One core's register bank, by value
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile(pub [u32; REGISTERS_PER_CORE]);

impl RegisterFile {
    pub const fn zeroed() -> Self {
        Self([0; REGISTERS_PER_CORE])
    }

    /// Fresh bank for a core whose program starts at `program_base`
    pub fn reset(program_base: u32) -> Self {
        let mut file = Self::zeroed();
        file.set(Register::PC, program_base);
        file.set(Register::PROGRAM_BASE, program_base);
        file
    }

    pub fn get(&self, reg: Register) -> u32 {
        self.0[reg.index()]
    }

    /// Writes to x0 are dropped
    pub fn set(&mut self, reg: Register, value: u32) {
        if reg.index() != 0 {
            self.0[reg.index()] = value;
        }
    }

    pub fn pc(&self) -> u32 {
        self.get(Register::PC)
    }

    pub fn cycles(&self) -> u64 {
        (self.get(Register::CYCLES_HI) as u64) << 32 | self.get(Register::CYCLES_LO) as u64
    }

    pub fn set_cycles(&mut self, cycles: u64) {
        self.set(Register::CYCLES_LO, cycles as u32);
        self.set(Register::CYCLES_HI, (cycles >> 32) as u32);
    }

    pub fn status(&self) -> u32 {
        self.get(Register::STATUS)
    }

    pub fn is_halted(&self) -> bool {
        self.status() & status::HALTED != 0
    }

    pub fn to_le_bytes(&self) -> [u8; BANK_BYTES] {
        let mut out = [0u8; BANK_BYTES];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Inverse of [`to_le_bytes`](Self::to_le_bytes); `bytes` must hold a
    /// full bank
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < BANK_BYTES {
            return None;
        }
        let mut file = Self::zeroed();
        for (word, chunk) in file.0.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Some(file)
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegisterFile(pc=0x{:05X}, cycles={}, status=0b{:03b})",
            self.pc(),
            self.cycles(),
            self.status()
        )
    }
}
