//! Shared memory region layout
//!
//! ```text
//! 0x00000 ┌──────────────────────┐
//!         │ program memory 256K  │  glyph instruction streams
//! 0x40000 ├──────────────────────┤
//!         │ data / stack   512K  │
//! 0xC0000 ├──────────────────────┤
//!         │ console I/O      4K  │  memory-mapped
//! 0xC1000 ├──────────────────────┤
//!         │ framebuffer    248K  │  memory-mapped
//! 0xFF000 ├──────────────────────┤
//!         │ SBI mailbox    0x30  │  bridge-owned window
//!         │ (reserved)           │
//! 0x100000└──────────────────────┘
//! ```

use std::fmt;

/// Total size of the shared region (1 MiB)
pub const MEMORY_SIZE: usize = 0x10_0000;

/// Contiguous sub-range of the shared region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub base: u32,
    pub len: u32,
}

impl Region {
    pub const fn new(name: &'static str, base: u32, len: u32) -> Self {
        Self { name, base, len }
    }

    /// One past the last byte
    pub const fn end(&self) -> u32 {
        self.base + self.len
    }

    /// Whether `[addr, addr + len)` lies fully inside the region
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        let Ok(len) = u32::try_from(len) else {
            return false;
        };
        match addr.checked_add(len) {
            Some(end) => addr >= self.base && end <= self.end(),
            None => false,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[0x{:05X}..0x{:05X})", self.name, self.base, self.end())
    }
}

pub const PROGRAM: Region = Region::new("program", 0x00000, 0x40000);
pub const DATA: Region = Region::new("data", 0x40000, 0x80000);
pub const CONSOLE: Region = Region::new("console", 0xC0000, 0x01000);
pub const FRAMEBUFFER: Region = Region::new("framebuffer", 0xC1000, 0x3E000);
pub const MAILBOX: Region = Region::new("mailbox", 0xFF000, 0x30);

/// All reserved regions in address order
pub const MEMORY_MAP: [Region; 5] = [PROGRAM, DATA, CONSOLE, FRAMEBUFFER, MAILBOX];

/// Backend buffers the manager allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    /// The shared memory region
    Memory,
    /// Flat register bank buffer, indexed by core id
    Registers,
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Registers => write!(f, "registers"),
        }
    }
}
