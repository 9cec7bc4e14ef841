//! Core Execution Manager and its compute substrate
//!
//! Decoded glyph programs run on execution cores. Each core is a slot in a
//! flat register bank buffer; all cores share one 1 MiB memory region that
//! also hosts the console, framebuffer and supervisor-call mailbox windows.
//!
//! ## Register Banks
//!
//! ```text
//! General  (0x00-0x1F): x0..x31
//! Control  (0x20-0x25): pc, cycles lo/hi, status, program base, sbi calls
//! Reserved (0x26-0x2D)
//! ```
//!
//! ## Core lifecycle
//!
//! ```text
//! Unassigned ──register_glyph──▶ Running ──halt──▶ Halted
//!      ▲                            │                 │
//!      └──────unregister_glyph──────┴─────────────────┘
//! ```
//!
//! There is no paused state: a core only advances when `execute` runs.
//!
//! ## Backends
//!
//! The manager drives any [`ComputeBackend`]. [`SoftwareBackend`] runs
//! dispatches on the host CPU.

pub mod backend;
mod hot_reload;
mod manager;
pub mod memory;
pub mod register;
mod slots;
mod snapshot;
pub mod software;

pub use backend::{read_back, ComputeBackend, Dispatch, ScratchId, TransferError};
pub use hot_reload::{GlyphReloadManager, ReloadEvent};
pub use manager::{DispatchSummary, ExecutionManager};
pub use memory::{BufferId, Region, MEMORY_MAP, MEMORY_SIZE};
pub use register::{Register, RegisterFile, BANK_BYTES, REGISTERS_PER_CORE};
pub use slots::{CoreId, PositionKey, SlotTable};
pub use snapshot::{ActiveGlyph, ExecutionState};
pub use software::SoftwareBackend;
