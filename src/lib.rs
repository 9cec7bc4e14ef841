//! # Glyphcore - Pixel-Encoded Execution Substrate
//!
//! Programs are images. Each executable pixel names an instruction through a
//! dictionary shipped next to the image; the decoded stream runs on execution
//! cores that share one memory region with the host.
//!
//! ## Core Components
//!
//! - **Glyph decoder**: image + dictionary document → instruction stream
//! - **Execution Manager**: shared region, core slots, dispatch cycle
//! - **SBI bridge**: services supervisor calls posted to the memory-mapped mailbox
//! - **Supervisor**: ties manager and bridge into a run loop
//!
//! ## Example
//!
//! ```ignore
//! use glyphcore::{load_path, BridgeConfig, ExecutionManager, ManagerConfig, PositionKey, SoftwareBackend, Supervisor};
//!
//! let program = load_path("boot/hello")?;
//!
//! let mut manager = ExecutionManager::new(SoftwareBackend::new(), ManagerConfig::default())?;
//! manager.initialize()?;
//! let key = PositionKey::new(0, 0);
//! manager.register_glyph(key, 0)?;
//! manager.reload_glyph(key, &program)?;
//!
//! let mut supervisor = Supervisor::new(manager, &BridgeConfig::default())?;
//! supervisor.run(1000)?;
//! for line in supervisor.console().lines() {
//!     println!("{}", line);
//! }
//! ```

pub mod config;
pub use config::{BridgeConfig, ManagerConfig, RuntimeConfig};

pub mod error;
pub use error::{DecodeError, GlyphError, Result};

// Image + dictionary → instruction stream
pub mod glyph;
pub use glyph::{
    decode_pixel, decode_rgba, decode_token_id, encode_program, lookup_instruction,
    DecodeReport, DecodedProgram, DictionaryDocument, InstructionDictionary,
};

pub mod loader;
pub use loader::{load, load_from_dir, load_path, DictionarySource, GlyphLoader, ImageSource};

pub mod retry;
pub use retry::RetryPolicy;

// Supervisor Binary Interface
pub mod sbi;
pub use sbi::{SbiBridge, SbiCallRecord, SbiRequest, SbiResponse, SbiStatus};

mod supervisor;
pub use supervisor::{Supervisor, TickReport};

pub mod validate;

// Execution cores
pub mod vm;
pub use vm::{
    ComputeBackend, DispatchSummary, ExecutionManager, ExecutionState, GlyphReloadManager,
    PositionKey, SoftwareBackend,
};
