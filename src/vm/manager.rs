//! Core Execution Manager
//!
//! Owns the shared memory region and the register bank buffer on a
//! [`ComputeBackend`], maps position keys to core slots, and drives
//! dispatches.
//!
//! ## Dispatch cycle
//!
//! ```text
//! execute()  ── submit ──▶ backend runs every assigned, non-halted core
//!                          for `cycles_per_dispatch` instructions
//! complete() ── wait ────▶ read back register banks into the host cache
//! mailbox()  ───────────▶ bridge services calls between dispatches
//! ```
//!
//! Exactly one dispatch may be in flight. `execute` while one is
//! outstanding is rejected with `DispatchInFlight`, as is any access to
//! the shared region.
//!
//! ## Disabled execution
//!
//! If the backend is unavailable, `initialize` returns `GlyphError::Init`
//! and the manager keeps running host-side: slots can be registered and
//! snapshots read, but `execute`, `load_program` and `mailbox` answer
//! `ExecutionDisabled`.

use super::backend::{read_back, ComputeBackend, Dispatch};
use super::memory::{BufferId, MAILBOX, MEMORY_SIZE, PROGRAM};
use super::register::{status, Register, RegisterFile, BANK_BYTES};
use super::slots::{CoreId, PositionKey, SlotTable};
use super::snapshot::{ActiveGlyph, ExecutionState};
use crate::config::ManagerConfig;
use crate::error::{GlyphError, Result};
use crate::glyph::DecodedProgram;
use crate::sbi::mailbox::{check_window, Mailbox};
use crate::sbi::{ResetRequest, ResetType};
use crate::vm::backend::TransferError;
use std::collections::HashSet;

/// Result of one completed dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub id: u64,
    /// Cores included in the dispatch
    pub cores: usize,
    /// Cores that reached `Halted` during this dispatch
    pub newly_halted: Vec<CoreId>,
    /// Cores stalled on a supervisor call after this dispatch
    pub awaiting_sbi: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Availability {
    Uninitialized,
    Ready,
    Disabled(String),
}

/// Execution Manager over backend `B`
///
/// The backend is owned outright; no handle to the shared region leaves
/// the crate. The mailbox window is lent to the bridge by [`Supervisor`].
///
/// ```compile_fail
/// use glyphcore::{ExecutionManager, ManagerConfig, SoftwareBackend};
///
/// let mut manager = ExecutionManager::new(SoftwareBackend::new(), ManagerConfig::default()).unwrap();
/// let _port = manager.mailbox();
/// ```
///
/// ```compile_fail
/// use glyphcore::{ExecutionManager, ManagerConfig, SoftwareBackend};
///
/// let mut manager = ExecutionManager::new(SoftwareBackend::new(), ManagerConfig::default()).unwrap();
/// let _backend = manager.backend_mut();
/// ```
///
/// [`Supervisor`]: crate::Supervisor
pub struct ExecutionManager<B: ComputeBackend> {
    backend: B,
    config: ManagerConfig,
    slots: SlotTable,
    /// Host copy of every bank as of the last completed dispatch
    banks: Vec<RegisterFile>,
    availability: Availability,
    in_flight: Option<Dispatch>,
    /// Banks released mid-dispatch, zeroed on completion
    pending_zero: Vec<CoreId>,
    next_dispatch: u64,
}

impl<B: ComputeBackend> ExecutionManager<B> {
    /// Construct without touching the backend
    pub fn new(backend: B, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            slots: SlotTable::new(config.max_cores),
            banks: vec![RegisterFile::zeroed(); config.max_cores],
            config,
            availability: Availability::Uninitialized,
            in_flight: None,
            pending_zero: Vec::new(),
            next_dispatch: 0,
        })
    }

    /// Allocate the shared region and register bank buffer.
    ///
    /// `Err(Init)` is not fatal: the manager stays usable with execution
    /// disabled.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.backend.is_available() {
            let reason = format!("{} backend unavailable", self.backend.name());
            return Err(self.disable(reason));
        }

        let register_bytes = self.config.max_cores * BANK_BYTES;
        if let Err(e) = self.backend.allocate(MEMORY_SIZE, register_bytes) {
            return Err(self.disable(e.to_string()));
        }

        // Slots registered before initialization
        let banks: Vec<u8> = self.banks.iter().flat_map(|b| b.to_le_bytes()).collect();
        let backend = &mut self.backend;
        let uploaded = self
            .config
            .transfer_retry
            .run("register bank upload", || backend.write_buffer(BufferId::Registers, 0, &banks));
        if let Err(e) = uploaded {
            return Err(self.disable(e.to_string()));
        }

        self.availability = Availability::Ready;
        log::debug!(
            "{} backend ready: {} KiB shared region, {} cores",
            self.backend.name(),
            MEMORY_SIZE / 1024,
            self.config.max_cores
        );
        Ok(())
    }

    fn disable(&mut self, reason: String) -> GlyphError {
        log::warn!("execution disabled: {}", reason);
        self.availability = Availability::Disabled(reason.clone());
        GlyphError::Init(reason)
    }

    pub fn is_execution_enabled(&self) -> bool {
        self.availability == Availability::Ready
    }

    fn ensure_enabled(&self) -> Result<()> {
        match &self.availability {
            Availability::Ready => Ok(()),
            Availability::Uninitialized => {
                Err(GlyphError::ExecutionDisabled("manager not initialized".into()))
            }
            Availability::Disabled(reason) => Err(GlyphError::ExecutionDisabled(reason.clone())),
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match &self.in_flight {
            Some(dispatch) => Err(GlyphError::DispatchInFlight(dispatch.id)),
            None => Ok(()),
        }
    }

    /// Push the host copy of `core`'s bank. Host-only while disabled.
    fn upload_bank(&mut self, core: CoreId) -> Result<()> {
        if !self.is_execution_enabled() {
            return Ok(());
        }
        let bytes = self.banks[core as usize].to_le_bytes();
        let offset = core as usize * BANK_BYTES;
        let backend = &mut self.backend;
        self.config
            .transfer_retry
            .run("register bank upload", || backend.write_buffer(BufferId::Registers, offset, &bytes))
    }

    // =========================================================================
    // Slot management
    // =========================================================================

    /// Assign a core to `key`, with its pc at `program_offset`.
    ///
    /// A key that already has a core keeps it; the existing id is returned
    /// and the core is left untouched.
    pub fn register_glyph(&mut self, key: PositionKey, program_offset: u32) -> Result<CoreId> {
        if let Some(id) = self.slots.lookup(&key) {
            log::debug!("glyph {} already on core {}", key, id);
            return Ok(id);
        }
        self.ensure_idle()?;
        if program_offset % 4 != 0 {
            return Err(GlyphError::UnalignedProgramOffset(program_offset));
        }
        if !PROGRAM.contains_range(program_offset, 4) {
            return Err(GlyphError::ProgramOutOfBounds {
                offset: program_offset,
                len: 4,
            });
        }

        let id = self.slots.assign(key).ok_or(GlyphError::Capacity {
            max_cores: self.config.max_cores,
        })?;
        self.banks[id as usize] = RegisterFile::reset(program_offset);
        if let Err(e) = self.upload_bank(id) {
            self.slots.release(&key);
            self.banks[id as usize] = RegisterFile::zeroed();
            return Err(e);
        }

        log::debug!("glyph {} -> core {} @ 0x{:05X}", key, id, program_offset);
        Ok(id)
    }

    /// Release `key`'s core. Returns whether a core was released; unknown
    /// keys are a no-op.
    pub fn unregister_glyph(&mut self, key: PositionKey) -> bool {
        let Some(id) = self.slots.release(&key) else {
            return false;
        };
        self.banks[id as usize] = RegisterFile::zeroed();
        if self.in_flight.is_some() {
            self.pending_zero.push(id);
        } else if let Err(e) = self.upload_bank(id) {
            log::warn!("core {} released but not zeroed on device: {}", id, e);
        }
        log::debug!("glyph {} released core {}", key, id);
        true
    }

    // =========================================================================
    // Program memory
    // =========================================================================

    /// Write an instruction stream into program memory at `offset`
    pub fn load_program(&mut self, offset: u32, instructions: &[u32]) -> Result<()> {
        self.ensure_enabled()?;
        self.ensure_idle()?;
        if offset % 4 != 0 {
            return Err(GlyphError::UnalignedProgramOffset(offset));
        }
        let len = instructions.len() * 4;
        if !PROGRAM.contains_range(offset, len) {
            return Err(GlyphError::ProgramOutOfBounds { offset, len });
        }

        let bytes: Vec<u8> = instructions.iter().flat_map(|w| w.to_le_bytes()).collect();
        let backend = &mut self.backend;
        self.config.transfer_retry.run("program upload", || {
            backend.write_buffer(BufferId::Memory, offset as usize, &bytes)
        })?;
        log::debug!("loaded {} instructions at 0x{:05X}", instructions.len(), offset);
        Ok(())
    }

    /// Upload a new program for `key` and restart its core
    pub fn reload_glyph(&mut self, key: PositionKey, program: &DecodedProgram) -> Result<CoreId> {
        let id = self
            .slots
            .lookup(&key)
            .ok_or_else(|| GlyphError::UnknownGlyph(key.to_string()))?;
        let base = self.banks[id as usize].get(Register::PROGRAM_BASE);
        self.load_program(base, &program.instructions)?;
        self.banks[id as usize] = RegisterFile::reset(base);
        self.upload_bank(id)?;
        log::debug!("glyph {} reloaded ({} instructions)", key, program.len());
        Ok(id)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Submit one dispatch over every assigned, non-halted core.
    /// Returns the dispatch id.
    pub fn execute(&mut self) -> Result<u64> {
        self.ensure_enabled()?;
        if let Err(e) = self.ensure_idle() {
            log::warn!("execute rejected: {}", e);
            return Err(e);
        }

        let cores: Vec<CoreId> = self
            .slots
            .assignments()
            .into_iter()
            .map(|(_, id)| id)
            .filter(|id| !self.banks[*id as usize].is_halted())
            .collect();
        let dispatch = Dispatch {
            id: self.next_dispatch,
            cores,
            cycle_budget: self.config.cycles_per_dispatch,
        };
        self.next_dispatch += 1;

        self.backend
            .submit(&dispatch)
            .map_err(|e| GlyphError::Backend(e.to_string()))?;
        let id = dispatch.id;
        self.in_flight = Some(dispatch);
        Ok(id)
    }

    /// Wait for the in-flight dispatch and refresh the host bank cache.
    /// `None` when nothing was in flight.
    pub fn complete(&mut self) -> Result<Option<DispatchSummary>> {
        let Some(dispatch) = self.in_flight.take() else {
            return Ok(None);
        };
        self.backend
            .wait()
            .map_err(|e| GlyphError::Backend(e.to_string()))?;

        for id in std::mem::take(&mut self.pending_zero) {
            if let Err(e) = self.upload_bank(id) {
                log::warn!("core {} released but not zeroed on device: {}", id, e);
            }
        }

        let mut raw = vec![0u8; self.config.max_cores * BANK_BYTES];
        let backend = &mut self.backend;
        self.config.transfer_retry.run("register read-back", || {
            read_back(backend, BufferId::Registers, 0, &mut raw)
        })?;

        let assigned: HashSet<CoreId> = self.slots.assignments().into_iter().map(|(_, id)| id).collect();
        let mut summary = DispatchSummary {
            id: dispatch.id,
            cores: dispatch.cores.len(),
            ..DispatchSummary::default()
        };
        for &id in &dispatch.cores {
            if !assigned.contains(&id) {
                continue;
            }
            let start = id as usize * BANK_BYTES;
            let Some(file) = RegisterFile::from_le_bytes(&raw[start..start + BANK_BYTES]) else {
                continue;
            };
            if file.is_halted() && !self.banks[id as usize].is_halted() {
                if file.status() & status::FAULT != 0 {
                    log::warn!("core {} faulted at pc 0x{:05X}", id, file.pc());
                } else {
                    log::debug!("core {} halted after {} cycles", id, file.cycles());
                }
                summary.newly_halted.push(id);
            }
            if file.status() & status::AWAITING_SBI != 0 {
                summary.awaiting_sbi += 1;
            }
            self.banks[id as usize] = file;
        }
        Ok(Some(summary))
    }

    /// `execute` followed by `complete`
    pub fn step(&mut self) -> Result<DispatchSummary> {
        self.execute()?;
        Ok(self.complete()?.unwrap_or_default())
    }

    pub fn is_dispatch_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    // =========================================================================
    // Host decisions
    // =========================================================================

    /// Halt every assigned core
    pub fn halt_all(&mut self) -> Result<()> {
        self.ensure_idle()?;
        for (_, id) in self.slots.assignments() {
            let bank = &mut self.banks[id as usize];
            bank.set(Register::STATUS, bank.status() | status::HALTED);
            self.upload_bank(id)?;
        }
        Ok(())
    }

    /// Act on a reset recorded by the bridge
    pub fn apply_reset(&mut self, request: &ResetRequest) -> Result<()> {
        self.ensure_idle()?;
        log::info!("applying {} (reason {})", request.kind, request.reason);
        match request.kind {
            ResetType::Shutdown => self.halt_all(),
            ResetType::ColdReboot => {
                for (_, id) in self.slots.assignments() {
                    let base = self.banks[id as usize].get(Register::PROGRAM_BASE);
                    self.banks[id as usize] = RegisterFile::reset(base);
                    self.upload_bank(id)?;
                }
                Ok(())
            }
            ResetType::WarmReboot => {
                for (_, id) in self.slots.assignments() {
                    let bank = &mut self.banks[id as usize];
                    bank.set(Register::PC, bank.get(Register::PROGRAM_BASE));
                    bank.set_cycles(0);
                    bank.set(Register::STATUS, 0);
                    self.upload_bank(id)?;
                }
                Ok(())
            }
            ResetType::Other(raw) => {
                log::warn!("ignoring unknown reset type 0x{:08X}", raw);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Read-only views
    // =========================================================================

    /// Snapshot of `key`'s core, `None` if unassigned
    pub fn get_execution_state(&self, key: PositionKey) -> Option<ExecutionState> {
        let id = self.slots.lookup(&key)?;
        Some(ExecutionState::capture(id, &self.banks[id as usize]))
    }

    /// Current assignment table, ordered by core id
    pub fn active_glyphs(&self) -> Vec<ActiveGlyph> {
        self.slots
            .assignments()
            .into_iter()
            .map(|(key, core_id)| ActiveGlyph { key, core_id })
            .collect()
    }

    /// Whether at least one core is assigned and every assigned core halted
    pub fn all_halted(&self) -> bool {
        !self.slots.is_empty()
            && self
                .slots
                .assignments()
                .iter()
                .all(|(_, id)| self.banks[*id as usize].is_halted())
    }

    pub fn assigned_count(&self) -> usize {
        self.slots.len()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Lend the mailbox window to the bridge. Only between dispatches.
    pub(crate) fn mailbox(&mut self) -> Result<MailboxPort<'_, B>> {
        self.ensure_enabled()?;
        self.ensure_idle()?;
        Ok(MailboxPort {
            backend: &mut self.backend,
        })
    }
}

/// Mailbox-only view of the shared region
pub(crate) struct MailboxPort<'a, B: ComputeBackend> {
    backend: &'a mut B,
}

impl<B: ComputeBackend> Mailbox for MailboxPort<'_, B> {
    fn read(&mut self, offset: u32, out: &mut [u8]) -> std::result::Result<(), TransferError> {
        check_window(offset, out.len())?;
        read_back(self.backend, BufferId::Memory, (MAILBOX.base + offset) as usize, out)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> std::result::Result<(), TransferError> {
        check_window(offset, data.len())?;
        self.backend
            .write_buffer(BufferId::Memory, (MAILBOX.base + offset) as usize, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{ECALL, HALT, NOP};
    use crate::retry::RetryPolicy;
    use crate::sbi::mailbox::MailboxChannel;
    use crate::vm::software::{addi, SoftwareBackend};

    fn config(max_cores: usize) -> ManagerConfig {
        ManagerConfig {
            transfer_retry: RetryPolicy::immediate(3),
            cycles_per_dispatch: 64,
            ..ManagerConfig::with_max_cores(max_cores)
        }
    }

    fn manager(max_cores: usize) -> ExecutionManager<SoftwareBackend> {
        let mut manager = ExecutionManager::new(SoftwareBackend::new(), config(max_cores)).unwrap();
        manager.initialize().unwrap();
        manager
    }

    fn key(x: i32) -> PositionKey {
        PositionKey::new(x, 0)
    }

    #[test]
    fn test_capacity_of_64() {
        let mut manager = manager(64);
        for i in 0..64 {
            assert_eq!(manager.register_glyph(key(i), 0).unwrap(), i as CoreId);
        }
        let err = manager.register_glyph(key(64), 0).unwrap_err();
        assert!(matches!(err, GlyphError::Capacity { max_cores: 64 }));
        assert_eq!(manager.assigned_count(), 64);
    }

    #[test]
    fn test_unregister_unknown_key_is_noop() {
        let mut manager = manager(4);
        manager.register_glyph(key(1), 0).unwrap();
        manager.register_glyph(key(2), 8).unwrap();
        let before = manager.active_glyphs();

        assert!(!manager.unregister_glyph(key(99)));
        assert_eq!(manager.active_glyphs(), before);
        assert_eq!(manager.get_execution_state(key(2)).unwrap().pc, 8);
    }

    #[test]
    fn test_unregister_releases_and_is_idempotent() {
        let mut manager = manager(2);
        manager.register_glyph(key(1), 0).unwrap();
        assert!(manager.unregister_glyph(key(1)));
        assert!(!manager.unregister_glyph(key(1)));
        assert!(manager.get_execution_state(key(1)).is_none());
        assert!(manager.active_glyphs().is_empty());
    }

    #[test]
    fn test_reregister_keeps_core() {
        let mut manager = manager(4);
        let id = manager.register_glyph(key(1), 0).unwrap();
        assert_eq!(manager.register_glyph(key(1), 16).unwrap(), id);
        assert_eq!(manager.get_execution_state(key(1)).unwrap().pc, 0);
        assert_eq!(manager.assigned_count(), 1);
    }

    #[test]
    fn test_register_checks_offset() {
        let mut manager = manager(4);
        assert!(matches!(
            manager.register_glyph(key(1), 2),
            Err(GlyphError::UnalignedProgramOffset(2))
        ));
        assert!(matches!(
            manager.register_glyph(key(1), PROGRAM.end()),
            Err(GlyphError::ProgramOutOfBounds { .. })
        ));
        assert_eq!(manager.assigned_count(), 0);
    }

    #[test]
    fn test_register_starts_zeroed() {
        let mut manager = manager(4);
        let id = manager.register_glyph(key(3), 0x100).unwrap();
        let state = manager.get_execution_state(key(3)).unwrap();
        assert_eq!(state.core_id, id);
        assert_eq!(state.pc, 0x100);
        assert_eq!(state.cycles, 0);
        assert!(!state.halted);
        assert!(state.registers[..32].iter().all(|r| *r == 0));
    }

    #[test]
    fn test_step_runs_to_halt() {
        let mut manager = manager(4);
        manager.load_program(0, &[addi(5, 0, 9), NOP, HALT]).unwrap();
        let id = manager.register_glyph(key(0), 0).unwrap();

        let summary = manager.step().unwrap();
        assert_eq!(summary.cores, 1);
        assert_eq!(summary.newly_halted, vec![id]);

        let state = manager.get_execution_state(key(0)).unwrap();
        assert!(state.halted);
        assert_eq!(state.registers[5], 9);
        assert_eq!(state.cycles, 3);
        assert!(manager.all_halted());

        // Halted cores are left out of later dispatches
        assert_eq!(manager.step().unwrap().cores, 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut manager = manager(1);
        manager.load_program(0, &[addi(5, 5, 1); 200]).unwrap();
        manager.register_glyph(key(0), 0).unwrap();

        manager.step().unwrap();
        let before = manager.get_execution_state(key(0)).unwrap();
        manager.step().unwrap();
        let after = manager.get_execution_state(key(0)).unwrap();

        assert_eq!(before.cycles, 64);
        assert_eq!(after.cycles, 128);
        assert_eq!(before.registers[5], 64);
    }

    #[test]
    fn test_execute_rejected_while_in_flight() {
        let mut manager = manager(2);
        manager.load_program(0, &[HALT]).unwrap();
        manager.register_glyph(key(0), 0).unwrap();

        let first = manager.execute().unwrap();
        assert!(manager.is_dispatch_in_flight());
        assert!(matches!(manager.execute(), Err(GlyphError::DispatchInFlight(id)) if id == first));
        assert!(matches!(manager.mailbox(), Err(GlyphError::DispatchInFlight(_))));
        assert!(matches!(
            manager.register_glyph(key(1), 0),
            Err(GlyphError::DispatchInFlight(_))
        ));

        assert!(manager.complete().unwrap().is_some());
        assert!(manager.complete().unwrap().is_none());
        assert!(manager.execute().is_ok());
        assert_eq!(manager.backend().dispatch_count(), 1);
    }

    #[test]
    fn test_unregister_during_dispatch() {
        let mut manager = manager(2);
        manager.load_program(0, &[addi(5, 0, 1), HALT]).unwrap();
        manager.register_glyph(key(0), 0).unwrap();

        manager.execute().unwrap();
        assert!(manager.unregister_glyph(key(0)));
        let summary = manager.complete().unwrap().unwrap();
        assert!(summary.newly_halted.is_empty());
        assert!(manager.get_execution_state(key(0)).is_none());

        // Slot comes back zeroed
        let id = manager.register_glyph(key(5), 0).unwrap();
        assert_eq!(id, 1);
        manager.unregister_glyph(key(5));
        let id = manager.register_glyph(key(6), 4).unwrap();
        assert_eq!(id, 0);
        assert_eq!(manager.get_execution_state(key(6)).unwrap().registers[5], 0);
    }

    #[test]
    fn test_offline_backend_disables_execution() {
        let mut manager =
            ExecutionManager::new(SoftwareBackend::offline(), config(4)).unwrap();
        assert!(matches!(manager.initialize(), Err(GlyphError::Init(_))));
        assert!(!manager.is_execution_enabled());

        // Host-side bookkeeping still works
        manager.register_glyph(key(0), 0).unwrap();
        assert!(manager.get_execution_state(key(0)).is_some());

        assert!(matches!(manager.execute(), Err(GlyphError::ExecutionDisabled(_))));
        assert!(matches!(manager.load_program(0, &[NOP]), Err(GlyphError::ExecutionDisabled(_))));
        assert!(matches!(manager.mailbox(), Err(GlyphError::ExecutionDisabled(_))));
        assert!(manager.unregister_glyph(key(0)));
    }

    #[test]
    fn test_uninitialized_manager() {
        let mut manager = ExecutionManager::new(SoftwareBackend::new(), config(4)).unwrap();
        assert!(matches!(manager.execute(), Err(GlyphError::ExecutionDisabled(_))));
        manager.register_glyph(key(0), 8).unwrap();

        manager.initialize().unwrap();
        manager.load_program(8, &[HALT]).unwrap();
        manager.step().unwrap();
        assert!(manager.get_execution_state(key(0)).unwrap().halted);
    }

    #[test]
    fn test_invalid_config() {
        let result = ExecutionManager::new(SoftwareBackend::new(), ManagerConfig::with_max_cores(0));
        assert!(matches!(result, Err(GlyphError::Config(_))));
    }

    #[test]
    fn test_read_back_retries() {
        let mut manager = manager(1);
        manager.load_program(0, &[HALT]).unwrap();
        manager.register_glyph(key(0), 0).unwrap();

        manager.backend_mut().fail_next_transfers(2);
        assert_eq!(manager.step().unwrap().newly_halted, vec![0]);
    }

    #[test]
    fn test_read_back_retries_exhausted() {
        let mut manager = manager(1);
        manager.register_glyph(key(0), 0).unwrap();

        manager.backend_mut().fail_next_transfers(3);
        let err = manager.step().unwrap_err();
        assert!(matches!(err, GlyphError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.is_fatal());
        assert!(!manager.is_dispatch_in_flight());
    }

    #[test]
    fn test_load_program_bounds() {
        let mut manager = manager(1);
        assert!(matches!(
            manager.load_program(PROGRAM.end() - 4, &[NOP, NOP]),
            Err(GlyphError::ProgramOutOfBounds { len: 8, .. })
        ));
        assert!(matches!(
            manager.load_program(6, &[NOP]),
            Err(GlyphError::UnalignedProgramOffset(6))
        ));
    }

    #[test]
    fn test_mailbox_port_sees_ecall() {
        let mut manager = manager(1);
        manager
            .load_program(0, &[addi(17, 0, 0x10), addi(16, 0, 3), addi(10, 0, 1), ECALL, HALT])
            .unwrap();
        manager.register_glyph(key(0), 0).unwrap();

        let summary = manager.step().unwrap();
        assert_eq!(summary.awaiting_sbi, 1);
        assert!(manager.get_execution_state(key(0)).unwrap().awaiting_sbi);

        let mut port = manager.mailbox().unwrap();
        let request = MailboxChannel::read_request(&mut port).unwrap();
        assert_eq!((request.eid, request.fid, request.args[0]), (0x10, 3, 1));

        let mut out = [0u8; 8];
        assert!(matches!(
            port.read(0x2C, &mut out),
            Err(TransferError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_apply_reset() {
        let mut manager = manager(2);
        manager.load_program(0, &[addi(5, 0, 4), addi(6, 0, 1), addi(6, 6, 1)]).unwrap();
        manager.register_glyph(key(0), 0).unwrap();
        manager.step().unwrap();

        let warm = ResetRequest { kind: ResetType::WarmReboot, reason: 0 };
        manager.apply_reset(&warm).unwrap();
        let state = manager.get_execution_state(key(0)).unwrap();
        assert_eq!((state.pc, state.cycles), (0, 0));
        assert_eq!(state.registers[5], 4);

        let cold = ResetRequest { kind: ResetType::ColdReboot, reason: 0 };
        manager.apply_reset(&cold).unwrap();
        assert_eq!(manager.get_execution_state(key(0)).unwrap().registers[5], 0);

        let shutdown = ResetRequest { kind: ResetType::Shutdown, reason: 0 };
        manager.apply_reset(&shutdown).unwrap();
        assert!(manager.all_halted());
        assert_eq!(manager.step().unwrap().cores, 0);
    }

    #[test]
    fn test_reload_glyph() {
        let mut manager = manager(1);
        manager.load_program(0x40, &[addi(5, 0, 1), HALT]).unwrap();
        manager.register_glyph(key(0), 0x40).unwrap();
        manager.step().unwrap();
        assert!(manager.all_halted());

        let program = DecodedProgram {
            width: 2,
            height: 1,
            instructions: vec![addi(5, 0, 2), HALT],
            glyph_indices: vec![0, 0],
            report: Default::default(),
        };
        manager.reload_glyph(key(0), &program).unwrap();
        assert!(!manager.all_halted());

        manager.step().unwrap();
        assert_eq!(manager.get_execution_state(key(0)).unwrap().registers[5], 2);

        assert!(matches!(
            manager.reload_glyph(key(7), &program),
            Err(GlyphError::UnknownGlyph(_))
        ));
    }
}
