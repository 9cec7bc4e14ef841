//! Read-only views handed to presentation-layer collaborators

use super::register::{status, RegisterFile, REGISTERS_PER_CORE};
use super::slots::{CoreId, PositionKey};

/// Copy of one core's state after the last completed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionState {
    pub core_id: CoreId,
    pub registers: [u32; REGISTERS_PER_CORE],
    pub pc: u32,
    pub cycles: u64,
    pub halted: bool,
    /// Core is stalled on an unanswered supervisor call
    pub awaiting_sbi: bool,
    /// Core halted because its pc left program memory
    pub faulted: bool,
}

impl ExecutionState {
    pub(crate) fn capture(core_id: CoreId, file: &RegisterFile) -> Self {
        let bits = file.status();
        Self {
            core_id,
            registers: file.0,
            pc: file.pc(),
            cycles: file.cycles(),
            halted: bits & status::HALTED != 0,
            awaiting_sbi: bits & status::AWAITING_SBI != 0,
            faulted: bits & status::FAULT != 0,
        }
    }
}

/// Entry of the assignment table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveGlyph {
    pub key: PositionKey,
    pub core_id: CoreId,
}
