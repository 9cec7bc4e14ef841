//! CPU reference backend
//!
//! Runs the dispatch on the host at submit time and holds the result until
//! `wait`. Only the instructions the substrate itself depends on are
//! executed:
//!
//! | Instruction | Effect |
//! |-------------|--------|
//! | `addi`      | `rd = rs1 + imm` |
//! | `lui`       | `rd = imm << 12` |
//! | `ecall`     | post a supervisor call to the mailbox, wait for the answer |
//! | `ebreak`    | halt |
//!
//! Anything else retires as a no-op.

use super::backend::{ComputeBackend, Dispatch, ScratchId, TransferError};
use super::memory::{BufferId, MAILBOX, PROGRAM};
use super::register::{status, Register, RegisterFile, BANK_BYTES};
use crate::glyph::{ECALL, HALT};
use crate::sbi::mailbox::offsets;
use std::collections::HashMap;

const OPCODE_OP_IMM: u32 = 0x13;
const OPCODE_LUI: u32 = 0x37;

/// Encode `addi rd, rs1, imm` (imm is truncated to 12 bits)
pub const fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    ((imm as u32 & 0xFFF) << 20) | ((rs1 as u32 & 0x1F) << 15) | ((rd as u32 & 0x1F) << 7) | OPCODE_OP_IMM
}

/// Encode `lui rd, imm` (imm is the upper 20 bits)
pub const fn lui(rd: u8, imm: u32) -> u32 {
    ((imm & 0xF_FFFF) << 12) | ((rd as u32 & 0x1F) << 7) | OPCODE_LUI
}

/// Program that writes `text` through console putchar calls, then halts
pub fn console_program(text: &[u8]) -> Vec<u32> {
    let mut program = Vec::with_capacity(text.len() * 2 + 3);
    program.push(addi(17, 0, crate::sbi::EID_CONSOLE as i32));
    program.push(addi(16, 0, crate::sbi::console::FID_PUTCHAR as i32));
    for &byte in text {
        program.push(addi(10, 0, byte as i32));
        program.push(ECALL);
    }
    program.push(HALT);
    program
}

/// Host-memory implementation of [`ComputeBackend`]
pub struct SoftwareBackend {
    online: bool,
    memory: Vec<u8>,
    registers: Vec<u8>,
    allocated: bool,
    scratch: HashMap<u32, Vec<u8>>,
    next_scratch: u32,
    in_flight: Option<u64>,
    /// Core whose ecall currently occupies the mailbox
    sbi_owner: Option<u32>,
    /// Transfers left to fail, for exercising retry paths
    failures_pending: u32,
    dispatches: u64,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            online: true,
            memory: Vec::new(),
            registers: Vec::new(),
            allocated: false,
            scratch: HashMap::new(),
            next_scratch: 0,
            in_flight: None,
            sbi_owner: None,
            failures_pending: 0,
            dispatches: 0,
        }
    }

    /// Backend that reports no device
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::new()
        }
    }

    /// Make the next `count` transfers fail with `Unavailable`
    pub fn fail_next_transfers(&mut self, count: u32) {
        self.failures_pending = count;
    }

    /// Scratch buffers not yet released
    pub fn live_scratch_buffers(&self) -> usize {
        self.scratch.len()
    }

    /// Dispatches completed so far
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches
    }

    fn check_transfer(&mut self) -> Result<(), TransferError> {
        if !self.online {
            return Err(TransferError::Unavailable);
        }
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(TransferError::Unavailable);
        }
        Ok(())
    }

    fn buffer(&self, buffer: BufferId) -> Result<&Vec<u8>, TransferError> {
        if !self.allocated {
            return Err(TransferError::NotAllocated(buffer));
        }
        Ok(match buffer {
            BufferId::Memory => &self.memory,
            BufferId::Registers => &self.registers,
        })
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut Vec<u8>, TransferError> {
        if !self.allocated {
            return Err(TransferError::NotAllocated(buffer));
        }
        Ok(match buffer {
            BufferId::Memory => &mut self.memory,
            BufferId::Registers => &mut self.registers,
        })
    }

    fn mem_word(&self, addr: u32) -> Option<u32> {
        let start = addr as usize;
        let bytes = self.memory.get(start..start + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn set_mem_word(&mut self, addr: u32, value: u32) -> bool {
        let start = addr as usize;
        match self.memory.get_mut(start..start + 4) {
            Some(bytes) => {
                bytes.copy_from_slice(&value.to_le_bytes());
                true
            }
            None => false,
        }
    }

    fn mailbox_word(&self, offset: u32) -> Option<u32> {
        self.mem_word(MAILBOX.base + offset)
    }

    /// Post the core's ecall; false when the mailbox is busy or missing
    fn post_call(&mut self, core: u32, regs: &RegisterFile) -> bool {
        match self.mailbox_word(offsets::FLAG) {
            Some(0) => {}
            _ => return false,
        }
        let sequence = self.mailbox_word(offsets::SEQUENCE).unwrap_or(0).wrapping_add(1);
        self.set_mem_word(MAILBOX.base + offsets::EID, regs.get(Register::A7));
        self.set_mem_word(MAILBOX.base + offsets::FID, regs.get(Register::A6));
        for i in 0..6u8 {
            let value = regs.get(Register::x(10 + i));
            self.set_mem_word(MAILBOX.base + offsets::ARGS + i as u32 * 4, value);
        }
        self.set_mem_word(MAILBOX.base + offsets::RET_ERROR, 0);
        self.set_mem_word(MAILBOX.base + offsets::RET_VALUE, 0);
        self.set_mem_word(MAILBOX.base + offsets::SEQUENCE, sequence);
        self.set_mem_word(MAILBOX.base + offsets::FLAG, 1);
        self.sbi_owner = Some(core);
        true
    }

    fn run_core(&mut self, core: u32, budget: u32) {
        let start = core as usize * BANK_BYTES;
        let Some(bank) = self.registers.get(start..start + BANK_BYTES) else {
            return;
        };
        let Some(mut regs) = RegisterFile::from_le_bytes(bank) else {
            return;
        };
        if regs.is_halted() {
            return;
        }

        let mut state = regs.status();
        let mut cycles = regs.cycles();

        if state & status::AWAITING_SBI != 0 {
            let answered = self.sbi_owner == Some(core)
                && self.mailbox_word(offsets::FLAG) == Some(0);
            if !answered {
                return;
            }
            let error = self.mailbox_word(offsets::RET_ERROR).unwrap_or(0);
            let value = self.mailbox_word(offsets::RET_VALUE).unwrap_or(0);
            regs.set(Register::A0, error);
            regs.set(Register::A1, value);
            regs.set(Register::PC, regs.pc().wrapping_add(4));
            state &= !status::AWAITING_SBI;
            self.sbi_owner = None;
        }

        for _ in 0..budget {
            let pc = regs.pc();
            let word = match PROGRAM.contains_range(pc, 4) && pc % 4 == 0 {
                true => self.mem_word(pc),
                false => None,
            };
            let Some(word) = word else {
                state |= status::HALTED | status::FAULT;
                break;
            };

            if word == HALT {
                state |= status::HALTED;
                cycles += 1;
                break;
            }
            if word == ECALL {
                if self.post_call(core, &regs) {
                    state |= status::AWAITING_SBI;
                    let calls = regs.get(Register::SBI_CALLS).wrapping_add(1);
                    regs.set(Register::SBI_CALLS, calls);
                    cycles += 1;
                }
                // pc stays on the ecall until the answer is loaded
                break;
            }

            let rd = Register::x(((word >> 7) & 0x1F) as u8);
            match word & 0x7F {
                OPCODE_OP_IMM if (word >> 12) & 0x7 == 0 => {
                    let rs1 = Register::x(((word >> 15) & 0x1F) as u8);
                    let imm = (word as i32) >> 20;
                    regs.set(rd, regs.get(rs1).wrapping_add(imm as u32));
                }
                OPCODE_LUI => regs.set(rd, word & 0xFFFF_F000),
                _ => {}
            }
            regs.set(Register::PC, pc.wrapping_add(4));
            cycles += 1;
        }

        regs.set(Register::STATUS, state);
        regs.set_cycles(cycles);
        self.registers[start..start + BANK_BYTES].copy_from_slice(&regs.to_le_bytes());
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn is_available(&self) -> bool {
        self.online
    }

    fn allocate(&mut self, memory_bytes: usize, register_bytes: usize) -> Result<(), TransferError> {
        if !self.online {
            return Err(TransferError::Unavailable);
        }
        self.memory = vec![0; memory_bytes];
        self.registers = vec![0; register_bytes];
        self.scratch.clear();
        self.sbi_owner = None;
        self.in_flight = None;
        self.allocated = true;
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<(), TransferError> {
        self.check_transfer()?;
        let target = self.buffer_mut(buffer)?;
        let out_of_range = TransferError::OutOfRange {
            buffer,
            offset,
            len: data.len(),
        };
        let end = offset.checked_add(data.len()).ok_or(out_of_range.clone())?;
        target
            .get_mut(offset..end)
            .ok_or(out_of_range)?
            .copy_from_slice(data);
        Ok(())
    }

    fn copy_to_scratch(&mut self, buffer: BufferId, offset: usize, len: usize) -> Result<ScratchId, TransferError> {
        self.check_transfer()?;
        let source = self.buffer(buffer)?;
        let out_of_range = TransferError::OutOfRange { buffer, offset, len };
        let end = offset.checked_add(len).ok_or(out_of_range.clone())?;
        let copy = source.get(offset..end).ok_or(out_of_range)?.to_vec();

        let id = self.next_scratch;
        self.next_scratch = self.next_scratch.wrapping_add(1);
        self.scratch.insert(id, copy);
        Ok(ScratchId(id))
    }

    fn map_scratch(&mut self, scratch: ScratchId) -> Result<&[u8], TransferError> {
        self.scratch
            .get(&scratch.0)
            .map(Vec::as_slice)
            .ok_or(TransferError::UnknownScratch(scratch.0))
    }

    fn release_scratch(&mut self, scratch: ScratchId) {
        self.scratch.remove(&scratch.0);
    }

    fn submit(&mut self, dispatch: &Dispatch) -> Result<(), TransferError> {
        if !self.online {
            return Err(TransferError::Unavailable);
        }
        if !self.allocated {
            return Err(TransferError::NotAllocated(BufferId::Registers));
        }
        if let Some(id) = self.in_flight {
            return Err(TransferError::Dispatch(format!("dispatch {} not yet waited on", id)));
        }
        for &core in &dispatch.cores {
            self.run_core(core, dispatch.cycle_budget);
        }
        self.in_flight = Some(dispatch.id);
        Ok(())
    }

    fn wait(&mut self) -> Result<(), TransferError> {
        if self.in_flight.take().is_some() {
            self.dispatches += 1;
        }
        Ok(())
    }
}
