//! Supervisor loop
//!
//! Couples one [`ExecutionManager`] with one [`SbiBridge`]. Each tick runs a
//! dispatch to completion, services pending supervisor calls, then applies
//! any reset the guest requested.

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::sbi::{Console, ResetRequest, SbiBridge, SbiCallRecord};
use crate::vm::{ComputeBackend, DispatchSummary, ExecutionManager};

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub dispatch: DispatchSummary,
    pub calls: Vec<SbiCallRecord>,
    pub resets: Vec<ResetRequest>,
}

pub struct Supervisor<B: ComputeBackend> {
    manager: ExecutionManager<B>,
    bridge: SbiBridge,
    max_calls_per_tick: usize,
}

impl<B: ComputeBackend> Supervisor<B> {
    pub fn new(manager: ExecutionManager<B>, config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            manager,
            bridge: SbiBridge::new(config),
            max_calls_per_tick: config.max_calls_per_tick,
        })
    }

    /// One dispatch, then calls, then resets.
    ///
    /// A transient mailbox failure ends the call phase early; the call stays
    /// pending for the next tick. Fatal errors propagate.
    pub fn tick(&mut self) -> Result<TickReport> {
        let dispatch = self.manager.step()?;

        let mut calls = Vec::new();
        while calls.len() < self.max_calls_per_tick {
            let mut mailbox = self.manager.mailbox()?;
            match self.bridge.handle_call(&mut mailbox) {
                Ok(Some(record)) => calls.push(record),
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    log::error!("supervisor call servicing failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("deferring supervisor call to next tick: {}", e);
                    break;
                }
            }
        }

        let resets = self.bridge.take_reset_requests();
        for request in &resets {
            self.manager.apply_reset(request)?;
        }

        Ok(TickReport {
            dispatch,
            calls,
            resets,
        })
    }

    /// Tick until every core halts or `max_ticks` elapse.
    /// Returns the number of ticks run.
    pub fn run(&mut self, max_ticks: usize) -> Result<usize> {
        for tick in 0..max_ticks {
            if self.manager.all_halted() {
                return Ok(tick);
            }
            self.tick()?;
        }
        Ok(max_ticks)
    }

    pub fn manager(&self) -> &ExecutionManager<B> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ExecutionManager<B> {
        &mut self.manager
    }

    pub fn bridge(&self) -> &SbiBridge {
        &self.bridge
    }

    pub fn console(&self) -> &Console {
        self.bridge.console()
    }

    /// Give the manager back, dropping the bridge
    pub fn into_manager(self) -> ExecutionManager<B> {
        self.manager
    }
}
