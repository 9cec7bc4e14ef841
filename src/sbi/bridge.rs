//! Bridge state machine: poll, read, dispatch, answer, clear

use super::mailbox::{ClearOutcome, Mailbox, MailboxChannel};
use super::{base, reset, Console, ResetRequest, SbiExtension, SbiRequest, SbiResponse, SbiStatus};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::retry::Backoff;
use crate::vm::backend::TransferError;
use std::time::Instant;

/// One serviced call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbiCallRecord {
    pub request: SbiRequest,
    pub response: SbiResponse,
    /// False when the flag was left set because the guest already re-armed it
    pub cleared: bool,
}

/// Counters kept across the bridge's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub calls: u64,
    pub not_supported: u64,
    pub stale_clears: u64,
    pub transfer_failures: u64,
}

/// Services supervisor calls through a [`Mailbox`].
///
/// The bridge holds no mailbox handle of its own; the owner lends one for
/// each `poll` / `handle_call`.
pub struct SbiBridge {
    console: Console,
    resets: Vec<ResetRequest>,
    backoff: Backoff,
    /// Answer computed for a call whose commit has not finished yet
    answered: Option<(u32, SbiResponse)>,
    /// No mailbox access before this instant after a failed transfer
    retry_after: Option<Instant>,
    stats: BridgeStats,
}

impl SbiBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            console: Console::new(config.console_history),
            resets: Vec::new(),
            backoff: Backoff::new(config.retry.clone()),
            answered: None,
            retry_after: None,
            stats: BridgeStats::default(),
        }
    }

    /// Whether a call is waiting. Reads the flag only.
    ///
    /// While backing off after a failed transfer the mailbox is not touched
    /// and `false` is returned.
    pub fn poll<M: Mailbox + ?Sized>(&mut self, mailbox: &mut M) -> Result<bool> {
        if self.is_backing_off() {
            return Ok(false);
        }
        MailboxChannel::is_pending(mailbox).map_err(|e| self.transfer_failed(e))
    }

    /// Service the pending call, if any.
    ///
    /// On a transfer failure the call stays pending and the error is
    /// returned: `HostIo` while retries remain, `RetriesExhausted` once the
    /// ceiling is hit. Until the policy's backoff delay has passed, further
    /// calls answer `Ok(None)` without reading the mailbox. A retried call is not dispatched again; the answer
    /// computed the first time is re-committed.
    pub fn handle_call<M: Mailbox + ?Sized>(&mut self, mailbox: &mut M) -> Result<Option<SbiCallRecord>> {
        if !self.poll(mailbox)? {
            return Ok(None);
        }

        let request = MailboxChannel::read_request(mailbox).map_err(|e| self.transfer_failed(e))?;

        let response = match self.answered {
            Some((sequence, response)) if sequence == request.sequence => response,
            _ => {
                let response = self.dispatch(&request);
                self.answered = Some((request.sequence, response));
                response
            }
        };

        MailboxChannel::write_response(mailbox, &response).map_err(|e| self.transfer_failed(e))?;
        let outcome = MailboxChannel::clear_pending(mailbox, request.sequence)
            .map_err(|e| self.transfer_failed(e))?;

        self.answered = None;
        self.retry_after = None;
        self.backoff.record_success();
        self.stats.calls += 1;

        let cleared = match outcome {
            ClearOutcome::Cleared => true,
            ClearOutcome::Stale { expected, found } => {
                log::warn!(
                    "mailbox re-armed before clear (answered #{}, now #{}); flag left set",
                    expected,
                    found
                );
                self.stats.stale_clears += 1;
                false
            }
        };

        log::debug!(
            "sbi #{} eid=0x{:X} fid={} -> ({}, 0x{:X})",
            request.sequence,
            request.eid,
            request.fid,
            response.error.code(),
            response.value
        );

        Ok(Some(SbiCallRecord {
            request,
            response,
            cleared,
        }))
    }

    /// Route a request to its extension. Always produces an answer.
    pub fn dispatch(&mut self, request: &SbiRequest) -> SbiResponse {
        let routed = SbiExtension::from_eid(request.eid).and_then(|ext| match ext {
            SbiExtension::Base => base::handle(request.fid, &request.args),
            SbiExtension::Console => self.console.handle(request.fid, &request.args),
            SbiExtension::SystemReset => {
                reset::handle(request.fid, &request.args).map(|(response, reset)| {
                    self.resets.push(reset);
                    response
                })
            }
        });

        let response = routed.unwrap_or_else(|err| {
            log::warn!("{}", err);
            SbiResponse::not_supported()
        });
        if response.error == SbiStatus::NotSupported {
            self.stats.not_supported += 1;
        }
        response
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Reset requests recorded since the last call
    pub fn take_reset_requests(&mut self) -> Vec<ResetRequest> {
        std::mem::take(&mut self.resets)
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Whether a failed transfer's backoff window is still open
    pub fn is_backing_off(&self) -> bool {
        self.retry_after.map_or(false, |at| Instant::now() < at)
    }

    /// Transfer failures since the last fully serviced call
    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.failures()
    }

    fn transfer_failed(&mut self, err: TransferError) -> crate::error::GlyphError {
        self.stats.transfer_failures += 1;
        let err = self.backoff.record_failure(err);
        let delay = self.backoff.delay();
        self.retry_after = (!delay.is_zero()).then(|| Instant::now() + delay);
        log::warn!("mailbox transfer failed, call left pending: {}", err);
        err
    }
}
