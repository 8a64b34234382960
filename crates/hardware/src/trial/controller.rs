//! Trial Controller.
//!
//! This module steps the session through one trial at a time. Each call to `advance` performs
//! at most one state transition:
//! 1. **Idle:** Takes the next instruction (stashed by the previous report, or received).
//!    Setup instructions are applied and acknowledged in place; a trial binds a fresh process
//!    and moves to `Running`; end of campaign moves to `Finished`.
//! 2. **Running:** No-op until the core halts, then `Completed`.
//! 3. **Completed:** Cleans and snapshots every attached cache, reports the result, `Reported`.
//! 4. **Reported:** Blocks for the fuzzer's reply. A well-formed reply resets every cache and
//!    returns to `Idle`; a malformed one is rejected and the state is kept.
//! 5. **Finished:** Terminal; every call returns `Step::Halt`.
//!
//! A faulting workload is not an error: it completes with `TrialStatus::Fault`. A refused
//! request is answered on the wire before the error is returned, so the fuzzer can retry it.
//! Only channel failures and missing caches abort the campaign.
//!
//! Two debug targets mirror the diagnostics a fuzzer operator reads: `rvtrial::exec` lists
//! each loaded test case, `rvtrial::results` lists the valid lines of every reported cache.

use std::fmt;
use std::io::{Read, Write};

use crate::core::HaltReason;
use crate::driver::CampaignSummary;
use crate::inspect::{CacheAccessor, CacheInspectable};
use crate::ipc::{Channel, ChannelError, Instruction, STATUS_FAILED, STATUS_OK};
use crate::session::{SessionError, SimulationSession};
use crate::trial::{CacheSnapshot, CodeImage, TrialResult, TrialSpec, TrialStatus};

/// Controller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the next instruction.
    #[default]
    Idle,
    /// A trial workload is executing.
    Running,
    /// The workload stopped; its result has not been sent.
    Completed,
    /// The result was sent; waiting for the fuzzer's reply.
    Reported,
    /// The campaign is over.
    Finished,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Reported => "reported",
            Self::Finished => "finished",
        })
    }
}

/// What the driver should do after `advance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Keep going.
    Continue,
    /// Stop: the campaign is over.
    Halt,
}

/// The trial in flight.
#[derive(Debug)]
struct ActiveTrial {
    spec: TrialSpec,
    index: u64,
}

/// How the workload of a completed trial ended.
#[derive(Debug)]
enum Ending {
    Halted(HaltReason),
    LoadFailed,
}

/// Controller state together with the trial it concerns.
#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Running(ActiveTrial),
    Completed(ActiveTrial, Ending),
    Reported(ActiveTrial),
    Finished,
}

/// Drives one trial at a time through the session.
#[derive(Debug, Default)]
pub struct TrialController {
    phase: Phase,
    pending: Option<Instruction>,
    code: Option<CodeImage>,
    trial_index: u64,
    summary: CampaignSummary,
}

impl TrialController {
    /// Creates an idle controller with no test-case code loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        match self.phase {
            Phase::Idle => ControllerState::Idle,
            Phase::Running(_) => ControllerState::Running,
            Phase::Completed(..) => ControllerState::Completed,
            Phase::Reported(_) => ControllerState::Reported,
            Phase::Finished => ControllerState::Finished,
        }
    }

    /// Counters accumulated since start or the last log reset.
    pub fn summary(&self) -> &CampaignSummary {
        &self.summary
    }

    /// Test-case code patched into each trial, if any was loaded.
    pub fn code(&self) -> Option<&CodeImage> {
        self.code.as_ref()
    }

    /// Performs at most one state transition.
    ///
    /// # Arguments
    ///
    /// * `session` - The simulator instance the trials run in.
    /// * `channel` - Connection to the fuzzer. Used only in `Idle` and `Reported`.
    ///
    /// # Returns
    ///
    /// `Step::Halt` once the campaign is finished, `Step::Continue` otherwise. A
    /// `SessionError::Protocol` leaves the state unchanged and may be retried; the refused
    /// request has already been answered.
    pub fn advance<T: Read + Write>(
        &mut self,
        session: &mut SimulationSession,
        channel: &mut Channel<T>,
    ) -> Result<Step, SessionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Idle => self.dispatch(session, channel),
            Phase::Running(trial) => {
                self.phase = match session.cpu().halt_reason() {
                    Some(reason) => Phase::Completed(trial, Ending::Halted(reason.clone())),
                    None => Phase::Running(trial),
                };
                Ok(Step::Continue)
            }
            Phase::Completed(trial, ending) => {
                let sent = self.report(session, channel, &trial, &ending);
                self.phase = match sent {
                    Ok(()) => Phase::Reported(trial),
                    Err(_) => Phase::Completed(trial, ending),
                };
                sent.map(|()| Step::Continue)
            }
            Phase::Reported(trial) => {
                let reply = match receive(channel) {
                    Ok(reply) => reply,
                    Err(e) => {
                        self.phase = Phase::Reported(trial);
                        return Err(e);
                    }
                };
                tracing::debug!(trial = trial.index, "result acknowledged");
                CacheAccessor::reset_all(session.cpu_mut())?;
                self.pending = Some(reply);
                Ok(Step::Continue)
            }
            Phase::Finished => {
                self.phase = Phase::Finished;
                Ok(Step::Halt)
            }
        }
    }

    fn dispatch<T: Read + Write>(
        &mut self,
        session: &mut SimulationSession,
        channel: &mut Channel<T>,
    ) -> Result<Step, SessionError> {
        let instruction = match self.pending.take() {
            Some(instruction) => instruction,
            None => receive(channel)?,
        };

        match instruction {
            Instruction::EndOfCampaign => {
                tracing::info!(trials = self.summary.trials, "end of campaign");
                self.phase = Phase::Finished;
                return Ok(Step::Halt);
            }
            Instruction::LoadCode(bytes) => {
                let code = match CodeImage::new(bytes, session.config().trial.max_code_size) {
                    Ok(code) => code,
                    Err(e) => {
                        channel.ack_load_test_case(STATUS_FAILED)?;
                        return Err(e.into());
                    }
                };
                tracing::debug!(len = code.bytes().len(), "test case code loaded");
                if tracing::enabled!(target: "rvtrial::exec", tracing::Level::DEBUG) {
                    if let Ok(symbols) = session.symbols() {
                        tracing::debug!(target: "rvtrial::exec", "--- code ---");
                        for line in code.hex_dump(symbols.code.addr) {
                            tracing::debug!(target: "rvtrial::exec", "{line}");
                        }
                    }
                }
                self.code = Some(code);
                channel.ack_load_test_case(STATUS_OK)?;
            }
            Instruction::LoadExecutable(path) => {
                let status = match session.set_executable(&path) {
                    Ok(()) => STATUS_OK,
                    Err(e) => {
                        tracing::warn!(error = %e, "base executable not changed");
                        STATUS_FAILED
                    }
                };
                channel.ack_load_executable(status)?;
            }
            Instruction::ResetLog => {
                tracing::debug!("log reset");
                self.trial_index = 0;
                self.summary = CampaignSummary::default();
            }
            Instruction::Trial(spec) => self.start(session, spec),
        }
        Ok(Step::Continue)
    }

    fn start(&mut self, session: &mut SimulationSession, spec: TrialSpec) {
        let index = self.trial_index;
        self.trial_index += 1;

        let prepared = session.prepare_trial(self.code.as_ref(), &spec);
        let trial = ActiveTrial { spec, index };
        self.phase = match prepared {
            Ok(handle) => {
                tracing::info!(
                    trial = index,
                    id = %format!("{:#018x}", trial.spec.id),
                    %handle,
                    "trial started"
                );
                Phase::Running(trial)
            }
            Err(e) => {
                tracing::warn!(trial = index, error = %e, "trial could not be loaded");
                Phase::Completed(trial, Ending::LoadFailed)
            }
        };
    }

    fn report<T: Read + Write>(
        &mut self,
        session: &mut SimulationSession,
        channel: &mut Channel<T>,
        trial: &ActiveTrial,
        ending: &Ending,
    ) -> Result<(), SessionError> {
        let result = match ending {
            Ending::Halted(reason) => collect(session, trial, reason)?,
            Ending::LoadFailed => TrialResult::load_failure(trial.spec.id),
        };
        channel.send_result(&result)?;
        tracing::debug!(id = %format!("{:#018x}", result.id), "result reported");

        self.summary.trials += 1;
        match result.status {
            TrialStatus::Fault => self.summary.faults += 1,
            TrialStatus::LoadFailure => self.summary.load_failures += 1,
            TrialStatus::Normal | TrialStatus::Rejected => {}
        }
        self.summary.cycles += result.cycles;
        self.summary.instructions += result.instructions;
        if let Ending::Halted(_) = ending {
            self.summary.stats.merge(&session.cpu().stats);
        }
        Ok(())
    }
}

/// Receives the next request, answering it on the wire if it is refused.
fn receive<T: Read + Write>(channel: &mut Channel<T>) -> Result<Instruction, SessionError> {
    match channel.receive() {
        Ok(instruction) => Ok(instruction),
        Err(ChannelError::Rejected(rejection)) => {
            let _ = channel.reply_rejected(&rejection)?;
            Err(SessionError::Protocol(rejection.error))
        }
        Err(e) => Err(e.into()),
    }
}

/// Cleans and snapshots every attached cache of a halted workload.
fn collect(
    session: &mut SimulationSession,
    trial: &ActiveTrial,
    reason: &HaltReason,
) -> Result<TrialResult, SessionError> {
    let (status, detail) = TrialStatus::from_halt(reason);
    let cpu = session.cpu_mut();

    let mut caches = Vec::new();
    for level in CacheAccessor::attached(cpu) {
        let cache = CacheAccessor::cache_mut(cpu, level);
        let _ = cache.writeback()?;
        caches.push(CacheSnapshot {
            level,
            lines: cache.read_state()?,
        });
    }

    tracing::info!(
        trial = trial.index,
        %status,
        detail,
        cycles = cpu.stats.cycles,
        instructions = cpu.stats.instructions_retired,
        "trial completed"
    );
    if tracing::enabled!(target: "rvtrial::results", tracing::Level::DEBUG) {
        tracing::debug!(
            target: "rvtrial::results",
            "---- input #{}: {:016x} ----",
            trial.index,
            trial.spec.id
        );
        for snapshot in &caches {
            tracing::debug!(target: "rvtrial::results", "{} valid cache blocks:", snapshot.level);
            for (i, line) in snapshot.lines.iter().enumerate().filter(|(_, l)| l.valid) {
                tracing::debug!(target: "rvtrial::results", "  {i}. {line}");
            }
        }
    }
    if status == TrialStatus::Fault && cpu.trace {
        cpu.dump_state();
    }

    Ok(TrialResult {
        id: trial.spec.id,
        status,
        detail,
        cycles: cpu.stats.cycles,
        instructions: cpu.stats.instructions_retired,
        caches,
    })
}
