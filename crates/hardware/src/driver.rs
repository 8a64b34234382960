//! Simulation Driver.
//!
//! The top-level loop of a campaign. It alternates between moving simulated time forward
//! (one quantum at a time, only while a trial is running) and asking the trial controller to
//! take its next step, until the controller reports the end of the campaign.

use std::io::{Read, Write};

use crate::ipc::Channel;
use crate::session::{SessionError, SimulationSession};
use crate::sim::RunOutcome;
use crate::stats::SimStats;
use crate::trial::{ControllerState, Step, TrialController};

/// Campaign-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CampaignSummary {
    /// Trials whose result was reported.
    pub trials: u64,
    /// Trials that ended in a trap or ran out of budget.
    pub faults: u64,
    /// Trials whose workload could not be bound.
    pub load_failures: u64,
    /// Simulated cycles summed over all trials.
    pub cycles: u64,
    /// Retired instructions summed over all trials.
    pub instructions: u64,
    /// Per-trial statistics merged over all trials.
    pub stats: SimStats,
}

impl CampaignSummary {
    /// Logs the summary at `info` level.
    pub fn log(&self) {
        tracing::info!(
            trials = self.trials,
            faults = self.faults,
            load_failures = self.load_failures,
            cycles = self.cycles,
            instructions = self.instructions,
            "campaign summary"
        );
        self.stats.log();
    }
}

/// Runs a campaign to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationDriver {
    rejected: u64,
}

impl SimulationDriver {
    /// Creates a driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fuzzer messages rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Drives `controller` until the campaign ends.
    ///
    /// # Arguments
    ///
    /// * `session` - The simulator instance.
    /// * `controller` - The trial state machine.
    /// * `channel` - Connection to the fuzzer.
    ///
    /// # Returns
    ///
    /// The campaign summary once the controller halts, or the first fatal error. Rejected
    /// messages are logged and do not stop the campaign.
    pub fn run<T: Read + Write>(
        &mut self,
        session: &mut SimulationSession,
        controller: &mut TrialController,
        channel: &mut Channel<T>,
    ) -> Result<CampaignSummary, SessionError> {
        loop {
            if controller.state() == ControllerState::Running {
                if let RunOutcome::Halted(reason) = session.run_quantum() {
                    tracing::debug!(%reason, "workload stopped");
                }
            }

            match controller.advance(session, channel) {
                Ok(Step::Continue) => {}
                Ok(Step::Halt) => break,
                Err(SessionError::Protocol(e)) => {
                    self.rejected += 1;
                    tracing::warn!(state = %controller.state(), error = %e, "message rejected");
                }
                Err(e) => {
                    tracing::error!(state = %controller.state(), error = %e, "campaign aborted");
                    return Err(e);
                }
            }
        }
        Ok(controller.summary().clone())
    }
}
