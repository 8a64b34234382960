//! Trial results.

use std::fmt;

use crate::core::HaltReason;
use crate::inspect::{CacheLevel, LineDescriptor};

/// `detail` reported when a workload ran out of instruction budget.
pub const DETAIL_BUDGET_EXHAUSTED: u64 = u64::MAX;

/// How a trial ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrialStatus {
    /// The workload reached the end-of-trial marker.
    Normal,
    /// The workload trapped or exhausted its instruction budget.
    Fault,
    /// The workload could not be bound; nothing was executed.
    LoadFailure,
    /// The request was refused before a workload was bound.
    Rejected,
}

impl TrialStatus {
    /// Wire code of the status.
    pub fn code(self) -> u64 {
        match self {
            Self::Normal => 0,
            Self::Fault => 1,
            Self::LoadFailure => 2,
            Self::Rejected => 3,
        }
    }

    /// Resolves a wire code.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Fault),
            2 => Some(Self::LoadFailure),
            3 => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Status and detail word for a halted workload.
    ///
    /// The detail is the exit code for a normal halt, the trap cause for a trap, and
    /// `DETAIL_BUDGET_EXHAUSTED` when the budget ran out.
    pub fn from_halt(reason: &HaltReason) -> (Self, u64) {
        match reason {
            HaltReason::Exit(code) => (Self::Normal, *code),
            HaltReason::Trap(trap) => (Self::Fault, trap.cause()),
            HaltReason::BudgetExhausted => (Self::Fault, DETAIL_BUDGET_EXHAUSTED),
        }
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Fault => "fault",
            Self::LoadFailure => "load failure",
            Self::Rejected => "rejected",
        })
    }
}

/// Final state of one cache level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Level the lines were read from.
    pub level: CacheLevel,
    /// Every line, ordered by set then way.
    pub lines: Vec<LineDescriptor>,
}

impl CacheSnapshot {
    /// Valid lines only.
    pub fn valid_lines(&self) -> impl Iterator<Item = &LineDescriptor> {
        self.lines.iter().filter(|line| line.valid)
    }
}

/// Outcome of one trial as reported to the fuzzer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialResult {
    /// Identifier of the trial this result belongs to.
    pub id: u64,
    /// Completion status.
    pub status: TrialStatus,
    /// Exit code, trap cause, or 0.
    pub detail: u64,
    /// Simulated cycles consumed by the workload.
    pub cycles: u64,
    /// Instructions retired by the workload.
    pub instructions: u64,
    /// Snapshot of every attached cache, in level order.
    pub caches: Vec<CacheSnapshot>,
}

impl TrialResult {
    /// Result of a trial whose workload never ran.
    pub fn load_failure(id: u64) -> Self {
        Self {
            id,
            status: TrialStatus::LoadFailure,
            detail: 0,
            cycles: 0,
            instructions: 0,
            caches: Vec::new(),
        }
    }

    /// Reply to a trial request that was refused; the fuzzer may send it again.
    pub fn rejected(id: u64) -> Self {
        Self {
            status: TrialStatus::Rejected,
            ..Self::load_failure(id)
        }
    }

    /// Snapshot of `level`, if that cache was attached.
    pub fn cache(&self, level: CacheLevel) -> Option<&CacheSnapshot> {
        self.caches.iter().find(|snapshot| snapshot.level == level)
    }

    /// Returns `true` if `level` holds a valid line with `tag`.
    pub fn holds_tag(&self, level: CacheLevel, tag: u64) -> bool {
        self.cache(level)
            .is_some_and(|snapshot| snapshot.valid_lines().any(|line| line.tag == tag))
    }
}
