//! Trials: the unit of work submitted by the fuzzer.
//!
//! This module groups the trial data model and the state machine that runs it:
//! 1. **Inputs:** `TrialSpec` (input bytes keyed by their hash) and `CodeImage` (test-case code
//!    patched into every bound process).
//! 2. **Results:** `TrialResult`, the completion status plus a snapshot of every attached cache.
//! 3. **Control:** `TrialController`, which steps one trial at a time through
//!    `Idle → Running → Completed → Reported → Idle`.

/// Per-trial state machine.
pub mod controller;

/// Completion status and cache snapshots.
pub mod result;

/// Trial inputs and the test-case code image.
pub mod spec;

pub use self::controller::{ControllerState, Step, TrialController};
pub use self::result::{CacheSnapshot, TrialResult, TrialStatus};
pub use self::spec::{CodeImage, TrialSpec, input_hash};
