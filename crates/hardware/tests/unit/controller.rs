//! Trial Controller Tests.
//!
//! Steps the controller by hand against a scripted fuzzer and checks every state transition,
//! the setup requests handled while idle, fault and load-failure containment, and that a
//! malformed reply to a result does not lose the result's cache state.

use pretty_assertions::assert_eq;
use rvtrial_core::inspect::{CacheAccessor, CacheLevel};
use rvtrial_core::ipc::wire::{self, Frame, op};
use rvtrial_core::ipc::{Channel, STATUS_FAILED, STATUS_OK};
use rvtrial_core::session::{SessionError, SimulationSession};
use rvtrial_core::trial::result::DETAIL_BUDGET_EXHAUSTED;
use rvtrial_core::trial::{ControllerState, Step, TrialController, TrialResult, TrialStatus};

use crate::common::builder::instruction::{InstructionBuilder, assemble, ebreak};
use crate::common::harness::{CODE_ADDR, Workspace, capture_logs, test_config, trial};
use crate::common::mock_fuzzer::{self, ScriptedTransport, Sink, replies};

type TestChannel = Channel<ScriptedTransport>;

fn channel(session: &SimulationSession, frames: &[Frame]) -> (TestChannel, Sink) {
    let (transport, sink) = ScriptedTransport::new(frames);
    let limits = session.config().trial.clone();
    (Channel::from_transport("test", transport, limits), sink)
}

/// `lui t0, 0x80; ld t1, 0(t0)`: loads the first sandbox word.
fn sandbox_load() -> Vec<u8> {
    assemble(&[
        InstructionBuilder::new().lui(5, 0x80).build(),
        InstructionBuilder::new().ld(6, 5, 0).build(),
    ])
}

/// Advances until the running trial has been reported.
fn run_to_report(
    session: &mut SimulationSession,
    controller: &mut TrialController,
    ch: &mut TestChannel,
) {
    for _ in 0..1000 {
        if controller.state() == ControllerState::Reported {
            return;
        }
        if controller.state() == ControllerState::Running {
            let _ = session.run_quantum();
        }
        assert_eq!(controller.advance(session, ch).unwrap(), Step::Continue);
    }
    panic!("trial never reported, stuck in {}", controller.state());
}

fn results(sink: &Sink) -> Vec<TrialResult> {
    replies(sink)
        .into_iter()
        .filter(|f| f.op == op::ACK_TRACE)
        .map(|f| wire::decode_result(&f.payload).unwrap())
        .collect()
}

fn all_caches_empty(session: &SimulationSession) -> bool {
    CacheAccessor::attached(session.cpu()).into_iter().all(|level| {
        CacheAccessor::valid_set(session.cpu(), level)
            .unwrap()
            .iter()
            .all(|v| !v)
    })
}

// ══════════════════════════════════════════════════════════
// 1. State Sequence
// ══════════════════════════════════════════════════════════

#[test]
fn trial_walks_every_state() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let spec = trial(&42u64.to_le_bytes(), &[]);
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&spec),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();
    assert_eq!(ctl.state(), ControllerState::Idle);

    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Continue);
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert_eq!(ctl.code().unwrap().bytes(), sandbox_load().as_slice());

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Running);
    assert_eq!(session.process().unwrap().pid, 1);

    // Running only completes once the core halts.
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Running);
    let _ = session.run_quantum();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Completed);
    assert_eq!(session.cpu().regs.read(6), 42);

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Reported);

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert!(all_caches_empty(&session));

    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Halt);
    assert_eq!(ctl.state(), ControllerState::Finished);
    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Halt);

    let frames = replies(&sink);
    assert_eq!(frames[0], Frame::serialized(op::ACK_LOAD_TEST_CASE, &STATUS_OK).unwrap());
    let result = &results(&sink)[0];
    assert_eq!(result.id, spec.id);
    assert_eq!(result.status, TrialStatus::Normal);
    assert_eq!(result.detail, 0);
    assert_eq!(result.instructions, 1024 + 3);
    assert!(result.cycles > result.instructions);
    assert!(result.holds_tag(CacheLevel::L1D, 0x10));
    let levels: Vec<_> = result.caches.iter().map(|c| c.level).collect();
    assert_eq!(levels, vec![CacheLevel::L1I, CacheLevel::L1D, CacheLevel::L2]);
    // Results are cleaned before the snapshot.
    assert!(result.caches.iter().flat_map(|c| &c.lines).all(|l| !l.metadata.dirty));
    assert_eq!(ctl.summary().trials, 1);
}

/// Two identical trials leave identical cache state: nothing leaks from one to the next.
#[test]
fn identical_trials_report_identical_state() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let spec = trial(&[7; 8], &[]);
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&spec),
            mock_fuzzer::trial(&spec),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let reported = results(&sink);
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0], reported[1]);
    assert_eq!(session.process().unwrap().pid, 2);
}

/// Trials with disjoint footprints: the second result shows none of the first one's lines.
#[test]
fn reported_state_belongs_to_one_trial() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    // `lui t0, 0x90; ld t1, 0(t0)`: loads from the registers region, L1D tag 0x12.
    let registers_load = assemble(&[
        InstructionBuilder::new().lui(5, 0x90).build(),
        InstructionBuilder::new().ld(6, 5, 0).build(),
    ]);
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&trial(&[1], &[])),
            mock_fuzzer::load_code(&registers_load),
            mock_fuzzer::trial(&trial(&[], &[2])),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);
    for _ in 0..3 {
        let _ = ctl.advance(&mut session, &mut ch).unwrap();
    }
    run_to_report(&mut session, &mut ctl, &mut ch);

    let reported = results(&sink);
    assert!(reported[0].holds_tag(CacheLevel::L1D, 0x10));
    assert!(!reported[0].holds_tag(CacheLevel::L1D, 0x12));
    assert!(reported[1].holds_tag(CacheLevel::L1D, 0x12));
    assert!(!reported[1].holds_tag(CacheLevel::L1D, 0x10));
}

// ══════════════════════════════════════════════════════════
// 2. Setup Requests
// ══════════════════════════════════════════════════════════

#[test]
fn load_executable_acknowledges_outcome() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let other = ws.write("other", &crate::common::harness::base_executable());
    let missing = ws.path("missing");
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_executable(missing.to_str().unwrap()),
            mock_fuzzer::load_executable(other.to_str().unwrap()),
        ],
    );
    let mut ctl = TrialController::new();
    let original = session.executable().to_path_buf();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(session.executable(), original);
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(session.executable(), other);

    assert_eq!(
        replies(&sink),
        vec![
            Frame::serialized(op::ACK_LOAD_EXECUTABLE, &STATUS_FAILED).unwrap(),
            Frame::serialized(op::ACK_LOAD_EXECUTABLE, &STATUS_OK).unwrap(),
        ]
    );
}

/// Re-sending the current executable after it was corrupted on disk fails without
/// disturbing the image the trials run from.
#[test]
fn corrupted_executable_keeps_running_image() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let base = session.executable().to_path_buf();
    let _ = session.symbols().unwrap();
    std::fs::write(&base, b"garbage").unwrap();
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_executable(base.to_str().unwrap()),
            mock_fuzzer::trial(&trial(&[], &[])),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(
        replies(&sink)[0],
        Frame::serialized(op::ACK_LOAD_EXECUTABLE, &STATUS_FAILED).unwrap()
    );
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Running);
    run_to_report(&mut session, &mut ctl, &mut ch);
    assert_eq!(results(&sink)[0].status, TrialStatus::Normal);
}

#[test]
fn reset_log_clears_summary() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::trial(&trial(&[], &[])),
            mock_fuzzer::reset_log(),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);
    assert_eq!(ctl.summary().trials, 1);

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.summary().trials, 0);
    assert_eq!(ctl.summary().cycles, 0);
    assert_eq!(ctl.state(), ControllerState::Idle);
    // RESET_LOG is not acknowledged.
    assert_eq!(replies(&sink).len(), 1);
}

// ══════════════════════════════════════════════════════════
// 3. Containment
// ══════════════════════════════════════════════════════════

/// An illegal access is reported as a fault and the next trial runs normally.
#[test]
fn fault_is_reported_and_contained() {
    // 0x100000 is the first address past the 1 MiB of test RAM.
    let unmapped_load = assemble(&[
        InstructionBuilder::new().lui(5, 0x100).build(),
        InstructionBuilder::new().ld(6, 5, 0).build(),
    ]);
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&unmapped_load),
            mock_fuzzer::trial(&trial(&[1], &[])),
            mock_fuzzer::load_code(&[]),
            mock_fuzzer::trial(&trial(&[2], &[])),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let reported = results(&sink);
    assert_eq!((reported[0].status, reported[0].detail), (TrialStatus::Fault, 5));
    assert_eq!(reported[0].instructions, 1);
    assert!(reported[0].cache(CacheLevel::L1D).unwrap().valid_lines().next().is_none());
    assert_eq!((reported[1].status, reported[1].detail), (TrialStatus::Normal, 0));
    assert_eq!(ctl.summary().faults, 1);
    assert_eq!(ctl.summary().trials, 2);
}

#[test]
fn breakpoint_detail_is_trap_cause() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&assemble(&[ebreak()])),
            mock_fuzzer::trial(&trial(&[], &[])),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let result = &results(&sink)[0];
    assert_eq!((result.status, result.detail), (TrialStatus::Fault, 3));
    assert_eq!(result.instructions, 0);
}

#[test]
fn budget_exhaustion_is_a_fault() {
    let ws = Workspace::new();
    let mut config = test_config();
    config.general.instruction_budget = 100;
    let mut session = ws.session(config);
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&assemble(&[InstructionBuilder::new().jal(0, 0).build()])),
            mock_fuzzer::trial(&trial(&[], &[])),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let result = &results(&sink)[0];
    assert_eq!(result.status, TrialStatus::Fault);
    assert_eq!(result.detail, DETAIL_BUDGET_EXHAUSTED);
    assert_eq!(result.instructions, 100);
}

#[test]
fn unloadable_executable_reports_load_failure() {
    let ws = Workspace::new();
    let mut session = SimulationSession::new(test_config(), ws.path("missing"));
    let spec = trial(&[9], &[]);
    let (mut ch, sink) = channel(&session, &[mock_fuzzer::trial(&spec), mock_fuzzer::quit()]);
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Completed);
    let _ = ctl.advance(&mut session, &mut ch).unwrap();

    assert_eq!(results(&sink), vec![TrialResult::load_failure(spec.id)]);
    assert_eq!(ctl.summary().load_failures, 1);
    assert!(session.process().is_none());
}

/// A malformed reply to a result keeps the controller in `Reported` with the caches intact.
#[test]
fn malformed_reply_keeps_reported_state() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let (mut ch, _) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&trial(&[], &[])),
            Frame::empty(0xBAD),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let err = ctl.advance(&mut session, &mut ch).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)), "{err}");
    assert!(!err.is_fatal());
    assert_eq!(ctl.state(), ControllerState::Reported);
    assert!(!all_caches_empty(&session));

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert!(all_caches_empty(&session));
    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Halt);
}

/// A refused request is answered before the error surfaces, so the fuzzer never waits on it.
#[test]
fn refused_requests_are_answered() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let mut forged = trial(&[1], &[]);
    forged.id ^= 1;
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&[0; 4097]),
            mock_fuzzer::trial(&forged),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    for _ in 0..2 {
        let err = ctl.advance(&mut session, &mut ch).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)), "{err}");
        assert!(!err.is_fatal());
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    let frames = replies(&sink);
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frames[0],
        Frame::serialized(op::ACK_LOAD_TEST_CASE, &STATUS_FAILED).unwrap()
    );
    assert_eq!(results(&sink), vec![TrialResult::rejected(forged.id)]);
    assert!(ctl.code().is_none());
    assert_eq!(ctl.summary().trials, 0);
    assert!(session.process().is_none());
    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Halt);
}

/// A refused trial sent as the reply to a result is answered; the pending result's caches stay.
#[test]
fn refused_reply_is_answered_in_reported_state() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let mut forged = trial(&[3], &[]);
    forged.id = 0;
    let (mut ch, sink) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&trial(&[], &[])),
            mock_fuzzer::trial(&forged),
            mock_fuzzer::quit(),
        ],
    );
    let mut ctl = TrialController::new();

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    run_to_report(&mut session, &mut ctl, &mut ch);

    let err = ctl.advance(&mut session, &mut ch).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(ctl.state(), ControllerState::Reported);
    assert!(!all_caches_empty(&session));

    let reported = results(&sink);
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].status, TrialStatus::Normal);
    assert_eq!(reported[1], TrialResult::rejected(0));
    assert_eq!(ctl.summary().trials, 1);

    let _ = ctl.advance(&mut session, &mut ch).unwrap();
    assert_eq!(ctl.state(), ControllerState::Idle);
    assert_eq!(ctl.advance(&mut session, &mut ch).unwrap(), Step::Halt);
}

#[test]
fn lost_fuzzer_is_fatal() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let (mut ch, _) = channel(&session, &[]);
    let mut ctl = TrialController::new();

    let err = ctl.advance(&mut session, &mut ch).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(ctl.state(), ControllerState::Idle);
}

// ══════════════════════════════════════════════════════════
// 4. Diagnostics
// ══════════════════════════════════════════════════════════

/// Loaded code is listed at its load address and each result lists its valid lines.
#[test]
fn debug_dumps_list_code_and_valid_lines() {
    let ws = Workspace::new();
    let mut session = ws.session(test_config());
    let spec = trial(&[5; 8], &[]);
    let (mut ch, _) = channel(
        &session,
        &[
            mock_fuzzer::load_code(&sandbox_load()),
            mock_fuzzer::trial(&spec),
        ],
    );
    let mut ctl = TrialController::new();

    let ((), log) = capture_logs(|| {
        let _ = ctl.advance(&mut session, &mut ch).unwrap();
        let _ = ctl.advance(&mut session, &mut ch).unwrap();
        run_to_report(&mut session, &mut ctl, &mut ch);
    });

    let code_line: Vec<String> = sandbox_load().iter().map(|b| format!("{b:02x}")).collect();
    assert!(log.contains("rvtrial::exec: --- code ---"), "{log}");
    assert!(
        log.contains(&format!("{CODE_ADDR:x}: {}", code_line.join(" "))),
        "{log}"
    );
    assert!(
        log.contains(&format!("rvtrial::results: ---- input #0: {:016x} ----", spec.id)),
        "{log}"
    );
    assert!(log.contains("L1D valid cache blocks:"), "{log}");
    assert!(log.contains("tag 0x10 valid age"), "{log}");
}
