//! Channel Tests.
//!
//! Handshake, request decoding, error recovery, and connection teardown, over a scripted
//! transport and over a real abstract Unix socket.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rvtrial_core::config::TrialConfig;
use rvtrial_core::ipc::wire::{Frame, ProtocolError, op};
use rvtrial_core::ipc::{
    Channel, ChannelError, ConnectionState, Instruction, Rejection, STATUS_FAILED, STATUS_OK,
};
use rvtrial_core::trial::{TrialResult, TrialStatus};

use crate::common::harness::trial;
use crate::common::mock_fuzzer::{self, ScriptedTransport, replies};

fn channel(frames: &[Frame]) -> (Channel<ScriptedTransport>, mock_fuzzer::Sink) {
    let (transport, sink) = ScriptedTransport::new(frames);
    (Channel::from_transport("test", transport, TrialConfig::default()), sink)
}

fn rejection(result: Result<Instruction, ChannelError>) -> Rejection {
    match result {
        Err(ChannelError::Rejected(r)) => r,
        other => panic!("expected a rejected request, got {other:?}"),
    }
}

fn rejected(result: Result<Instruction, ChannelError>) -> ProtocolError {
    rejection(result).error
}

// ══════════════════════════════════════════════════════════
// 1. Handshake
// ══════════════════════════════════════════════════════════

#[test]
fn handshake_reports_layout() {
    let (mut ch, sink) = channel(&[mock_fuzzer::init()]);
    ch.handshake(0x8_0000, 0x1000).unwrap();
    assert_eq!(
        replies(&sink),
        vec![Frame::serialized(op::ACK_INIT, &(0x8_0000u64, 0x1000u64)).unwrap()]
    );
    assert_eq!(ch.endpoint().state, ConnectionState::Connected);
    assert_eq!(ch.endpoint().to_string(), "@test");
}

#[test]
fn handshake_rejects_other_opening() {
    let (mut ch, sink) = channel(&[mock_fuzzer::quit()]);
    match ch.handshake(0, 0) {
        Err(ChannelError::Protocol(ProtocolError::Unexpected { expected, got })) => {
            assert_eq!((expected, got), ("INIT", "QUIT"));
        }
        other => panic!("expected Unexpected, got {other:?}"),
    }
    assert!(replies(&sink).is_empty());
}

// ══════════════════════════════════════════════════════════
// 2. Requests
// ══════════════════════════════════════════════════════════

#[test]
fn decodes_every_request() {
    let spec = trial(&[1, 2, 3], &[4]);
    let (mut ch, _) = channel(&[
        mock_fuzzer::load_code(&[0x13, 0, 0, 0]),
        mock_fuzzer::load_executable("/tmp/base"),
        mock_fuzzer::trial(&spec),
        mock_fuzzer::reset_log(),
        mock_fuzzer::quit(),
    ]);

    assert_eq!(ch.receive().unwrap(), Instruction::LoadCode(vec![0x13, 0, 0, 0]));
    assert_eq!(
        ch.receive().unwrap(),
        Instruction::LoadExecutable(PathBuf::from("/tmp/base"))
    );
    assert_eq!(ch.receive().unwrap(), Instruction::Trial(spec));
    assert_eq!(ch.receive().unwrap(), Instruction::ResetLog);
    assert_eq!(ch.receive().unwrap(), Instruction::EndOfCampaign);
}

#[test]
fn control_requests_carry_no_payload() {
    let (mut ch, _) = channel(&[Frame::new(op::QUIT, vec![0])]);
    assert!(matches!(
        rejected(ch.receive()),
        ProtocolError::TrailingBytes { what: "QUIT", extra: 1 }
    ));
}

#[test]
fn malformed_requests_are_rejected() {
    let mut forged = trial(&[1], &[]);
    forged.id = 0;
    let (mut ch, _) = channel(&[
        Frame::empty(0x1234),
        Frame::new(op::LOAD_TEST_CASE, vec![0; 4097]),
        Frame::new(op::LOAD_EXECUTABLE, vec![0xFF, 0xFE]),
        mock_fuzzer::trial(&forged),
        Frame::new(op::TRACE_TEST_CASE, vec![0; 4]),
    ]);

    assert_eq!(rejected(ch.receive()), ProtocolError::UnknownOp(0x1234));
    assert!(matches!(
        rejected(ch.receive()),
        ProtocolError::Oversize { what: "test case code", len: 4097, .. }
    ));
    assert_eq!(rejected(ch.receive()), ProtocolError::BadUtf8);
    assert!(matches!(rejected(ch.receive()), ProtocolError::HashMismatch { .. }));
    assert!(matches!(rejected(ch.receive()), ProtocolError::Truncated { .. }));
}

/// A rejected request leaves the channel open and in sync with the stream.
#[test]
fn rejection_keeps_channel_usable() {
    let (mut ch, _) = channel(&[
        Frame::new(op::LOAD_TEST_CASE, vec![0; 128 * 1024]),
        mock_fuzzer::quit(),
    ]);
    assert!(matches!(
        rejected(ch.receive()),
        ProtocolError::Oversize { what: "message payload", .. }
    ));
    assert!(ch.is_open());
    assert_eq!(ch.receive().unwrap(), Instruction::EndOfCampaign);
}

#[test]
fn refused_setup_requests_are_acknowledged_as_failed() {
    let (mut ch, sink) = channel(&[
        Frame::new(op::LOAD_TEST_CASE, vec![0; 4097]),
        Frame::new(op::LOAD_EXECUTABLE, vec![0xFF, 0xFE]),
    ]);
    for _ in 0..2 {
        let r = rejection(ch.receive());
        assert_eq!(r.id, None);
        assert!(ch.reply_rejected(&r).unwrap());
    }
    assert_eq!(
        replies(&sink),
        vec![
            Frame::serialized(op::ACK_LOAD_TEST_CASE, &STATUS_FAILED).unwrap(),
            Frame::serialized(op::ACK_LOAD_EXECUTABLE, &STATUS_FAILED).unwrap(),
        ]
    );
}

#[test]
fn refused_trial_is_answered_with_its_hash() {
    let mut forged = trial(&[7, 7], &[]);
    forged.id ^= 1;
    let (mut ch, sink) = channel(&[
        mock_fuzzer::trial(&forged),
        Frame::new(op::TRACE_TEST_CASE, vec![0; 4]),
    ]);

    let r = rejection(ch.receive());
    assert_eq!(r.id, Some(forged.id));
    assert!(ch.reply_rejected(&r).unwrap());
    let r = rejection(ch.receive());
    assert_eq!(r.id, None);
    assert!(ch.reply_rejected(&r).unwrap());

    let results: Vec<TrialResult> = replies(&sink)
        .iter()
        .map(|f| {
            assert_eq!(f.op, op::ACK_TRACE);
            rvtrial_core::ipc::wire::decode_result(&f.payload).unwrap()
        })
        .collect();
    assert_eq!(
        results,
        vec![TrialResult::rejected(forged.id), TrialResult::rejected(0)]
    );
    assert!(results.iter().all(|r| r.status == TrialStatus::Rejected));
}

/// An oversize trial is drained, yet its hash is still read from the head of the payload.
#[test]
fn oversize_trial_keeps_its_hash() {
    let mut payload = 0xfeed_u64.to_le_bytes().to_vec();
    payload.resize(128 * 1024, 0);
    let (mut ch, _) = channel(&[Frame::new(op::TRACE_TEST_CASE, payload)]);
    let r = rejection(ch.receive());
    assert_eq!(r.id, Some(0xfeed));
    assert!(matches!(r.error, ProtocolError::Oversize { .. }));
}

#[test]
fn unacknowledged_requests_get_no_reply() {
    let (mut ch, sink) = channel(&[Frame::empty(0x1234), Frame::new(op::QUIT, vec![0])]);
    for _ in 0..2 {
        let r = rejection(ch.receive());
        assert!(!ch.reply_rejected(&r).unwrap());
    }
    assert!(replies(&sink).is_empty());
}

// ══════════════════════════════════════════════════════════
// 3. Teardown
// ══════════════════════════════════════════════════════════

#[test]
fn end_of_stream_closes_for_good() {
    let (mut ch, sink) = channel(&[]);
    assert!(matches!(ch.receive(), Err(ChannelError::Closed)));
    assert_eq!(ch.endpoint().state, ConnectionState::Closed);
    assert!(matches!(ch.ack_load_test_case(STATUS_OK), Err(ChannelError::Closed)));
    assert!(replies(&sink).is_empty());
}

#[test]
fn close_drops_transport() {
    let (mut ch, _) = channel(&[mock_fuzzer::quit()]);
    ch.close();
    assert!(!ch.is_open());
    assert!(matches!(ch.receive(), Err(ChannelError::Closed)));
}

#[cfg(target_os = "linux")]
#[test]
fn connects_to_abstract_socket() {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixListener};

    use crate::common::mock_fuzzer::MockFuzzer;

    let name = format!("rvtrial-test-{}", std::process::id());
    let addr = SocketAddr::from_abstract_name(name.as_bytes()).unwrap();
    let listener = UnixListener::bind_addr(&addr).unwrap();
    let fuzzer = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut fuzzer = MockFuzzer::new(stream);
        let layout = fuzzer.handshake();
        fuzzer.send(&mock_fuzzer::quit());
        layout
    });

    let mut ch = Channel::connect(&name, TrialConfig::default()).unwrap();
    ch.handshake(0x8_0000, 0x1000).unwrap();
    assert_eq!(ch.receive().unwrap(), Instruction::EndOfCampaign);
    assert_eq!(fuzzer.join().unwrap(), (0x8_0000, 0x1000));
}
