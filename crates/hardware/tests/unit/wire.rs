//! Wire Format Tests.
//!
//! Framing (including draining of oversize frames), the result and trial payload codecs, and
//! the trial input checks applied after decoding.

use std::io::Cursor;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rvtrial_core::config::TrialConfig;
use rvtrial_core::inspect::{CacheLevel, LineDescriptor, LineMetadata};
use rvtrial_core::ipc::ChannelError;
use rvtrial_core::ipc::wire::{
    self, CACHE_HEADER_LEN, Frame, LINE_RECORD_LEN, ProtocolError, RESULT_HEADER_LEN, op,
};
use rvtrial_core::trial::{CacheSnapshot, CodeImage, TrialResult, TrialSpec, TrialStatus};

use crate::common::harness::trial;

fn sample_result() -> TrialResult {
    TrialResult {
        id: 0xdead_beef,
        status: TrialStatus::Fault,
        detail: 5,
        cycles: 1234,
        instructions: 99,
        caches: vec![CacheSnapshot {
            level: CacheLevel::L1D,
            lines: vec![
                LineDescriptor {
                    set: 0,
                    way: 1,
                    tag: 0x10,
                    valid: true,
                    metadata: LineMetadata { dirty: true, age: 1 },
                },
                LineDescriptor::default(),
            ],
        }],
    }
}

// ══════════════════════════════════════════════════════════
// 1. Framing
// ══════════════════════════════════════════════════════════

#[test]
fn frame_layout_is_op_len_payload() {
    let bytes = Frame::serialized(op::ACK_INIT, &(0x8000u64, 0x1000u64))
        .unwrap()
        .encode();
    assert_eq!(bytes.len(), 16 + 16);
    assert_eq!(&bytes[..8], &op::ACK_INIT.to_le_bytes());
    assert_eq!(&bytes[8..16], &16u64.to_le_bytes());
    assert_eq!(&bytes[16..24], &0x8000u64.to_le_bytes());
}

#[test]
fn frames_are_read_back_to_back() {
    let mut bytes = Frame::empty(op::INIT).encode();
    bytes.extend(Frame::new(op::LOAD_TEST_CASE, vec![1, 2, 3]).encode());
    let mut cursor = Cursor::new(bytes);

    assert_eq!(Frame::read_from(&mut cursor, 64).unwrap(), Frame::empty(op::INIT));
    assert_eq!(
        Frame::read_from(&mut cursor, 64).unwrap().payload,
        vec![1, 2, 3]
    );
    assert!(matches!(Frame::read_from(&mut cursor, 64), Err(ChannelError::Closed)));
}

#[test]
fn truncated_frame_reads_as_closed() {
    let bytes = Frame::new(op::LOAD_TEST_CASE, vec![0; 32]).encode();
    let mut cursor = Cursor::new(bytes[..30].to_vec());
    assert!(matches!(Frame::read_from(&mut cursor, 64), Err(ChannelError::Closed)));
}

/// An oversize frame is consumed in full, so the next frame is read intact.
#[test]
fn oversize_frame_is_drained() {
    let mut bytes = Frame::new(op::LOAD_TEST_CASE, vec![0xAB; 100]).encode();
    bytes.extend(Frame::empty(op::QUIT).encode());
    let mut cursor = Cursor::new(bytes);

    match Frame::read_from(&mut cursor, 64) {
        Err(ChannelError::Rejected(r)) => {
            assert_eq!(r.op, op::LOAD_TEST_CASE);
            assert!(matches!(
                r.error,
                ProtocolError::Oversize { len: 100, max: 64, .. }
            ));
        }
        other => panic!("expected Oversize, got {other:?}"),
    }
    assert_eq!(Frame::read_from(&mut cursor, 64).unwrap(), Frame::empty(op::QUIT));
}

#[test]
fn serialized_payloads_are_fixed_width() {
    let ack = Frame::serialized(op::ACK_LOAD_TEST_CASE, &1u64).unwrap();
    assert_eq!(ack.payload, 1u64.to_le_bytes());

    let mut pair = 1u64.to_le_bytes().to_vec();
    pair.extend_from_slice(&2u64.to_le_bytes());
    assert_eq!(wire::decode::<(u64, u64)>(&pair, "pair"), Ok((1, 2)));
    assert!(matches!(
        wire::decode::<u64>(&[0; 9], "word"),
        Err(ProtocolError::TrailingBytes { what: "word", extra: 1 })
    ));
    assert!(matches!(
        wire::decode::<u64>(&[0; 7], "word"),
        Err(ProtocolError::Truncated { what: "word", .. })
    ));
}

#[test]
fn trial_hash_is_peeked_from_payload_head() {
    let spec = trial(&[9], &[]);
    let payload = wire::encode_trial(&spec).unwrap();
    assert_eq!(wire::peek_trial_id(&payload), Some(spec.id));
    assert_eq!(wire::peek_trial_id(&payload[..8]), Some(spec.id));
    assert_eq!(wire::peek_trial_id(&payload[..7]), None);
}

#[test]
fn opcode_names() {
    assert_eq!(op::name(op::TRACE_TEST_CASE), "TRACE_TEST_CASE");
    assert_eq!(op::name(0), "UNKNOWN");
}

// ══════════════════════════════════════════════════════════
// 2. Result Payload
// ══════════════════════════════════════════════════════════

#[test]
fn result_encoding_layout() {
    let bytes = wire::encode_result(&sample_result()).unwrap();
    assert_eq!(
        bytes.len(),
        RESULT_HEADER_LEN + CACHE_HEADER_LEN + 2 * LINE_RECORD_LEN
    );
    let line = &bytes[RESULT_HEADER_LEN + CACHE_HEADER_LEN..][..LINE_RECORD_LEN];
    assert_eq!(&line[0..4], &0u32.to_le_bytes());
    assert_eq!(&line[4..8], &1u32.to_le_bytes());
    assert_eq!(&line[8..16], &0x10u64.to_le_bytes());
    assert_eq!(&line[16..20], &0b11u32.to_le_bytes(), "valid | dirty");
    assert_eq!(&line[20..24], &1u32.to_le_bytes());
}

#[test]
fn result_decode_rejects_bad_fields() {
    let good = wire::encode_result(&sample_result()).unwrap();

    let mut bad_status = good.clone();
    bad_status[8..16].copy_from_slice(&7u64.to_le_bytes());
    assert_eq!(wire::decode_result(&bad_status), Err(ProtocolError::UnknownStatus(7)));

    let mut bad_level = good.clone();
    bad_level[RESULT_HEADER_LEN..RESULT_HEADER_LEN + 8].copy_from_slice(&9u64.to_le_bytes());
    assert_eq!(wire::decode_result(&bad_level), Err(ProtocolError::UnknownLevel(9)));

    assert!(matches!(
        wire::decode_result(&good[..good.len() - 1]),
        Err(ProtocolError::Truncated { .. })
    ));

    let mut trailing = good;
    trailing.push(0);
    assert!(matches!(
        wire::decode_result(&trailing),
        Err(ProtocolError::TrailingBytes { extra: 1, .. })
    ));
}

/// A huge declared line count must not allocate before the payload runs out.
#[test]
fn result_decode_bounds_declared_counts() {
    let mut bytes = wire::encode_result(&TrialResult::load_failure(1)).unwrap();
    bytes[40..48].copy_from_slice(&u64::MAX.to_le_bytes());
    assert!(matches!(
        wire::decode_result(&bytes),
        Err(ProtocolError::Truncated { .. })
    ));
}

fn arb_line() -> impl Strategy<Value = LineDescriptor> {
    (any::<u32>(), any::<u32>(), any::<u64>(), any::<bool>(), any::<bool>(), any::<u32>()).prop_map(
        |(set, way, tag, valid, dirty, age)| LineDescriptor {
            set,
            way,
            tag,
            valid,
            metadata: LineMetadata { dirty, age },
        },
    )
}

fn arb_result() -> impl Strategy<Value = TrialResult> {
    let status = prop_oneof![
        Just(TrialStatus::Normal),
        Just(TrialStatus::Fault),
        Just(TrialStatus::LoadFailure),
        Just(TrialStatus::Rejected)
    ];
    let level = prop_oneof![Just(CacheLevel::L1I), Just(CacheLevel::L1D), Just(CacheLevel::L2)];
    let cache = (level, prop::collection::vec(arb_line(), 0..8))
        .prop_map(|(level, lines)| CacheSnapshot { level, lines });
    (
        any::<u64>(),
        status,
        any::<u64>(),
        any::<u64>(),
        any::<u64>(),
        prop::collection::vec(cache, 0..4),
    )
        .prop_map(|(id, status, detail, cycles, instructions, caches)| TrialResult {
            id,
            status,
            detail,
            cycles,
            instructions,
            caches,
        })
}

proptest! {
    #[test]
    fn result_codec_is_lossless(result in arb_result()) {
        let decoded = wire::decode_result(&wire::encode_result(&result).unwrap()).unwrap();
        prop_assert_eq!(decoded, result);
    }
}

// ══════════════════════════════════════════════════════════
// 3. Trial Payload
// ══════════════════════════════════════════════════════════

#[test]
fn trial_payload_splits_input() {
    let spec = trial(&[1, 2, 3], &[4, 5]);
    let decoded = wire::decode_trial(&wire::encode_trial(&spec).unwrap()).unwrap();
    assert_eq!(decoded.sandbox_bytes(), &[1, 2, 3]);
    assert_eq!(decoded.register_bytes(), &[4, 5]);
    assert_eq!(decoded, spec);
}

#[test]
fn trial_split_past_input_is_rejected() {
    let mut payload = wire::encode_trial(&trial(&[1, 2], &[])).unwrap();
    payload[8..16].copy_from_slice(&3u64.to_le_bytes());
    assert_eq!(
        wire::decode_trial(&payload),
        Err(ProtocolError::SplitOutOfRange {
            registers_start: 3,
            len: 2
        })
    );
}

#[test]
fn trial_validation() {
    let limits = TrialConfig {
        max_sandbox_size: 4,
        max_registers_size: 2,
        ..TrialConfig::default()
    };
    assert_eq!(trial(&[1, 2, 3, 4], &[5, 6]).validate(&limits), Ok(()));

    let mut forged = trial(&[1], &[2]);
    forged.id ^= 1;
    assert!(matches!(
        forged.validate(&limits),
        Err(ProtocolError::HashMismatch { .. })
    ));

    assert!(matches!(
        trial(&[0; 5], &[]).validate(&limits),
        Err(ProtocolError::Oversize { what: "sandbox input", .. })
    ));
    assert!(matches!(
        trial(&[], &[0; 3]).validate(&limits),
        Err(ProtocolError::Oversize { what: "register input", .. })
    ));
}

#[test]
fn input_hash_matches_known_values() {
    let spec = TrialSpec::new(0, vec![0]);
    assert_eq!(spec.id, 0xbb7524eafb93804bu64.wrapping_mul(0x21f782547ea34f3d));
}

#[test]
fn code_image_pads_with_nops() {
    let code = CodeImage::new(vec![0x6f, 0x00, 0x00, 0x00, 0xAA, 0xBB], 16).unwrap();
    let padded = code.padded(12).unwrap();
    assert_eq!(padded.len(), 12);
    assert_eq!(&padded[..6], code.bytes());
    // Padding continues the nop pattern at the 4-byte phase it starts in.
    assert_eq!(&padded[6..8], &[0x00, 0x00]);
    assert_eq!(&padded[8..12], &0x0000_0013u32.to_le_bytes());
    assert!(code.padded(4).is_none());
    assert!(CodeImage::new(vec![0; 17], 16).is_err());
}
