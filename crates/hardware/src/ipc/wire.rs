//! Wire format.
//!
//! Every message is a frame: `op: u64`, `len: u64`, then `len` payload bytes, all
//! little-endian. This module provides:
//! 1. **Opcodes:** The message magics exchanged with the fuzzer (`op`).
//! 2. **Framing:** Reading and writing frames. A rejected frame is always consumed in full so the
//!    stream stays in sync for the next one.
//! 3. **Payload codecs:** `TrialResult` and `TrialSpec` encoding with `bincode`, configured for
//!    fixed-width little-endian integers. Only the frame header is written by hand.

use std::io::{self, Read, Write};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::channel::{ChannelError, Rejection};
use crate::inspect::{CacheLevel, LineDescriptor, LineMetadata};
use crate::trial::{CacheSnapshot, TrialResult, TrialSpec, TrialStatus};

/// Message opcodes.
pub mod op {
    /// Fuzzer → simulator: open the session.
    pub const INIT: u64 = 0xd09e95bc2c73ad66;
    /// Simulator → fuzzer: session open; carries the sandbox and code addresses.
    pub const ACK_INIT: u64 = 0xc4f991d25774a0ac;
    /// Fuzzer → simulator: new test-case code.
    pub const LOAD_TEST_CASE: u64 = 0xf06e27858611c27a;
    /// Simulator → fuzzer: test-case code accepted.
    pub const ACK_LOAD_TEST_CASE: u64 = 0x847431e37076fb26;
    /// Fuzzer → simulator: rebind the base executable.
    pub const LOAD_EXECUTABLE: u64 = 0x5b0c8d3a9e71f244;
    /// Simulator → fuzzer: base executable rebound (or not).
    pub const ACK_LOAD_EXECUTABLE: u64 = 0x2fd1e6b47c0a9935;
    /// Fuzzer → simulator: run one trial input.
    pub const TRACE_TEST_CASE: u64 = 0x09ca711a73355bea;
    /// Simulator → fuzzer: trial result.
    pub const ACK_TRACE: u64 = 0xc1f8bc29862ef946;
    /// Fuzzer → simulator: reset trial numbering and statistics.
    pub const RESET_LOG: u64 = 0x7e310c4276780c9b;
    /// Fuzzer → simulator: end of campaign.
    pub const QUIT: u64 = 0x8492384098c80892;

    /// Human-readable opcode name for logs.
    pub fn name(op: u64) -> &'static str {
        match op {
            INIT => "INIT",
            ACK_INIT => "ACK_INIT",
            LOAD_TEST_CASE => "LOAD_TEST_CASE",
            ACK_LOAD_TEST_CASE => "ACK_LOAD_TEST_CASE",
            LOAD_EXECUTABLE => "LOAD_EXECUTABLE",
            ACK_LOAD_EXECUTABLE => "ACK_LOAD_EXECUTABLE",
            TRACE_TEST_CASE => "TRACE_TEST_CASE",
            ACK_TRACE => "ACK_TRACE",
            RESET_LOG => "RESET_LOG",
            QUIT => "QUIT",
            _ => "UNKNOWN",
        }
    }
}

/// Size of the frame header.
pub const HEADER_LEN: usize = 16;

/// Size of the fixed part of an encoded `TrialResult`.
pub const RESULT_HEADER_LEN: usize = 6 * 8;

/// Size of one per-cache header in an encoded `TrialResult`.
pub const CACHE_HEADER_LEN: usize = 2 * 8;

/// Size of one encoded line descriptor.
pub const LINE_RECORD_LEN: usize = 4 + 4 + 8 + 4 + 4;

const FLAG_VALID: u32 = 1 << 0;
const FLAG_DIRTY: u32 = 1 << 1;

/// A message that was received intact but cannot be accepted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The opcode is not one the receiver understands.
    #[error("unknown opcode {0:#018x}")]
    UnknownOp(u64),

    /// A handshake message arrived out of order.
    #[error("expected {expected}, got {got}")]
    Unexpected {
        /// Opcode name that was expected.
        expected: &'static str,
        /// Opcode name that arrived.
        got: &'static str,
    },

    /// The payload ended before a field could be read.
    #[error("{what}: payload truncated at {len} bytes")]
    Truncated {
        /// What was being decoded.
        what: &'static str,
        /// Payload length.
        len: usize,
    },

    /// The payload carries bytes past its last field.
    #[error("{what}: {extra} trailing bytes")]
    TrailingBytes {
        /// What was being decoded.
        what: &'static str,
        /// Number of unexpected bytes.
        extra: usize,
    },

    /// A payload or one of its parts exceeds the configured limit.
    #[error("{what} of {len} bytes exceeds the {max} byte limit")]
    Oversize {
        /// What was too large.
        what: &'static str,
        /// Offending size.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// An executable path is not valid UTF-8.
    #[error("executable path is not valid UTF-8")]
    BadUtf8,

    /// The trial identifier does not match the hash of its input.
    #[error("input hash mismatch: message says {expected:#018x}, input hashes to {actual:#018x}")]
    HashMismatch {
        /// Identifier carried by the message.
        expected: u64,
        /// Hash of the input bytes.
        actual: u64,
    },

    /// `registers_start` lies past the end of the input.
    #[error("registers start {registers_start} is past the {len} byte input")]
    SplitOutOfRange {
        /// Requested split offset.
        registers_start: u64,
        /// Input length.
        len: usize,
    },

    /// A result names a cache level that does not exist.
    #[error("unknown cache level {0}")]
    UnknownLevel(u64),

    /// A result carries an unknown status code.
    #[error("unknown trial status {0}")]
    UnknownStatus(u64),

    /// The payload codec refused a value.
    #[error("{what}: {reason}")]
    Codec {
        /// What was being encoded or decoded.
        what: &'static str,
        /// Codec message.
        reason: String,
    },
}

/// One framed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Opcode.
    pub op: u64,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(op: u64, payload: Vec<u8>) -> Self {
        Self { op, payload }
    }

    /// Creates a frame without payload.
    pub fn empty(op: u64) -> Self {
        Self::new(op, Vec::new())
    }

    /// Creates a frame whose payload is `value` in the payload encoding.
    ///
    /// Tuples and fixed arrays of integers are laid out back to back with no count prefix.
    pub fn serialized<T: Serialize>(op: u64, value: &T) -> Result<Self, ProtocolError> {
        Ok(Self::new(op, encode(value, op::name(op))?))
    }

    /// Serialises the frame, header included.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.op.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Writes the frame to `w` and flushes it.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.encode())?;
        w.flush()
    }

    /// Reads one frame from `r`.
    ///
    /// # Arguments
    ///
    /// * `r` - Byte stream positioned at a frame boundary.
    /// * `max_payload` - Largest accepted payload. Larger payloads are drained and rejected.
    ///
    /// # Returns
    ///
    /// The frame, `ChannelError::Closed` if the stream ends anywhere inside it,
    /// `ChannelError::Io` for other transport failures, or `ChannelError::Rejected` for an
    /// oversize payload (after draining it).
    pub fn read_from<R: Read>(r: &mut R, max_payload: usize) -> Result<Self, ChannelError> {
        let mut header = [0u8; HEADER_LEN];
        read_exact(r, &mut header)?;
        let (op_bytes, len_bytes) = header.split_at(8);
        let op = u64::from_le_bytes(word(op_bytes));
        let len = u64::from_le_bytes(word(len_bytes));

        if len > max_payload as u64 {
            // The head is kept so the rejection can name the trial it refuses.
            let mut head = Vec::new();
            let _ = r.by_ref().take(len.min(8)).read_to_end(&mut head)?;
            let rest = len - head.len() as u64;
            let drained = io::copy(&mut r.by_ref().take(rest), &mut io::sink())?;
            if drained < rest {
                return Err(ChannelError::Closed);
            }
            let error = ProtocolError::Oversize {
                what: "message payload",
                len: usize::try_from(len).unwrap_or(usize::MAX),
                max: max_payload,
            };
            return Err(Rejection::new(op, &head, error).into());
        }

        let mut payload = vec![0u8; len as usize];
        read_exact(r, &mut payload)?;
        Ok(Self { op, payload })
    }
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), ChannelError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ChannelError::Closed
        } else {
            ChannelError::Io(e)
        }
    })
}

fn word(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}

/// Payload codec: fixed-width little-endian integers, sequences prefixed by a `u64` count.
#[inline(always)]
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_no_limit()
        .with_little_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Serialises `value` as a payload; `what` names it in errors.
pub fn encode<T: Serialize>(value: &T, what: &'static str) -> Result<Vec<u8>, ProtocolError> {
    codec().serialize(value).map_err(|e| ProtocolError::Codec {
        what,
        reason: e.to_string(),
    })
}

/// Deserialises a payload that must hold exactly one `T`.
pub fn decode<T: DeserializeOwned>(payload: &[u8], what: &'static str) -> Result<T, ProtocolError> {
    let (value, rest) = decode_prefix(payload, what)?;
    if !rest.is_empty() {
        return Err(ProtocolError::TrailingBytes {
            what,
            extra: rest.len(),
        });
    }
    Ok(value)
}

/// Deserialises a `T` from the front of `payload` and returns it with the unread tail.
fn decode_prefix<'a, T: DeserializeOwned>(
    payload: &'a [u8],
    what: &'static str,
) -> Result<(T, &'a [u8]), ProtocolError> {
    let mut rest = payload;
    let value = codec()
        .deserialize_from(&mut rest)
        .map_err(|e| match *e {
            bincode::ErrorKind::Io(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                ProtocolError::Truncated {
                    what,
                    len: payload.len(),
                }
            }
            ref other => ProtocolError::Codec {
                what,
                reason: other.to_string(),
            },
        })?;
    Ok((value, rest))
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultRecord {
    id: u64,
    status: u64,
    detail: u64,
    cycles: u64,
    instructions: u64,
    caches: Vec<CacheRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    level: u64,
    lines: Vec<LineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LineRecord {
    set: u32,
    way: u32,
    tag: u64,
    flags: u32,
    age: u32,
}

impl From<&LineDescriptor> for LineRecord {
    fn from(line: &LineDescriptor) -> Self {
        let mut flags = 0;
        if line.valid {
            flags |= FLAG_VALID;
        }
        if line.metadata.dirty {
            flags |= FLAG_DIRTY;
        }
        Self {
            set: line.set,
            way: line.way,
            tag: line.tag,
            flags,
            age: line.metadata.age,
        }
    }
}

impl From<LineRecord> for LineDescriptor {
    fn from(record: LineRecord) -> Self {
        Self {
            set: record.set,
            way: record.way,
            tag: record.tag,
            valid: record.flags & FLAG_VALID != 0,
            metadata: LineMetadata {
                dirty: record.flags & FLAG_DIRTY != 0,
                age: record.age,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TrialHeader {
    id: u64,
    registers_start: u64,
}

/// Encodes a trial result as the payload of an `ACK_TRACE` frame.
pub fn encode_result(result: &TrialResult) -> Result<Vec<u8>, ProtocolError> {
    let record = ResultRecord {
        id: result.id,
        status: result.status.code(),
        detail: result.detail,
        cycles: result.cycles,
        instructions: result.instructions,
        caches: result
            .caches
            .iter()
            .map(|cache| CacheRecord {
                level: cache.level.id(),
                lines: cache.lines.iter().map(LineRecord::from).collect(),
            })
            .collect(),
    };
    encode(&record, "trial result")
}

/// Decodes the payload of an `ACK_TRACE` frame.
pub fn decode_result(payload: &[u8]) -> Result<TrialResult, ProtocolError> {
    let record: ResultRecord = decode(payload, "trial result")?;
    let status =
        TrialStatus::from_code(record.status).ok_or(ProtocolError::UnknownStatus(record.status))?;
    let caches = record
        .caches
        .into_iter()
        .map(|cache| {
            let level =
                CacheLevel::from_id(cache.level).ok_or(ProtocolError::UnknownLevel(cache.level))?;
            Ok(CacheSnapshot {
                level,
                lines: cache.lines.into_iter().map(LineDescriptor::from).collect(),
            })
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    Ok(TrialResult {
        id: record.id,
        status,
        detail: record.detail,
        cycles: record.cycles,
        instructions: record.instructions,
        caches,
    })
}

/// Encodes a trial as the payload of a `TRACE_TEST_CASE` frame.
pub fn encode_trial(spec: &TrialSpec) -> Result<Vec<u8>, ProtocolError> {
    let header = TrialHeader {
        id: spec.id,
        registers_start: spec.registers_start as u64,
    };
    let mut out = encode(&header, "trial input")?;
    out.extend_from_slice(&spec.input);
    Ok(out)
}

/// Decodes the payload of a `TRACE_TEST_CASE` frame.
///
/// Only the layout is checked here; see `TrialSpec::validate` for hash and size checks.
pub fn decode_trial(payload: &[u8]) -> Result<TrialSpec, ProtocolError> {
    let (header, input): (TrialHeader, _) = decode_prefix(payload, "trial input")?;
    let registers_start = usize::try_from(header.registers_start)
        .ok()
        .filter(|start| *start <= input.len())
        .ok_or(ProtocolError::SplitOutOfRange {
            registers_start: header.registers_start,
            len: input.len(),
        })?;
    Ok(TrialSpec {
        id: header.id,
        registers_start,
        input: input.to_vec(),
    })
}

/// Input hash carried by a `TRACE_TEST_CASE` payload, if it is long enough to hold one.
pub fn peek_trial_id(payload: &[u8]) -> Option<u64> {
    decode_prefix::<u64>(payload, "trial input")
        .ok()
        .map(|(id, _)| id)
}
