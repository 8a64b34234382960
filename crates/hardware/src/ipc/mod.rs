//! Interprocess channel to the fuzzer.
//!
//! `wire` defines the framed message format and payload codecs; `channel` carries those frames
//! over a named Unix socket and turns them into trial-controller instructions.

/// Endpoint, transport, and request decoding.
pub mod channel;

/// Framing, opcodes, and payload codecs.
pub mod wire;

pub use self::channel::{
    Channel, ChannelEndpoint, ChannelError, ConnectionState, Instruction, Rejection,
    STATUS_FAILED, STATUS_OK,
};
pub use self::wire::{Frame, ProtocolError};
