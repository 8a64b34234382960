//! Fuzzer channel.
//!
//! This module implements the simulator end of the connection to the fuzzer. It provides:
//! 1. **Endpoint:** `ChannelEndpoint`, the channel name plus its connection state.
//! 2. **Transport:** `Channel<T>`, generic over any `Read + Write` byte stream. `connect`
//!    opens the named abstract Unix socket the fuzzer listens on.
//! 3. **Messages:** The handshake, decoding of fuzzer requests into `Instruction`s, and the
//!    acknowledgements and result reports sent back.
//!
//! `receive` blocks until a complete frame arrives. A malformed request is drained and refused
//! with `ChannelError::Rejected`, leaving the channel usable; `reply_rejected` then tells the
//! fuzzer so it can retry. End of stream or an I/O failure closes the channel for good.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use thiserror::Error;

use super::wire::{self, Frame, ProtocolError, op};
use crate::config::TrialConfig;
use crate::trial::{TrialResult, TrialSpec};

/// Status word acknowledging a successful setup request.
pub const STATUS_OK: u64 = 0;

/// Status word reporting a failed setup request.
pub const STATUS_FAILED: u64 = 1;

/// Errors raised by the channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer closed the connection, or the channel was already closed.
    #[error("channel closed")]
    Closed,

    /// The transport failed.
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message was rejected; the channel remains usable.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A fuzzer request was drained and refused; the fuzzer still awaits a reply to it.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl ChannelError {
    /// Returns `true` if the channel cannot be used anymore.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Protocol(_) | Self::Rejected(_))
    }
}

/// A fuzzer request that arrived intact but was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    /// Opcode of the refused request.
    pub op: u64,
    /// Input hash carried by a refused `TRACE_TEST_CASE`, if its payload held one.
    pub id: Option<u64>,
    /// Why the request was refused.
    pub error: ProtocolError,
}

impl Rejection {
    /// Builds a rejection for a request with opcode `op` whose payload starts with `head`.
    pub fn new(op: u64, head: &[u8], error: ProtocolError) -> Self {
        let id = if op == op::TRACE_TEST_CASE {
            wire::peek_trial_id(head)
        } else {
            None
        };
        Self { op, id, error }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected: {}", op::name(self.op), self.error)
    }
}

impl std::error::Error for Rejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Connection state of the endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport yet.
    #[default]
    Disconnected,
    /// Transport attached.
    Connected,
    /// Transport lost or shut down; never reopened.
    Closed,
}

/// The named endpoint of the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEndpoint {
    /// Socket name, without the leading NUL of the abstract namespace.
    pub name: String,
    /// Connection state.
    pub state: ConnectionState,
}

impl ChannelEndpoint {
    /// Creates a disconnected endpoint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ChannelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// A request decoded from the fuzzer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Run one trial.
    Trial(TrialSpec),
    /// No more trials.
    EndOfCampaign,
    /// Replace the test-case code.
    LoadCode(Vec<u8>),
    /// Replace the base executable.
    LoadExecutable(PathBuf),
    /// Reset trial numbering and statistics.
    ResetLog,
}

impl Instruction {
    /// Decodes a fuzzer request.
    ///
    /// # Arguments
    ///
    /// * `frame` - The received frame.
    /// * `limits` - Size limits applied to code and trial inputs.
    pub fn decode(frame: &Frame, limits: &TrialConfig) -> Result<Self, ProtocolError> {
        let empty = |instruction: Self| {
            if frame.payload.is_empty() {
                Ok(instruction)
            } else {
                Err(ProtocolError::TrailingBytes {
                    what: op::name(frame.op),
                    extra: frame.payload.len(),
                })
            }
        };

        match frame.op {
            op::QUIT => empty(Self::EndOfCampaign),
            op::RESET_LOG => empty(Self::ResetLog),
            op::LOAD_TEST_CASE => {
                if frame.payload.len() > limits.max_code_size {
                    return Err(ProtocolError::Oversize {
                        what: "test case code",
                        len: frame.payload.len(),
                        max: limits.max_code_size,
                    });
                }
                Ok(Self::LoadCode(frame.payload.clone()))
            }
            op::LOAD_EXECUTABLE => {
                let path =
                    std::str::from_utf8(&frame.payload).map_err(|_| ProtocolError::BadUtf8)?;
                Ok(Self::LoadExecutable(PathBuf::from(path)))
            }
            op::TRACE_TEST_CASE => {
                let spec = wire::decode_trial(&frame.payload)?;
                spec.validate(limits)?;
                Ok(Self::Trial(spec))
            }
            other => Err(ProtocolError::UnknownOp(other)),
        }
    }
}

/// The simulator end of the fuzzer connection.
pub struct Channel<T: Read + Write> {
    endpoint: ChannelEndpoint,
    transport: Option<T>,
    limits: TrialConfig,
}

impl<T: Read + Write> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
impl Channel<std::os::unix::net::UnixStream> {
    /// Connects to the fuzzer listening on `name`.
    ///
    /// On Linux `name` is an abstract-namespace socket name; elsewhere it is a filesystem path.
    pub fn connect(name: &str, limits: TrialConfig) -> Result<Self, ChannelError> {
        let stream = open_stream(name)?;
        tracing::info!(endpoint = %format!("@{name}"), "connected to fuzzer");
        Ok(Self::from_transport(name, stream, limits))
    }
}

#[cfg(target_os = "linux")]
fn open_stream(name: &str) -> io::Result<std::os::unix::net::UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    UnixStream::connect_addr(&addr)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn open_stream(name: &str) -> io::Result<std::os::unix::net::UnixStream> {
    std::os::unix::net::UnixStream::connect(name)
}

impl<T: Read + Write> Channel<T> {
    /// Wraps an already connected transport.
    ///
    /// # Arguments
    ///
    /// * `name` - Endpoint name, used in logs.
    /// * `transport` - Connected byte stream.
    /// * `limits` - Size limits applied to incoming messages.
    pub fn from_transport(name: impl Into<String>, transport: T, limits: TrialConfig) -> Self {
        let mut endpoint = ChannelEndpoint::new(name);
        endpoint.state = ConnectionState::Connected;
        Self {
            endpoint,
            transport: Some(transport),
            limits,
        }
    }

    /// The endpoint and its state.
    pub fn endpoint(&self) -> &ChannelEndpoint {
        &self.endpoint
    }

    /// Returns `true` while the transport is usable.
    pub fn is_open(&self) -> bool {
        self.endpoint.state == ConnectionState::Connected
    }

    /// Drops the transport; every later call fails with `ChannelError::Closed`.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(endpoint = %self.endpoint, "channel closed");
        }
        self.endpoint.state = ConnectionState::Closed;
    }

    /// Closes the channel on a fatal error and passes the error through.
    fn check<V>(&mut self, result: Result<V, ChannelError>) -> Result<V, ChannelError> {
        if matches!(&result, Err(e) if e.is_fatal()) {
            self.close();
        }
        result
    }

    fn read_frame(&mut self) -> Result<Frame, ChannelError> {
        let max = self.limits.max_message_size;
        let result = match self.transport.as_mut() {
            Some(transport) => Frame::read_from(transport, max),
            None => Err(ChannelError::Closed),
        };
        self.check(result)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), ChannelError> {
        let result = match self.transport.as_mut() {
            Some(transport) => frame.write_to(transport).map_err(ChannelError::from),
            None => Err(ChannelError::Closed),
        };
        self.check(result)
    }

    /// Waits for the fuzzer's `INIT` and answers with the workload layout.
    ///
    /// # Arguments
    ///
    /// * `sandbox_addr` - Address of the `sandbox` region.
    /// * `code_addr` - Address of the `code` region.
    pub fn handshake(&mut self, sandbox_addr: u64, code_addr: u64) -> Result<(), ChannelError> {
        let frame = self.read_frame()?;
        if frame.op != op::INIT {
            return Err(ProtocolError::Unexpected {
                expected: op::name(op::INIT),
                got: op::name(frame.op),
            }
            .into());
        }
        let ack = Frame::serialized(op::ACK_INIT, &(sandbox_addr, code_addr)).map_err(outgoing)?;
        self.write_frame(&ack)?;
        tracing::debug!(
            sandbox = %format!("{sandbox_addr:#x}"),
            code = %format!("{code_addr:#x}"),
            "handshake complete"
        );
        Ok(())
    }

    /// Blocks until the next request arrives.
    pub fn receive(&mut self) -> Result<Instruction, ChannelError> {
        let frame = self.read_frame()?;
        tracing::debug!(
            op = op::name(frame.op),
            len = frame.payload.len(),
            "received message"
        );
        Instruction::decode(&frame, &self.limits)
            .map_err(|error| Rejection::new(frame.op, &frame.payload, error).into())
    }

    /// Reports a trial result.
    pub fn send_result(&mut self, result: &TrialResult) -> Result<(), ChannelError> {
        let payload = wire::encode_result(result).map_err(outgoing)?;
        self.write_frame(&Frame::new(op::ACK_TRACE, payload))
    }

    /// Acknowledges a `LOAD_TEST_CASE` request.
    pub fn ack_load_test_case(&mut self, status: u64) -> Result<(), ChannelError> {
        self.write_frame(&Frame::serialized(op::ACK_LOAD_TEST_CASE, &status).map_err(outgoing)?)
    }

    /// Acknowledges a `LOAD_EXECUTABLE` request.
    pub fn ack_load_executable(&mut self, status: u64) -> Result<(), ChannelError> {
        self.write_frame(&Frame::serialized(op::ACK_LOAD_EXECUTABLE, &status).map_err(outgoing)?)
    }

    /// Answers a refused request so the fuzzer can retry it.
    ///
    /// Setup requests get their acknowledgement with `STATUS_FAILED`; a refused trial gets an
    /// `ACK_TRACE` with `TrialStatus::Rejected`. Requests that are never acknowledged (`QUIT`,
    /// `RESET_LOG`, unknown opcodes) get no reply.
    ///
    /// # Returns
    ///
    /// `true` if a reply was written.
    pub fn reply_rejected(&mut self, rejection: &Rejection) -> Result<bool, ChannelError> {
        match rejection.op {
            op::LOAD_TEST_CASE => self.ack_load_test_case(STATUS_FAILED)?,
            op::LOAD_EXECUTABLE => self.ack_load_executable(STATUS_FAILED)?,
            op::TRACE_TEST_CASE => {
                self.send_result(&TrialResult::rejected(rejection.id.unwrap_or_default()))?;
            }
            _ => return Ok(false),
        }
        tracing::debug!(op = op::name(rejection.op), "rejection answered");
        Ok(true)
    }
}

/// A message this side could not encode; the stream cannot carry on without it.
fn outgoing(e: ProtocolError) -> ChannelError {
    ChannelError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
}
