//! Trial inputs.
//!
//! A trial input is a byte string split at `registers_start`: the head is copied into the
//! workload's `sandbox` region and the tail into its `registers` region. Inputs are keyed by a
//! multiplicative hash of their bytes, which doubles as the trial identifier.

use crate::common::constants::NOP_INSTRUCTION;
use crate::config::TrialConfig;
use crate::ipc::ProtocolError;

/// Seed of the input hash.
pub const INPUT_HASH_SEED: u64 = 0xbb7524eafb93804b;

/// Multiplier of the input hash.
pub const INPUT_HASH_MULTIPLIER: u64 = 0x21f782547ea34f3d;

/// Hashes trial input bytes.
///
/// ```
/// use rvtrial_core::trial::input_hash;
///
/// assert_eq!(input_hash(&[]), 0xbb7524eafb93804b);
/// assert_ne!(input_hash(&[1, 2]), input_hash(&[2, 1]));
/// ```
pub fn input_hash(input: &[u8]) -> u64 {
    input.iter().fold(INPUT_HASH_SEED, |h, &b| {
        h.wrapping_add(u64::from(b))
            .wrapping_mul(INPUT_HASH_MULTIPLIER)
    })
}

/// One fuzzer-submitted trial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialSpec {
    /// Opaque trial identifier; equals `input_hash(&input)`.
    pub id: u64,
    /// Offset in `input` where the register image starts.
    pub registers_start: usize,
    /// Sandbox bytes followed by register bytes.
    pub input: Vec<u8>,
}

impl TrialSpec {
    /// Builds a trial for `input`, deriving the identifier from its hash.
    pub fn new(registers_start: usize, input: Vec<u8>) -> Self {
        Self {
            id: input_hash(&input),
            registers_start,
            input,
        }
    }

    /// Bytes destined for the `sandbox` region.
    pub fn sandbox_bytes(&self) -> &[u8] {
        &self.input[..self.registers_start.min(self.input.len())]
    }

    /// Bytes destined for the `registers` region.
    pub fn register_bytes(&self) -> &[u8] {
        &self.input[self.registers_start.min(self.input.len())..]
    }

    /// Checks the identifier and the size of each part against `limits`.
    pub fn validate(&self, limits: &TrialConfig) -> Result<(), ProtocolError> {
        let actual = input_hash(&self.input);
        if actual != self.id {
            return Err(ProtocolError::HashMismatch {
                expected: self.id,
                actual,
            });
        }
        if self.registers_start > self.input.len() {
            return Err(ProtocolError::SplitOutOfRange {
                registers_start: self.registers_start as u64,
                len: self.input.len(),
            });
        }
        if self.sandbox_bytes().len() > limits.max_sandbox_size {
            return Err(ProtocolError::Oversize {
                what: "sandbox input",
                len: self.sandbox_bytes().len(),
                max: limits.max_sandbox_size,
            });
        }
        if self.register_bytes().len() > limits.max_registers_size {
            return Err(ProtocolError::Oversize {
                what: "register input",
                len: self.register_bytes().len(),
                max: limits.max_registers_size,
            });
        }
        Ok(())
    }
}

/// Test-case machine code patched into the `code` region of every bound process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeImage {
    bytes: Vec<u8>,
}

impl CodeImage {
    /// Wraps `bytes`, rejecting images larger than `max_len`.
    pub fn new(bytes: Vec<u8>, max_len: usize) -> Result<Self, ProtocolError> {
        if bytes.len() > max_len {
            return Err(ProtocolError::Oversize {
                what: "test case code",
                len: bytes.len(),
                max: max_len,
            });
        }
        Ok(Self { bytes })
    }

    /// Raw code bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex listing of the code as placed at `base`, eight bytes per line.
    ///
    /// ```
    /// use rvtrial_core::trial::CodeImage;
    ///
    /// let code = CodeImage::new((0..10).collect(), 64).unwrap();
    /// assert_eq!(
    ///     code.hex_dump(0x1000),
    ///     ["1000: 00 01 02 03 04 05 06 07", "1008: 08 09"]
    /// );
    /// ```
    pub fn hex_dump(&self, base: u64) -> Vec<String> {
        self.bytes
            .chunks(8)
            .zip((base..).step_by(8))
            .map(|(chunk, addr)| {
                let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
                format!("{addr:x}: {}", bytes.join(" "))
            })
            .collect()
    }

    /// Returns the code padded to `len` bytes with `nop` instructions.
    ///
    /// Returns `None` if the code does not fit.
    pub fn padded(&self, len: usize) -> Option<Vec<u8>> {
        if self.bytes.len() > len {
            return None;
        }
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.bytes);
        let nop = NOP_INSTRUCTION.to_le_bytes();
        while out.len() < len {
            let take = (len - out.len()).min(nop.len());
            let offset = out.len() % nop.len();
            let end = (offset + take).min(nop.len());
            out.extend_from_slice(&nop[offset..end]);
        }
        Some(out)
    }
}
