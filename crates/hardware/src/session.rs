//! Simulation Session.
//!
//! The single long-lived simulator instance behind a channel. It owns:
//! 1. **Topology:** The immutable `Config` the session was built from.
//! 2. **Machine:** The `Simulator` (core, caches, memory system).
//! 3. **Workload:** The `WorkloadLoader`, the base executable path, and the process currently
//!    bound to the core.
//!
//! Trial preparation lives here as well: binding a fresh process, patching the test-case code
//! into it, and writing the trial input into its `sandbox` and `registers` regions.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::core::Cpu;
use crate::inspect::AccessError;
use crate::ipc::{ChannelError, ProtocolError};
use crate::sim::{LoadError, ProcessHandle, RunOutcome, Simulator, WorkloadLoader, WorkloadSymbols};
use crate::trial::{CodeImage, TrialSpec};

/// Errors surfaced by the trial controller and the driver.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A cache the controller needed is not attached.
    #[error(transparent)]
    NotAttached(#[from] AccessError),

    /// The channel to the fuzzer is gone.
    #[error(transparent)]
    Channel(ChannelError),

    /// A message from the fuzzer was rejected; the session can continue.
    #[error(transparent)]
    Protocol(ProtocolError),

    /// The base executable could not be loaded at startup.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl SessionError {
    /// Returns `true` if the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

impl From<ChannelError> for SessionError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Protocol(p) => Self::Protocol(p),
            ChannelError::Rejected(r) => Self::Protocol(r.error),
            other => Self::Channel(other),
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// The simulator instance a channel drives.
#[derive(Debug)]
pub struct SimulationSession {
    config: Config,
    simulator: Simulator,
    loader: WorkloadLoader,
    executable: PathBuf,
    process: Option<ProcessHandle>,
}

impl SimulationSession {
    /// Builds the machine described by `config` with `executable` as the base workload.
    ///
    /// The executable is not read until the first bind or `symbols` call.
    pub fn new(config: Config, executable: impl Into<PathBuf>) -> Self {
        let simulator = Simulator::from_config(&config);
        Self {
            config,
            simulator,
            loader: WorkloadLoader::new(),
            executable: executable.into(),
            process: None,
        }
    }

    /// Topology and limits the session was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The simulated core.
    pub fn cpu(&self) -> &Cpu {
        &self.simulator.cpu
    }

    /// The simulated core, mutably.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.simulator.cpu
    }

    /// Path of the base executable new trials are bound to.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Process currently bound to the core.
    pub fn process(&self) -> Option<&ProcessHandle> {
        self.process.as_ref()
    }

    /// Harness symbols of the base executable.
    pub fn symbols(&mut self) -> Result<WorkloadSymbols, LoadError> {
        Ok(self.loader.image(&self.executable)?.symbols)
    }

    /// Switches the base executable to `path`.
    ///
    /// The image is re-read from disk and must parse; on failure the previous executable stays
    /// in use, with its cached image intact.
    pub fn set_executable(&mut self, path: &Path) -> Result<(), LoadError> {
        let _ = self.loader.refresh(path)?;
        tracing::info!(path = %path.display(), "base executable changed");
        self.executable = path.to_path_buf();
        Ok(())
    }

    /// Runs the bound workload for at most one quantum (`general.quantum` instructions).
    pub fn run_quantum(&mut self) -> RunOutcome {
        self.simulator.run(self.config.general.quantum)
    }

    /// Binds a fresh process of the base executable and installs the trial into it.
    ///
    /// # Arguments
    ///
    /// * `code` - Test-case code to patch into the `code` region, if the fuzzer sent any.
    /// * `spec` - The trial whose input is written to `sandbox` and `registers`.
    ///
    /// # Returns
    ///
    /// The new process handle. On error the core is left idle with no process bound.
    pub fn prepare_trial(
        &mut self,
        code: Option<&CodeImage>,
        spec: &TrialSpec,
    ) -> Result<ProcessHandle, LoadError> {
        self.process = None;
        let path = self.executable.clone();
        let handle = self.loader.bind(&mut self.simulator.cpu, &path)?;

        if let Err(e) = self.install(&handle, code, spec) {
            self.simulator.cpu.detach();
            return Err(e);
        }
        self.process = Some(handle.clone());
        Ok(handle)
    }

    fn install(
        &mut self,
        handle: &ProcessHandle,
        code: Option<&CodeImage>,
        spec: &TrialSpec,
    ) -> Result<(), LoadError> {
        let limits = &self.config.trial;
        let memory = &mut self.simulator.cpu.system.memory;
        let symbols = handle.symbols;
        let out_of_range = |addr: u64, size: usize| LoadError::SegmentOutOfRange {
            path: handle.path.clone(),
            addr,
            size: size as u64,
        };

        if let Some(code) = code {
            let len = region_len(symbols.code.size, limits.max_code_size);
            let padded = code
                .padded(len)
                .ok_or_else(|| out_of_range(symbols.code.addr, code.bytes().len()))?;
            if !memory.write_bytes(symbols.code.addr, &padded) {
                return Err(out_of_range(symbols.code.addr, len));
            }
        }

        for (region, size, bytes) in [
            (symbols.sandbox, limits.max_sandbox_size, spec.sandbox_bytes()),
            (
                symbols.registers,
                limits.max_registers_size,
                spec.register_bytes(),
            ),
        ] {
            if !memory.fill(region.addr, size, 0) || !memory.write_bytes(region.addr, bytes) {
                return Err(out_of_range(region.addr, size));
            }
        }
        Ok(())
    }
}

/// Size of a patched region: the symbol size when the executable records one.
fn region_len(symbol_size: u64, default: usize) -> usize {
    match usize::try_from(symbol_size) {
        Ok(0) | Err(_) => default,
        Ok(size) => size,
    }
}
