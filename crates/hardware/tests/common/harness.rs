use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rvtrial_core::Simulator;
use rvtrial_core::config::Config;
use rvtrial_core::core::Cpu;
use rvtrial_core::sim::RunOutcome;
use rvtrial_core::trial::TrialSpec;
use rvtrial_core::SimulationSession;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::common::builder::instruction::{InstructionBuilder, assemble, exit_sequence};
use crate::common::elf::ElfBuilder;

/// Test RAM is mapped at 0 so small addresses in test programs are valid.
pub const RAM_BASE: u64 = 0;
pub const RAM_SIZE: usize = 1024 * 1024;

/// Standard workload layout.
pub const CODE_ADDR: u64 = 0x1000;
pub const CODE_SIZE: u64 = 4096;
pub const EXIT_ADDR: u64 = CODE_ADDR + CODE_SIZE;
/// L1D tag 0x10 under the default 64 KiB / 2-way / 64 B geometry (512 sets).
pub const SANDBOX_ADDR: u64 = 0x80000;
pub const REGISTERS_ADDR: u64 = 0x90000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with every event at `DEBUG` and above captured; returns the formatted log.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let log = String::from_utf8(writer.0.lock().unwrap().clone()).unwrap();
    (result, log)
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.system.ram_base = RAM_BASE;
    config.memory.ram_size = RAM_SIZE;
    config
}

/// Base executable: a nop-filled `code` region followed by `exit(0)`.
pub fn base_executable() -> ElfBuilder {
    let nop = InstructionBuilder::new().nop().build();
    let mut program = vec![nop; (CODE_SIZE / 4) as usize];
    program.extend(exit_sequence(0));
    ElfBuilder::new(CODE_ADDR)
        .segment(CODE_ADDR, assemble(&program))
        .symbol("_start", CODE_ADDR, 0)
        .symbol("code", CODE_ADDR, CODE_SIZE)
        .symbol("sandbox", SANDBOX_ADDR, 0)
        .symbol("registers", REGISTERS_ADDR, 0)
}

/// Temporary directory holding test executables.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, elf: &ElfBuilder) -> PathBuf {
        let path = self.path(name);
        elf.write(&path);
        path
    }

    /// Writes the standard base executable and returns its path.
    pub fn base(&self) -> PathBuf {
        self.write("base", &base_executable())
    }

    /// A session over the standard base executable.
    pub fn session(&self, config: Config) -> SimulationSession {
        SimulationSession::new(config, self.base())
    }
}

/// A trial with an input of `sandbox` bytes followed by `registers` bytes.
pub fn trial(sandbox: &[u8], registers: &[u8]) -> TrialSpec {
    let mut input = sandbox.to_vec();
    input.extend_from_slice(registers);
    TrialSpec::new(sandbox.len(), input)
}

/// Direct access to a core without a loaded executable.
pub struct TestContext {
    pub sim: Simulator,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        Self {
            sim: Simulator::from_config(&config),
        }
    }

    /// Convenience accessor for the CPU.
    pub fn cpu(&self) -> &Cpu {
        &self.sim.cpu
    }

    /// Mutable convenience accessor for the CPU.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.sim.cpu
    }

    /// Load a sequence of 32-bit instructions into memory at `addr` and arm the core there.
    pub fn load_program(mut self, addr: u64, instructions: &[u32]) -> Self {
        assert!(self.sim.cpu.system.memory.write_bytes(addr, &assemble(instructions)));
        let sp = self.sim.cpu.system.memory.end() & !0xF;
        self.sim.cpu.start(addr, sp);
        self
    }

    /// Set a general-purpose register value.
    pub fn set_reg(&mut self, reg: usize, val: u64) {
        self.sim.cpu.regs.write(reg, val);
    }

    /// Read a general-purpose register value.
    pub fn get_reg(&self, reg: usize) -> u64 {
        self.sim.cpu.regs.read(reg)
    }

    pub fn run(&mut self, max_instructions: u64) -> RunOutcome {
        self.sim.run(max_instructions)
    }
}
