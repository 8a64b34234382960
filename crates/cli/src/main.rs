//! RISC-V trial executor CLI.
//!
//! This binary connects one simulated machine to a running fuzzer. It performs:
//! 1. **Build:** Re-assembles and re-links the base executable when its inputs changed.
//! 2. **Setup:** Builds the session from the default or a JSON topology, then connects to the
//!    fuzzer's abstract Unix socket and completes the handshake.
//! 3. **Campaign:** Runs trials until the fuzzer ends the campaign, then logs a summary.

mod toolchain;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rvtrial_core::config::Config;
use rvtrial_core::{Channel, SimulationDriver, SimulationSession, TrialController};

use crate::toolchain::BuildPlan;

#[derive(Parser, Debug)]
#[command(
    name = "rvtrial",
    author,
    version,
    about = "Run fuzzer-generated RISC-V test cases on a cycle-approximate core",
    long_about = "Connects to a fuzzer listening on an abstract Unix socket, runs each submitted \
                  trial on a simulated RV64IM core with L1/L2 caches, and reports the final cache \
                  state back.\n\nExamples:\n  rvtrial --socket-name revizor-0\n  rvtrial \
                  --socket-name revizor-0 --config topology.json --no-build"
)]
struct Cli {
    /// Name of the fuzzer's abstract socket (without the leading NUL byte).
    #[arg(long)]
    socket_name: String,

    /// Base executable each trial is bound to.
    #[arg(long, default_value = "build/RISCV/revizor/base")]
    executable: PathBuf,

    /// JSON topology file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the executable as is instead of rebuilding it when stale.
    #[arg(long)]
    no_build: bool,

    /// Assembly source of the base executable.
    #[arg(long, default_value = "src/revizor/base-riscv.s")]
    source: PathBuf,

    /// Object file produced from the source.
    #[arg(long, default_value = "build/RISCV/revizor/base.o")]
    object: PathBuf,

    /// Runtime library linked into the executable.
    #[arg(long, default_value = "util/m5/build/riscv/out/libm5.a")]
    runtime_lib: PathBuf,

    /// Assembler.
    #[arg(long, default_value = "riscv64-linux-gnu-as")]
    assembler: String,

    /// Linker.
    #[arg(long, default_value = "riscv64-linux-gnu-ld")]
    linker: String,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Config::from_json(&text).with_context(|| format!("invalid configuration {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_ref())?;

    if !cli.no_build {
        let plan = BuildPlan {
            source: cli.source,
            object: cli.object,
            runtime_lib: cli.runtime_lib,
            executable: cli.executable.clone(),
            assembler: cli.assembler,
            linker: cli.linker,
        };
        let outcome = toolchain::ensure_executable(&plan).context("building base executable")?;
        tracing::debug!(?outcome, "base executable up to date");
    }

    let limits = config.trial.clone();
    let mut session = SimulationSession::new(config, &cli.executable);
    let symbols = session
        .symbols()
        .with_context(|| format!("loading {}", cli.executable.display()))?;

    let mut channel = Channel::connect(&cli.socket_name, limits)
        .with_context(|| format!("connecting to @{}", cli.socket_name))?;
    channel
        .handshake(symbols.sandbox.addr, symbols.code.addr)
        .context("handshake with fuzzer")?;

    let mut controller = TrialController::new();
    let mut driver = SimulationDriver::new();
    let summary = driver
        .run(&mut session, &mut controller, &mut channel)
        .context("campaign aborted")?;

    summary.log();
    if driver.rejected() > 0 {
        tracing::warn!(rejected = driver.rejected(), "some fuzzer messages were rejected");
    }
    Ok(())
}
