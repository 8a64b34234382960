//! External build step for the base executable.
//!
//! The base executable is assembled from a source file and linked against the simulator's
//! runtime library. Each step only runs when one of its inputs is newer than its output, so
//! repeated launches do not rebuild anything.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Inputs, outputs, and tools of the base executable build.
#[derive(Clone, Debug)]
pub struct BuildPlan {
    /// Assembly source of the base executable.
    pub source: PathBuf,
    /// Object file produced by the assembler.
    pub object: PathBuf,
    /// Runtime library linked into the executable.
    pub runtime_lib: PathBuf,
    /// Final executable.
    pub executable: PathBuf,
    /// Assembler program name or path.
    pub assembler: String,
    /// Linker program name or path.
    pub linker: String,
}

/// Which steps `ensure_executable` ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// The source was re-assembled.
    pub assembled: bool,
    /// The executable was re-linked.
    pub linked: bool,
}

/// Returns `true` if `input` is newer than `output`, or `output` is missing.
///
/// # Arguments
///
/// * `input` - Build input; must exist.
/// * `output` - Build output.
/// * `hint` - Appended to the error when `input` is missing.
pub fn is_newer(input: &Path, output: &Path, hint: &str) -> Result<bool> {
    let input_time = fs::metadata(input)
        .and_then(|m| m.modified())
        .with_context(|| format!("expected {} to exist; {hint}", input.display()))?;
    match fs::metadata(output).and_then(|m| m.modified()) {
        Ok(output_time) => Ok(input_time > output_time),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e).with_context(|| format!("cannot stat {}", output.display())),
    }
}

/// Builds the base executable if it is out of date.
pub fn ensure_executable(plan: &BuildPlan) -> Result<BuildOutcome> {
    let mut outcome = BuildOutcome::default();

    if is_newer(
        &plan.source,
        &plan.object,
        "run the launcher from the repository root",
    )? {
        create_parent(&plan.object)?;
        run(
            &plan.assembler,
            &[plan.source.as_os_str(), OsStr::new("-o"), plan.object.as_os_str()],
        )?;
        outcome.assembled = true;
    }

    let lib_changed = is_newer(
        &plan.runtime_lib,
        &plan.executable,
        "build the simulator runtime library first",
    )?;
    if lib_changed || is_newer(&plan.object, &plan.executable, "")? {
        create_parent(&plan.executable)?;
        run(
            &plan.linker,
            &[
                plan.object.as_os_str(),
                plan.runtime_lib.as_os_str(),
                OsStr::new("-o"),
                plan.executable.as_os_str(),
            ],
        )?;
        outcome.linked = true;
    }

    Ok(outcome)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    Ok(())
}

fn run(tool: &str, args: &[&OsStr]) -> Result<()> {
    let program = which::which(tool).with_context(|| format!("{tool} not found in PATH"))?;
    tracing::info!(
        "{} {}",
        program.display(),
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let status = Command::new(&program)
        .args(args)
        .status()
        .with_context(|| format!("failed to spawn {}", program.display()))?;
    if !status.success() {
        bail!("{tool} exited with {status}");
    }
    Ok(())
}
