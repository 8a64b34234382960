//! Workload Loader.
//!
//! This module (re)binds executable images to the simulated core. It performs:
//! 1. **Parsing:** Reads an ELF64 little-endian RISC-V executable with the `object` crate:
//!    entry point, loadable segments, and the symbols the trial harness patches
//!    (`code`, `sandbox`, `registers`).
//! 2. **Caching:** Parsed images are kept per path so rebinding the same executable for every
//!    trial does not re-read the file.
//! 3. **Binding:** Tears down the previous process (dirty RAM pages zeroed, registers cleared),
//!    copies the segments, and arms the core at the entry point with the stack at the top of
//!    RAM. Caches are left untouched.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use object::{Architecture, Object, ObjectKind, ObjectSegment, ObjectSymbol};
use thiserror::Error;

use crate::common::constants::STACK_ALIGN;
use crate::core::Cpu;

/// Symbol naming the test-case code region.
pub const SYM_CODE: &str = "code";
/// Symbol naming the memory sandbox the test case operates on.
pub const SYM_SANDBOX: &str = "sandbox";
/// Symbol naming the initial register image.
pub const SYM_REGISTERS: &str = "registers";

/// Errors raised while loading or binding a workload.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The executable does not exist.
    #[error("executable {0} not found")]
    NotFound(PathBuf),

    /// The executable exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file is not a well-formed object file.
    #[error("{path} is malformed: {reason}")]
    Malformed {
        /// Offending path.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// The file is a valid object but not an RV64 little-endian executable.
    #[error("{path} is incompatible: {reason}")]
    Incompatible {
        /// Offending path.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// A symbol the trial harness needs is absent.
    #[error("{path} does not define symbol `{symbol}`")]
    MissingSymbol {
        /// Offending path.
        path: PathBuf,
        /// Missing symbol name.
        symbol: &'static str,
    },

    /// A loadable segment does not fit in simulated RAM.
    #[error("{path}: segment {addr:#x}+{size:#x} lies outside RAM")]
    SegmentOutOfRange {
        /// Offending path.
        path: PathBuf,
        /// Segment virtual address.
        addr: u64,
        /// Segment size in memory.
        size: u64,
    },

    /// The core is still executing the previous workload.
    #[error("cannot bind while the core is executing a workload")]
    Busy,
}

/// A named address range inside an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    /// Start address.
    pub addr: u64,
    /// Size in bytes as recorded in the symbol table (0 for plain labels).
    pub size: u64,
}

/// The regions the trial harness patches before each run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkloadSymbols {
    /// Test-case code region.
    pub code: Region,
    /// Memory sandbox.
    pub sandbox: Region,
    /// Initial register image.
    pub registers: Region,
}

/// One loadable segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Load address.
    pub addr: u64,
    /// File-backed contents.
    pub data: Vec<u8>,
    /// Size in memory; bytes past `data.len()` are zero.
    pub mem_size: u64,
}

/// A parsed executable image.
#[derive(Clone, Debug)]
pub struct Image {
    /// Path the image was read from.
    pub path: PathBuf,
    /// Entry point.
    pub entry: u64,
    /// Loadable segments.
    pub segments: Vec<Segment>,
    /// Harness symbols.
    pub symbols: WorkloadSymbols,
}

impl Image {
    /// Reads and parses the executable at `path`.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound(path.to_path_buf())
            } else {
                LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(path, &bytes)
    }

    /// Parses an executable already in memory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path used in diagnostics and as the image's identity.
    /// * `bytes` - Raw file contents.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self, LoadError> {
        let malformed = |e: object::Error| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let incompatible = |reason: String| LoadError::Incompatible {
            path: path.to_path_buf(),
            reason,
        };

        let file = object::File::parse(bytes).map_err(malformed)?;

        if file.architecture() != Architecture::Riscv64 {
            return Err(incompatible(format!(
                "architecture {:?}, expected Riscv64",
                file.architecture()
            )));
        }
        if !file.is_little_endian() {
            return Err(incompatible("big-endian image".into()));
        }
        if file.kind() != ObjectKind::Executable {
            return Err(incompatible(format!(
                "object kind {:?}, expected an executable",
                file.kind()
            )));
        }

        let mut segments = Vec::new();
        for segment in file.segments() {
            let data = segment.data().map_err(malformed)?;
            segments.push(Segment {
                addr: segment.address(),
                data: data.to_vec(),
                mem_size: segment.size().max(data.len() as u64),
            });
        }

        let lookup = |name: &'static str| {
            file.symbols()
                .find(|sym| sym.name() == Ok(name))
                .map(|sym| Region {
                    addr: sym.address(),
                    size: sym.size(),
                })
                .ok_or_else(|| LoadError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: name,
                })
        };
        let symbols = WorkloadSymbols {
            code: lookup(SYM_CODE)?,
            sandbox: lookup(SYM_SANDBOX)?,
            registers: lookup(SYM_REGISTERS)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            entry: file.entry(),
            segments,
            symbols,
        })
    }
}

/// The process currently bound to the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Monotonically increasing process identifier.
    pub pid: u64,
    /// Executable the process was created from.
    pub path: PathBuf,
    /// Entry point the core was armed at.
    pub entry: u64,
    /// Harness symbols of the executable.
    pub symbols: WorkloadSymbols,
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} ({})", self.pid, self.path.display())
    }
}

/// Binds executable images to a core.
#[derive(Debug, Default)]
pub struct WorkloadLoader {
    images: HashMap<PathBuf, Arc<Image>>,
    next_pid: u64,
}

impl WorkloadLoader {
    /// Creates a loader with an empty image cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed image for `path`, reading it on first use.
    pub fn image(&mut self, path: &Path) -> Result<Arc<Image>, LoadError> {
        if let Some(image) = self.images.get(path) {
            return Ok(Arc::clone(image));
        }
        let image = Arc::new(Image::open(path)?);
        tracing::debug!(
            path = %path.display(),
            entry = %format!("{:#x}", image.entry),
            segments = image.segments.len(),
            "parsed executable"
        );
        let _ = self.images.insert(path.to_path_buf(), Arc::clone(&image));
        Ok(image)
    }

    /// Re-reads `path` from disk.
    ///
    /// The cached image is replaced only if the new one parses; on error the previous image
    /// of `path`, if any, stays cached.
    pub fn refresh(&mut self, path: &Path) -> Result<Arc<Image>, LoadError> {
        let image = Arc::new(Image::open(path)?);
        tracing::debug!(
            path = %path.display(),
            entry = %format!("{:#x}", image.entry),
            "re-read executable"
        );
        let _ = self.images.insert(path.to_path_buf(), Arc::clone(&image));
        Ok(image)
    }

    /// Replaces the workload bound to `cpu` with a fresh process of `path`.
    ///
    /// Only legal while the core is not executing. The previous process is torn down before
    /// the new one is created; caches are not touched.
    ///
    /// # Returns
    ///
    /// The handle of the new process, or a `LoadError`; on error the previous process is
    /// left in place when the failure is detected before teardown.
    pub fn bind(&mut self, cpu: &mut Cpu, path: &Path) -> Result<ProcessHandle, LoadError> {
        if cpu.is_active() {
            return Err(LoadError::Busy);
        }
        let image = self.image(path)?;

        for segment in &image.segments {
            if !cpu.system.memory.contains(segment.addr, segment.mem_size) {
                return Err(LoadError::SegmentOutOfRange {
                    path: image.path.clone(),
                    addr: segment.addr,
                    size: segment.mem_size,
                });
            }
        }

        let scrubbed = cpu.system.memory.scrub();
        cpu.detach();

        // RAM is all zero after the scrub, so only file-backed bytes need copying.
        for segment in &image.segments {
            let _ = cpu.system.memory.write_bytes(segment.addr, &segment.data);
        }

        let sp = cpu.system.memory.end() & !(STACK_ALIGN - 1);
        cpu.start(image.entry, sp);

        self.next_pid += 1;
        let handle = ProcessHandle {
            pid: self.next_pid,
            path: image.path.clone(),
            entry: image.entry,
            symbols: image.symbols,
        };
        tracing::debug!(%handle, scrubbed_pages = scrubbed, "bound workload");
        Ok(handle)
    }

    /// Re-reads `path` from disk and binds it.
    pub fn reload(&mut self, cpu: &mut Cpu, path: &Path) -> Result<ProcessHandle, LoadError> {
        let _ = self.refresh(path)?;
        self.bind(cpu, path)
    }
}
