//! Configuration system for the trial executor.
//!
//! This module defines all configuration structures and enums used to parameterize
//! a simulation session. It provides:
//! 1. **Defaults:** Baseline hardware constants reproducing the reference topology
//!    (16 KiB L1I, 64 KiB L1D, 256 KiB L2, 512 MiB DDR-style RAM).
//! 2. **Structures:** Hierarchical config for general, system, memory, cache, and trial limits.
//! 3. **Enums:** Memory controller, replacement policy, and prefetcher types.
//! 4. **Validation:** Geometry checks performed once, before a session is built.
//!
//! Configuration is supplied as JSON (`Config::from_json`) or `Config::default()` is used.
//! The topology is immutable once a session has been constructed from it.

use serde::Deserialize;
use thiserror::Error;

use crate::common::PAGE_SIZE;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden in a JSON configuration file.
mod defaults {
    /// Base address of main system RAM (2 GiB).
    ///
    /// Accesses below this address, or past `RAM_BASE + RAM_SIZE`, are access faults.
    pub const RAM_BASE: u64 = 0x8000_0000;

    /// Total size of main system RAM (512 MiB).
    pub const RAM_SIZE: usize = 512 * 1024 * 1024;

    /// System bus width in bytes (8 bytes = 64-bit bus).
    pub const BUS_WIDTH: u64 = 8;

    /// System bus access latency in cycles.
    pub const BUS_LATENCY: u64 = 4;

    /// CAS (Column Access Strobe) latency in DRAM cycles.
    pub const T_CAS: u64 = 14;

    /// RAS (Row Access Strobe) latency in DRAM cycles.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in DRAM cycles.
    pub const T_PRE: u64 = 14;

    /// Fixed latency of the simple memory controller in cycles.
    pub const ROW_MISS_LATENCY: u64 = 120;

    /// Default cache line size in bytes (64 bytes).
    pub const CACHE_LINE: usize = 64;

    /// L1 instruction cache: 16 KiB, 2-way, 2 cycles.
    pub const L1_I_SIZE: usize = 16 * 1024;
    pub const L1_I_WAYS: usize = 2;
    pub const L1_I_LATENCY: u64 = 2;

    /// L1 data cache: 64 KiB, 2-way, 2 cycles.
    pub const L1_D_SIZE: usize = 64 * 1024;
    pub const L1_D_WAYS: usize = 2;
    pub const L1_D_LATENCY: u64 = 2;

    /// Unified L2 cache: 256 KiB, 8-way, 20 cycles.
    pub const L2_SIZE: usize = 256 * 1024;
    pub const L2_WAYS: usize = 8;
    pub const L2_LATENCY: u64 = 20;

    /// Default prefetcher pattern table size (64 entries).
    pub const PREFETCH_TABLE_SIZE: usize = 64;

    /// Default prefetch degree (1 line per trigger).
    pub const PREFETCH_DEGREE: usize = 1;

    /// Instructions simulated between two controller polls.
    pub const QUANTUM: u64 = 100_000;

    /// Retired-instruction limit for a single trial.
    pub const INSTRUCTION_BUDGET: u64 = 10_000_000;

    /// Largest test-case code image accepted from the fuzzer.
    pub const MAX_CODE_SIZE: usize = 4096;

    /// Size of the `sandbox` region of the base executable.
    pub const MAX_SANDBOX_SIZE: usize = 8192;

    /// Size of the `registers` region of the base executable.
    pub const MAX_REGISTERS_SIZE: usize = 240;

    /// Largest framed message payload accepted from the fuzzer.
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value parsed correctly but describes an impossible topology.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Memory controller implementation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Simple fixed-latency memory controller.
    Simple,
    /// DRAM controller with row buffer modeling (tCAS/tRAS/tPRE).
    #[default]
    #[serde(alias = "DRAM")]
    Dram,
}

/// Cache replacement policy algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Tree-based pseudo-LRU.
    #[serde(alias = "Plru")]
    Plru,
    /// First In First Out (round-robin).
    #[serde(alias = "Fifo")]
    Fifo,
    /// Seeded pseudo-random victim selection.
    #[serde(alias = "Random")]
    Random,
}

/// Hardware prefetcher types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Prefetcher {
    /// No prefetching.
    #[default]
    None,
    /// Prefetches the next sequential line after each miss.
    NextLine,
    /// Detects constant strides and prefetches ahead of them.
    Stride,
}

/// Root configuration structure containing all session settings.
///
/// # Examples
///
/// ```
/// use rvtrial_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.cache.l1_d.size_bytes, 64 * 1024);
/// assert_eq!(config.cache.l2.ways, 8);
/// ```
///
/// Deserializing a partial document keeps the defaults for everything omitted:
///
/// ```
/// use rvtrial_core::config::{Config, Prefetcher};
///
/// let json = r#"{
///     "general": { "quantum": 5000 },
///     "cache": {
///         "l1_d": { "size_bytes": 32768, "ways": 4, "prefetcher": "Stride" }
///     }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.general.quantum, 5000);
/// assert_eq!(config.cache.l1_d.ways, 4);
/// assert_eq!(config.cache.l1_d.prefetcher, Prefetcher::Stride);
/// assert_eq!(config.cache.l1_i.size_bytes, 16 * 1024);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General simulation settings
    pub general: GeneralConfig,
    /// System memory map and bus parameters
    pub system: SystemConfig,
    /// Main memory configuration
    pub memory: MemoryConfig,
    /// Cache hierarchy configuration
    pub cache: CacheHierarchyConfig,
    /// Trial input limits
    pub trial: TrialConfig,
}

impl Config {
    /// Parses and validates a configuration from a JSON document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text. Omitted sections and fields take their defaults.
    ///
    /// # Returns
    ///
    /// The validated configuration, or a `ConfigError` describing the first problem found.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configured topology can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.quantum == 0 {
            return Err(ConfigError::Invalid("general.quantum must be non-zero".into()));
        }
        if self.memory.ram_size == 0 || self.memory.ram_size % PAGE_SIZE as usize != 0 {
            return Err(ConfigError::Invalid(format!(
                "memory.ram_size ({}) must be a non-zero multiple of {PAGE_SIZE}",
                self.memory.ram_size
            )));
        }
        if self.system.bus_width == 0 {
            return Err(ConfigError::Invalid("system.bus_width must be non-zero".into()));
        }
        for (name, cache) in [
            ("l1_i", &self.cache.l1_i),
            ("l1_d", &self.cache.l1_d),
            ("l2", &self.cache.l2),
        ] {
            cache.validate(name)?;
        }
        Ok(())
    }
}

/// General simulation settings and options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Emit a `trace!` event per retired instruction.
    pub trace_instructions: bool,

    /// Instructions simulated per driver quantum.
    pub quantum: u64,

    /// Retired instructions after which a trial is stopped and reported as a fault.
    pub instruction_budget: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            quantum: defaults::QUANTUM,
            instruction_budget: defaults::INSTRUCTION_BUDGET,
        }
    }
}

/// System memory map and bus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Main RAM base address
    pub ram_base: u64,

    /// System bus width in bytes
    pub bus_width: u64,

    /// System bus latency in cycles
    pub bus_latency: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ram_base: defaults::RAM_BASE,
            bus_width: defaults::BUS_WIDTH,
            bus_latency: defaults::BUS_LATENCY,
        }
    }
}

/// Main memory system configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// RAM size in bytes
    pub ram_size: usize,

    /// Memory controller type
    pub controller: MemoryController,

    /// CAS latency (column access strobe)
    pub t_cas: u64,

    /// RAS latency (row access strobe)
    pub t_ras: u64,

    /// Precharge latency
    pub t_pre: u64,

    /// Fixed access latency used by the simple controller
    pub row_miss_latency: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: defaults::RAM_SIZE,
            controller: MemoryController::default(),
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            row_miss_latency: defaults::ROW_MISS_LATENCY,
        }
    }
}

/// Cache hierarchy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheHierarchyConfig {
    /// L1 instruction cache
    #[serde(default = "CacheHierarchyConfig::default_l1_i")]
    pub l1_i: CacheConfig,
    /// L1 data cache
    #[serde(default = "CacheHierarchyConfig::default_l1_d")]
    pub l1_d: CacheConfig,
    /// Unified L2 cache
    #[serde(default = "CacheHierarchyConfig::default_l2")]
    pub l2: CacheConfig,
}

impl CacheHierarchyConfig {
    fn default_l1_i() -> CacheConfig {
        CacheConfig::sized(defaults::L1_I_SIZE, defaults::L1_I_WAYS, defaults::L1_I_LATENCY)
    }

    fn default_l1_d() -> CacheConfig {
        CacheConfig::sized(defaults::L1_D_SIZE, defaults::L1_D_WAYS, defaults::L1_D_LATENCY)
    }

    fn default_l2() -> CacheConfig {
        CacheConfig::sized(defaults::L2_SIZE, defaults::L2_WAYS, defaults::L2_LATENCY)
    }
}

impl Default for CacheHierarchyConfig {
    fn default() -> Self {
        Self {
            l1_i: Self::default_l1_i(),
            l1_d: Self::default_l1_d(),
            l2: Self::default_l2(),
        }
    }
}

/// Individual cache level configuration.
///
/// Fields omitted from JSON fall back to the L1-D geometry; `enabled` defaults to true.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable this cache level. A disabled level is not attached to the core.
    pub enabled: bool,

    /// Total cache size in bytes
    pub size_bytes: usize,

    /// Cache line size in bytes
    pub line_bytes: usize,

    /// Associativity (number of ways)
    pub ways: usize,

    /// Replacement policy
    pub policy: ReplacementPolicy,

    /// Access latency in cycles
    pub latency: u64,

    /// Hardware prefetcher type
    pub prefetcher: Prefetcher,

    /// Prefetcher table size (for stride prefetcher)
    pub prefetch_table_size: usize,

    /// Prefetch degree (lines to prefetch per trigger)
    pub prefetch_degree: usize,
}

impl CacheConfig {
    /// Builds an enabled LRU cache configuration with the given geometry.
    pub fn sized(size_bytes: usize, ways: usize, latency: u64) -> Self {
        Self {
            enabled: true,
            size_bytes,
            line_bytes: defaults::CACHE_LINE,
            ways,
            policy: ReplacementPolicy::default(),
            latency,
            prefetcher: Prefetcher::default(),
            prefetch_table_size: defaults::PREFETCH_TABLE_SIZE,
            prefetch_degree: defaults::PREFETCH_DEGREE,
        }
    }

    /// Number of sets implied by the geometry (0 when the geometry is degenerate).
    pub fn sets(&self) -> usize {
        let set_bytes = self.line_bytes.saturating_mul(self.ways);
        if set_bytes == 0 { 0 } else { self.size_bytes / set_bytes }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if !self.line_bytes.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "cache.{name}.line_bytes ({}) must be a power of two",
                self.line_bytes
            )));
        }
        if self.ways == 0 {
            return Err(ConfigError::Invalid(format!("cache.{name}.ways must be non-zero")));
        }
        let sets = self.sets();
        if sets == 0 || sets * self.line_bytes * self.ways != self.size_bytes {
            return Err(ConfigError::Invalid(format!(
                "cache.{name}.size_bytes ({}) must be a non-zero multiple of line_bytes * ways",
                self.size_bytes
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheHierarchyConfig::default_l1_d()
    }
}

/// Limits applied to the trial inputs received from the fuzzer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Largest accepted test-case code image in bytes
    pub max_code_size: usize,

    /// Size of the `sandbox` region zeroed before each trial
    pub max_sandbox_size: usize,

    /// Size of the `registers` region zeroed before each trial
    pub max_registers_size: usize,

    /// Largest accepted framed message payload in bytes
    pub max_message_size: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            max_code_size: defaults::MAX_CODE_SIZE,
            max_sandbox_size: defaults::MAX_SANDBOX_SIZE,
            max_registers_size: defaults::MAX_REGISTERS_SIZE,
            max_message_size: defaults::MAX_MESSAGE_SIZE,
        }
    }
}
