//! API layer configuration
//!
//! `RunConfig` plus a global singleton for CLI convenience

use std::path::PathBuf;

use nebula_config::{LogConfig, VmConfig};
use once_cell::sync::OnceCell;

/// Execution configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Interpreter settings (time slice, GC, start paused)
    pub vm: VmConfig,
    /// Capture script output into `ExecuteOutput::stdout` instead of the console
    pub capture_stdout: bool,
    /// `.ndbg` files used to resolve source lines in error reports
    pub debug_symbols: Vec<PathBuf>,
    /// Log levels; applied by whoever installs the subscriber
    pub log: LogConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vm: VmConfig::default(),
            capture_stdout: false,
            debug_symbols: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl RunConfig {
    /// Config that captures output, the common case for embedding and tests
    pub fn captured() -> Self {
        Self {
            capture_stdout: true,
            ..Self::default()
        }
    }
}

static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize the global configuration; returns `false` if it was already set
pub fn init(config: RunConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// Global config, or the defaults when `init` was never called
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
