//! Nebula Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Nebula crates.

use serde::{Deserialize, Serialize};

/// Configuration for the interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Round-robin budget per logical thread, in milliseconds
    pub time_slice_ms: u64,
    /// Whether `Interpreter::init` leaves the VM paused
    pub start_paused: bool,
    /// Initial capacity reserved for every frame's operand stack
    pub initial_stack_capacity: usize,
    /// Garbage collector settings
    pub gc: GcConfig,
}

/// Configuration for the mark-sweep collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Lower bound of the adaptive collection threshold (tracked objects)
    pub min_threshold: usize,
    /// When false, only forced collections run
    pub enabled: bool,
}

/// Verbosity, ordered from most to least verbose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Case-insensitive
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log levels: one global default plus optional per-phase overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub global: LogLevel,
    pub loader: Option<LogLevel>,
    pub vm: Option<LogLevel>,
    pub sched: Option<LogLevel>,
    pub gc: Option<LogLevel>,
}

impl LogConfig {
    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let overridden = match phase {
            Phase::Loader => self.loader,
            Phase::Vm => self.vm,
            Phase::Sched => self.sched,
            Phase::Gc => self.gc,
        };
        overridden.unwrap_or(self.global)
    }
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Loader,
    Vm,
    Sched,
    Gc,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 4] = [Phase::Loader, Phase::Vm, Phase::Sched, Phase::Gc];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Loader => "loader",
            Phase::Vm => "vm",
            Phase::Sched => "sched",
            Phase::Gc => "gc",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> &'static str {
        match self {
            Phase::Loader => "nebula::loader",
            Phase::Vm => "nebula::vm",
            Phase::Sched => "nebula::sched",
            Phase::Gc => "nebula::gc",
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            time_slice_ms: 10,
            start_paused: false,
            initial_stack_capacity: 16,
            gc: GcConfig::default(),
        }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            min_threshold: 128,
            enabled: true,
        }
    }
}
