//! CLI configuration file
//!
//! An optional JSON file with the same shape as the run settings; command-line
//! flags are applied on top of it.

use std::path::{Path, PathBuf};

use nebula_config::{LogConfig, LogLevel, Phase, VmConfig};
use serde::Deserialize;
use tracing::Level;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub vm: VmConfig,
    pub log: LogConfig,
    /// Relative paths resolve against the config file's directory
    pub debug_symbols: Vec<PathBuf>,
}

impl CliConfig {
    pub fn read(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let mut config: CliConfig = serde_json::from_str(&content)
            .map_err(|e| format!("cannot parse '{}': {}", path.display(), e))?;

        let base_dir = path.parent().unwrap_or(Path::new("."));
        for symbols in &mut config.debug_symbols {
            if symbols.is_relative() {
                *symbols = base_dir.join(&*symbols);
            }
        }
        Ok(config)
    }
}

pub fn to_tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Effective tracing level for one phase target
pub fn level_for(log: &LogConfig, phase: Phase) -> Level {
    to_tracing_level(log.level_for(phase))
}
