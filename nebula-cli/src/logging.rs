//! CLI logging setup
//!
//! `tracing-subscriber` registry with one `Targets` filter per phase.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use nebula_config::{LogConfig, Phase};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

use crate::config::{level_for, to_tracing_level};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable, multi-line
    Pretty,
    #[default]
    Compact,
    /// One JSON object per event, for tools
    Json,
}

pub fn targets(log: &LogConfig) -> Targets {
    Phase::ALL.iter().fold(
        Targets::new()
            .with_default(to_tracing_level(log.global))
            .with_target("nebula::cli", to_tracing_level(log.global)),
        |targets, phase| targets.with_target(phase.target(), level_for(log, *phase)),
    )
}

/// Install the global subscriber: stderr, plus `file` when given.
/// Script output owns stdout, so logs never go there.
pub fn init_with_file(log: &LogConfig, format: LogFormat, file: Option<&Path>) -> io::Result<()> {
    let targets = targets(log);
    let mut layers: Vec<BoxedLayer> =
        vec![format_layer(format, io::stderr, true).with_filter(targets.clone()).boxed()];

    if let Some(path) = file {
        let handle = OpenOptions::new().create(true).append(true).open(path)?;
        layers.push(
            format_layer(format, Mutex::new(handle), false)
                .with_filter(targets)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(io::Error::other)
}

fn format_layer<W>(format: LogFormat, make_writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_ansi(ansi)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(ansi)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

/// Subscriber for unit tests; output is captured per test
#[cfg(test)]
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_config::LogLevel;
    use tracing::Level;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_targets_apply_phase_overrides() {
        let log = LogConfig {
            global: LogLevel::Warn,
            gc: Some(LogLevel::Trace),
            ..LogConfig::default()
        };
        let targets = targets(&log);
        assert!(targets.would_enable("nebula::gc", &Level::TRACE));
        assert!(!targets.would_enable("nebula::vm", &Level::INFO));
        assert!(targets.would_enable("nebula::vm", &Level::WARN));
        assert!(!targets.would_enable("other_crate", &Level::INFO));
        assert_eq!(targets.default_level(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_test_logger_can_be_installed_twice() {
        init_test_logger();
        init_test_logger();
        tracing::info!(target: "nebula::cli", "logger ready");
    }
}
