//! Logging setup shared by the library crates and the `map-merge` binary.
//!
//! Records from `map_merge*` targets are shown at the requested level;
//! records from dependencies only from `Warn` up, so `-vv` stays readable.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, util::SubscriberInitExt, EnvFilter};

const CRATE_PREFIX: &str = "map_merge";
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::Warn;

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn threshold(&self, target: &str) -> LevelFilter {
        if target.starts_with(CRATE_PREFIX) {
            self.level
        } else {
            DEPENDENCY_LEVEL.min(self.level)
        }
    }
}

fn short_target(target: &str) -> &str {
    target
        .strip_prefix("map_merge_core::")
        .or_else(|| target.strip_prefix("map_merge::"))
        .unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.threshold(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let _ = writeln!(
            std::io::stderr().lock(),
            "{:>8.3}s {tag} {}: {}",
            self.started.elapsed().as_secs_f64(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Only the first call has an effect.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` overrides the default
/// `map_merge=info,map_merge_core=info,warn` filter.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("map_merge=info,map_merge_core=info,warn"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
