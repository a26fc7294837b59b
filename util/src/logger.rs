//! Logger setup for executables
//!
//! Records go to two outputs: stdout, coloured and filtered at the level asked
//! for, and the session log file, uncoloured and always kept at `DEBUG` or
//! finer so that a run can be inspected after the fact.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{self, info, Level, Record};
use std::fmt;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Crates whose records are capped at `WARN` whatever the requested level.
const QUIET_TARGETS: &[&str] = &["clarabel"];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Could not open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger has already been set: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `min_level` applies to stdout and must be `INFO` or finer. Only one logger
/// can be set per process, a second call returns
/// [`LoggerInitError::FernInitError`].
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let file_level = min_level.max(LevelFilter::Debug);

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let stdout = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, true))
        .level(min_level)
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| format_record(out, message, record, false))
        .level(file_level)
        .chain(log_file);

    let mut dispatch = fern::Dispatch::new().level(file_level);
    for target in QUIET_TARGETS {
        dispatch = dispatch.level_for(*target, LevelFilter::Warn);
    }

    dispatch
        .chain(stdout)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?} (file {:?})", min_level, file_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

/// Parse a log level name (`info`, `debug`, `trace`, ...) into a filter.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.parse().ok()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Format a record as `[elapsed LVL] message`, adding the target for debug
/// and trace records.
fn format_record(
    out: fern::FormatCallback,
    message: &fmt::Arguments,
    record: &Record,
    coloured: bool,
) {
    let tag = level_tag(record.level(), coloured);

    if record.level() > Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            session::get_elapsed_seconds(),
            tag,
            record.target(),
            message
        ))
    } else {
        out.finish(format_args!(
            "[{:10.6} {}] {}",
            session::get_elapsed_seconds(),
            tag,
            message
        ))
    }
}

/// Three letter tag for a level, styled for a terminal if `coloured`.
fn level_tag(level: Level, coloured: bool) -> ColoredString {
    let tag = match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info => "INF",
        Level::Warn => "WRN",
        Level::Error => "ERR",
    };

    if !coloured {
        return tag.normal();
    }

    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info => tag.normal(),
        Level::Warn => tag.yellow(),
        Level::Error => tag.red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level("TRACE"), Some(LevelFilter::Trace));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_plain_level_tag() {
        assert_eq!(level_tag(Level::Warn, false).to_string(), "WRN");
        assert_eq!(level_tag(Level::Trace, false).to_string(), "TRC");
    }
}
