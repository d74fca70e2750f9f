//! Process-wide rolling file logs.
//!
//! # Invariants
//! - The logger starts at most once per process; repeating the same settings
//!   is a no-op and asking for different ones is an error.
//! - Log lines carry ids, counts and statuses only. Passwords, password
//!   hashes and bearer tokens never reach a log call.

use crate::config::CoreConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const LOG_FILE_BASENAME: &str = "inkwell";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_MESSAGE_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: LevelFilter,
    dir: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log level `{0}`")]
    InvalidLevel(String),
    #[error("cannot use log directory `{}`: {source}", .path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start logger: {0}")]
    Start(#[from] FlexiLoggerError),
    #[error("logging already active with level {level} in `{}`", .dir.display())]
    AlreadyActive { level: LevelFilter, dir: PathBuf },
}

/// Starts file logging with the level and directory from `config`. A relative
/// directory resolves against the working directory.
pub fn init_logging_from(config: &CoreConfig) -> Result<(), LoggingError> {
    init_logging(&config.log_level, &config.log_dir)
}

/// Starts file logging at `level` into `dir`.
pub fn init_logging(level: &str, dir: &Path) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = std::path::absolute(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let active = ACTIVE.get_or_try_init(|| start(level, &dir))?;
    if active.level != level || active.dir != dir {
        return Err(LoggingError::AlreadyActive {
            level: active.level,
            dir: active.dir.clone(),
        });
    }
    Ok(())
}

/// Level and directory of the running logger, if any.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    ACTIVE.get().map(|active| (active.level, active.dir.clone()))
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match LevelFilter::from_str(level.trim()) {
        Ok(LevelFilter::Off) | Err(_) => Err(LoggingError::InvalidLevel(level.trim().to_string())),
        Ok(filter) => Ok(filter),
    }
}

fn start(level: LevelFilter, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::try_with_str(level.as_str().to_ascii_lowercase())?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_default();
        error!(
            "event=panic module=logging status=error location={location} message={}",
            flatten_panic_message(panic_info.payload(), PANIC_MESSAGE_LIMIT)
        );
        previous_hook(panic_info);
    }));

    info!(
        "event=logging_start module=logging status=ok version={} level={level} dir={}",
        env!("CARGO_PKG_VERSION"),
        dir.display()
    );
    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

/// One-line, length-capped rendering of a panic payload.
fn flatten_panic_message(payload: &(dyn std::any::Any + Send), limit: usize) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");
    let mut flat: String = message
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(limit)
        .collect();
    if message.chars().count() > limit {
        flat.push_str("...");
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::{flatten_panic_message, init_logging, logging_status, parse_level, LoggingError};
    use log::LevelFilter;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level(" INFO ").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::Warn);
        assert!(matches!(
            parse_level("off").unwrap_err(),
            LoggingError::InvalidLevel(_)
        ));
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn panic_message_is_single_line_and_capped() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("line1\nline2\rline3"));
        let flat = flatten_panic_message(payload.as_ref(), 8);
        assert_eq!(flat, "line1 li...");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(flatten_panic_message(payload.as_ref(), 80), "non-string payload");
    }

    #[test]
    fn second_init_must_repeat_the_same_settings() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        init_logging("info", first.path()).unwrap();
        init_logging("info", first.path()).unwrap();
        assert!(matches!(
            init_logging("debug", first.path()).unwrap_err(),
            LoggingError::AlreadyActive { .. }
        ));
        assert!(matches!(
            init_logging("info", second.path()).unwrap_err(),
            LoggingError::AlreadyActive { .. }
        ));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, LevelFilter::Info);
        assert_eq!(dir, first.path());
    }
}
