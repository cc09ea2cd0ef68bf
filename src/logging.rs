use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Appends `[LEVEL] message` lines to the session log and echoes warnings to stderr.
pub struct FileLogger {
    path: PathBuf,
    level: LevelFilter,
    lock: Mutex<()>,
}

impl FileLogger {
    pub fn new(path: &Path, level: LevelFilter) -> Self {
        Self {
            path: path.to_path_buf(),
            level,
            lock: Mutex::new(()),
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        if record.level() <= Level::Warn {
            eprintln!("[{}] {message}", log_level_label(record.level()));
        }
        let _guard = self.lock.lock().ok();
        let _ = append_log_file(&self.path, record.level(), &message);
    }

    fn flush(&self) {}
}

pub fn init(path: &Path, level: &str) -> Result<()> {
    let level = parse_level(level);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create log dir")?;
    }
    log::set_boxed_logger(Box::new(FileLogger::new(path, level)))
        .map_err(|err| anyhow::anyhow!("install logger: {err}"))?;
    log::set_max_level(level);
    Ok(())
}

pub fn parse_level(value: &str) -> LevelFilter {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "quiet" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" | "verbose" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn log_level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn timestamp() -> String {
    let format = time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    time::OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_default()
}

fn append_log_file(path: &Path, level: Level, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{} [{label}] {message}", timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_with_info_fallback() {
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("verbose"), LevelFilter::Debug);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn records_are_appended_with_level_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.log");
        let logger = FileLogger::new(&path, LevelFilter::Info);
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .args(format_args!("saved slot 1"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .args(format_args!("hidden"))
                .build(),
        );
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("[INFO] saved slot 1"));
        assert!(!raw.contains("hidden"));
    }
}
