use parking_lot::Mutex;
/// Debug log file and `log` facade bridge for tabshell
///
/// Two sources write to the same file:
/// - the `debug_*!` category macros, controlled by the DEBUG_LEVEL
///   environment variable (0 or unset: off, 1: errors, 2: info, 3: debug,
///   4: trace)
/// - every `log::info!()` etc. from this crate and the sub-crates, once
///   [`init_log_bridge`] has installed the bridge
///
/// Output goes to `tabshell_debug.log` in the system temp directory so the
/// summary printed on stdout stays readable. When `RUST_LOG` is set, bridged
/// records are mirrored to stderr as well.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tabshell_config::LogLevel;

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_value(value: &str) -> Self {
        match value.trim().parse::<u8>() {
            Ok(1) => DebugLevel::Error,
            Ok(2) => DebugLevel::Info,
            Ok(3) => DebugLevel::Debug,
            Ok(4) => DebugLevel::Trace,
            _ => DebugLevel::Off,
        }
    }

    fn from_env() -> Self {
        std::env::var("DEBUG_LEVEL")
            .map(|val| Self::from_value(&val))
            .unwrap_or(DebugLevel::Off)
    }
}

/// Path of the debug log file.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("tabshell_debug.log")
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
    open_attempted: bool,
}

impl DebugLogger {
    fn new() -> Self {
        let mut logger = DebugLogger {
            level: DebugLevel::from_env(),
            file: None,
            open_attempted: false,
        };
        if logger.level != DebugLevel::Off {
            logger.ensure_file();
        }
        logger
    }

    /// Open (and truncate) the log file the first time something is written.
    fn ensure_file(&mut self) {
        if self.open_attempted {
            return;
        }
        self.open_attempted = true;

        // A log file that cannot be opened is not worth failing over.
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            self.file = Some(f);
            let header = format!(
                "\n{}\ntabshell debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                self.level,
                "=".repeat(80)
            );
            self.write_raw(&header);
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            let level_str = match level {
                DebugLevel::Error => "ERROR",
                DebugLevel::Info => "INFO ",
                DebugLevel::Debug => "DEBUG",
                DebugLevel::Trace => "TRACE",
                DebugLevel::Off => return,
            };
            self.write_raw(&format!(
                "[{}] [{}] [{}] {}\n",
                get_timestamp(),
                level_str,
                category,
                msg
            ));
        }
    }

    fn write_bridged(&mut self, line: &str) {
        self.ensure_file();
        self.write_raw(line);
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

// ── log facade bridge ───────────────────────────────────────────────────────

/// Set once the level came from `--log-level` or `RUST_LOG`; the config file
/// may not lower or raise it afterwards.
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);
static MIRROR_TO_STDERR: AtomicBool = AtomicBool::new(false);
static BRIDGE: LogBridge = LogBridge;

struct LogBridge;

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            get_timestamp(),
            record.level(),
            record.target(),
            record.args()
        );
        if MIRROR_TO_STDERR.load(Ordering::Relaxed) {
            eprint!("{}", line);
        }
        get_logger().lock().write_bridged(&line);
    }

    fn flush(&self) {}
}

/// Pick the bridge level. Returns the level and whether it is pinned
/// against later config changes.
///
/// Precedence: CLI flag, then `RUST_LOG` (a bare level name), then the
/// default until the config file is read.
pub fn resolve_level(
    cli: Option<log::LevelFilter>,
    rust_log: Option<&str>,
) -> (log::LevelFilter, bool) {
    if let Some(level) = cli {
        return (level, true);
    }
    if let Some(level) = rust_log.and_then(LogLevel::from_name) {
        return (level.to_level_filter(), true);
    }
    (LogLevel::default().to_level_filter(), false)
}

/// Route all `log` records into the debug log file.
///
/// Safe to call more than once; only the first call installs the bridge.
pub fn init_log_bridge(cli_level: Option<log::LevelFilter>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let (level, pinned) = resolve_level(cli_level, rust_log.as_deref());

    MIRROR_TO_STDERR.store(rust_log.is_some(), Ordering::Relaxed);
    LEVEL_PINNED.store(pinned, Ordering::Relaxed);

    if log::set_logger(&BRIDGE).is_ok() {
        log::set_max_level(level);
    }
}

/// Apply the config file's level unless the CLI or `RUST_LOG` chose one.
pub fn set_log_level(level: log::LevelFilter) {
    if LEVEL_PINNED.load(Ordering::Relaxed) {
        return;
    }
    log::set_max_level(level);
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_level_parsing() {
        assert_eq!(DebugLevel::from_value("0"), DebugLevel::Off);
        assert_eq!(DebugLevel::from_value(" 3 "), DebugLevel::Debug);
        assert_eq!(DebugLevel::from_value("4"), DebugLevel::Trace);
        assert_eq!(DebugLevel::from_value("loud"), DebugLevel::Off);
    }

    #[test]
    fn test_cli_level_wins_over_rust_log() {
        let (level, pinned) = resolve_level(Some(log::LevelFilter::Warn), Some("trace"));
        assert_eq!(level, log::LevelFilter::Warn);
        assert!(pinned);
    }

    #[test]
    fn test_rust_log_pins_level() {
        let (level, pinned) = resolve_level(None, Some("debug"));
        assert_eq!(level, log::LevelFilter::Debug);
        assert!(pinned);
    }

    #[test]
    fn test_unparseable_rust_log_falls_back_to_default() {
        let (level, pinned) = resolve_level(None, Some("tabshell=debug"));
        assert_eq!(level, log::LevelFilter::Info);
        assert!(!pinned);
    }
}
