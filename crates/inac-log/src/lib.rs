//! Levelled logging for the `inac` runtime-support crates.
//!
//! The logger is a process-wide singleton with an atomic level filter. Log
//! lines go to stderr so that a library embedding `inac-mem` never writes to
//! the host program's stdout. Each line carries the module path of the call
//! site, which is enough to tell arena, string and list events apart.
//!
//! # Example
//!
//! ```
//! use inac_log::{debug, info, trace, Level};
//!
//! inac_log::set_level(Level::Debug);
//!
//! let chunks = 3;
//! info!("arena ready with {} chunks", chunks);
//! debug!("spill sizes: {:?}", [1024, 2048]);
//! trace!("not shown at debug level");
//! ```
//!
//! # Configuration
//!
//! The level can be set programmatically with [`set_level`] or
//! [`set_level_from_str`], or taken from the `INAC_LOG` environment variable
//! with [`init_from_env`].

use std::fmt::Arguments;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "INAC_LOG";

/// Severity of a log message.
///
/// Lower numeric values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Failures the caller is about to see as an error or abort.
    Error = 0,
    /// Recoverable oddities (e.g. a shared object that was already gone).
    Warn = 1,
    /// Coarse lifecycle events.
    Info = 2,
    /// Chunk creation, spills, shrink results.
    Debug = 3,
    /// Per-operation detail such as shared-memory reference counts.
    Trace = 4,
}

impl Level {
    const fn color_code(&self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }

    /// Returns the upper-case name of this level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Parses a level name, ignoring case.
    ///
    /// ```
    /// use inac_log::Level;
    ///
    /// assert_eq!(Level::from_str("trace"), Ok(Level::Trace));
    /// assert_eq!(Level::from_str("Warn"), Ok(Level::Warn));
    /// assert!(Level::from_str("loud").is_err());
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// The process-wide logger.
///
/// Obtain it with [`get_logger`]; it is never constructed directly.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the most verbose level that will still be emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current level filter.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns `true` if a message at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, creating it at [`Level::Warn`] on first use.
///
/// The default is quiet on purpose: allocator internals only speak up when a
/// caller asks for it.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the level of the global logger from a level name.
///
/// ```
/// inac_log::set_level_from_str("debug").unwrap();
/// assert_eq!(inac_log::get_logger().level(), inac_log::Level::Debug);
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), String> {
    let level = Level::from_str(s)?;
    set_level(level);
    Ok(())
}

/// Applies the level named by the `INAC_LOG` environment variable.
///
/// Returns `Ok(None)` when the variable is unset, `Ok(Some(level))` when it
/// was applied, and the parse error when it names no level. On error the
/// current level is left untouched.
pub fn init_from_env() -> Result<Option<Level>, String> {
    match std::env::var(ENV_VAR) {
        Ok(value) => {
            let level = Level::from_str(&value)?;
            set_level(level);
            Ok(Some(level))
        }
        Err(_) => Ok(None),
    }
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    static RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let color = level.color_code();
    let level_str = level.as_str();

    eprintln!("{color}[{level_str}]{RESET} {target}: {args}");
}

/// Logs a message at an explicit level, tagged with the caller's module path.
///
/// ```
/// use inac_log::{log, Level};
///
/// log!(level: Level::Info, "reset {} chunks", 4);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}
