use core::{
    fmt::{self, Arguments, Display, Write as _},
    sync::atomic::{AtomicU8, Ordering},
};
use std::{
    io::{self, Write},
    time::{SystemTime, UNIX_EPOCH},
};

use once_cell::sync::OnceCell;
use parking_lot::{const_mutex, Mutex};
use tessera_common_macros::EnumFromName;

static LOGGER: OnceCell<&'static Logger> = OnceCell::new();
static DEFAULT_LOGGER: Logger = Logger::new();

/// Install the global logger.
/// 
/// Returns `false` if a logger was already installed, in which case the old logger stays active.
pub fn set_logger(logger: &'static Logger) -> bool {
    LOGGER.set(logger).is_ok()
}

/// Get the global logger, or the built-in console logger when none was installed.
pub fn get_logger() -> &'static Logger {
    LOGGER.get().copied().unwrap_or(&DEFAULT_LOGGER)
}

/// Logging level
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, EnumFromName)]
pub enum LogLevel {
    /// Severe error: will probably result in a crash
    Severe,
    /// Error: may not result in a crash
    Error,
    /// Warning: While not as bad as an error, it may result to something like a performance regression
    Warning,
    /// General info
    Info,
    /// Verbose info
    Verbose,
    /// Debug info (includes verbose info)
    Debug,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Severe  => f.write_str("\x1B[1m\x1B[41m\x1B[30m[SEVERE ]\x1B[0m"),
            LogLevel::Error   => f.write_str(               "\x1B[91m[ERROR  ]\x1B[0m"),
            LogLevel::Warning => f.write_str(               "\x1B[93m[WARNING]\x1B[0m"),
            LogLevel::Info    => f.write_str(               "\x1B[37m[INFO   ]\x1B[0m"),
            LogLevel::Verbose => f.write_str(               "\x1B[90m[VERBOSE]\x1B[0m"),
            LogLevel::Debug   => f.write_str(               "\x1B[94m[DEBUG  ]\x1B[0m"),
        }
    }
}

/// Log category
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LogCategory {
    category:     &'static str,
    sub_category: Option<&'static str>,
}

impl LogCategory {
    pub const fn new(name: &'static str) -> Self {
        Self { category: name, sub_category: None }
    }

    pub const fn new_with_sub(name: &'static str, sub_name: &'static str) -> Self {
        Self { category: name, sub_category: Some(sub_name) }
    }
}

impl Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_category {
            Some(sub) => write!(f, "{}({sub})", self.category),
            None => f.write_str(self.category),
        }
    }
}

/// Wall-clock time at which a message was logged, in milliseconds since the unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TimeStamp(u64);

impl TimeStamp {
    pub fn now() -> Self {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |dur| dur.as_millis() as u64);
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0 % 1000;
        let secs = self.0 / 1000;
        write!(f, "{:02}:{:02}:{:02}.{millis:03}", (secs / 3600) % 24, (secs / 60) % 60, secs % 60)
    }
}

/// Additional info about where the log occured
pub struct LogLocation {
    file: &'static str,
    line: u32,
    func: &'static str,
    time: TimeStamp,
}

impl LogLocation {
    pub const fn new(file: &'static str, line: u32, func: &'static str, time: TimeStamp) -> Self {
        Self { file, line, func, time }
    }

    /// Get the file name where the log occured
    pub const fn file(&self) -> &str {
        self.file
    }

    /// Get the line where the log occurred
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Get the function where the log occurred
    pub const fn function(&self) -> &str {
        self.func
    }

    /// Get the timestamp when the log occurred
    pub const fn timestamp(&self) -> TimeStamp {
        self.time
    }
}

/// Only errors and debug messages get their source location printed.
struct LocationFormatter<'a> {
    loc:   &'a LogLocation,
    level: LogLevel,
}

impl Display for LocationFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            LogLevel::Severe | LogLevel::Error | LogLevel::Debug => 
                write!(f, " ({}:{}: {})", self.loc.file(), self.loc.line(), self.loc.function()),
            _ => Ok(()),
        }
    }
}

pub fn get_func_name<F>(_: F) -> &'static str {
    core::any::type_name::<F>()
}

#[macro_export]
macro_rules! log_location {
    () => {
        $crate::LogLocation::new(file!(), line!(), "", $crate::TimeStamp::now())
    };
    ($func:expr) => {
        $crate::LogLocation::new(file!(), line!(), $crate::get_func_name($func), $crate::TimeStamp::now())
    };
}

const MAX_WRITERS: usize = 8;
const CACHE_FLUSH_LIMIT: usize = 4 * 1024;

type BoxedWriter = Box<dyn Write + Send>;

struct LoggerState {
    writers:        [Option<BoxedWriter>; MAX_WRITERS],
    cache:          String,
    always_flush:   bool,
    log_to_console: bool,
}

impl LoggerState {
    const fn new() -> Self {
        const NO_WRITER: Option<BoxedWriter> = None;
        Self {
            writers: [NO_WRITER; MAX_WRITERS],
            cache: String::new(),
            always_flush: false,
            log_to_console: true,
        }
    }

    fn format_message(&mut self, args: Arguments) {
        _ = self.cache.write_fmt(args);
        if self.always_flush || self.cache.len() > CACHE_FLUSH_LIMIT {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.cache.is_empty() {
            return;
        }

        if self.log_to_console {
            let mut stdout = io::stdout().lock();
            _ = stdout.write_all(self.cache.as_bytes());
            _ = stdout.flush();
        }

        for writer in self.writers.iter_mut().flatten() {
            _ = writer.write_all(self.cache.as_bytes());
            _ = writer.flush();
        }
        self.cache.clear();
    }
}

/// Logger
/// 
/// Supports up to 8 writers, e.g. a file, an in-game console or an external tool, next to the console
pub struct Logger {
    state:         Mutex<LoggerState>,
    max_log_level: AtomicU8,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            state: const_mutex(LoggerState::new()),
            max_log_level: AtomicU8::new(LogLevel::Debug as u8),
        }
    }

    /// Set the maximum log level (severe == lowest, debug == highest)
    pub fn set_max_level(&self, level: LogLevel) {
        self.max_log_level.store(level as u8, Ordering::Relaxed)
    }

    /// Check if messages at the given level will be logged
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.max_log_level.load(Ordering::Relaxed)
    }

    /// Set whether the logger should flush after each write
    pub fn set_always_flush(&self, always_flush: bool) {
        self.state.lock().always_flush = always_flush;
    }

    /// Set whether the logger should log it's output to console
    pub fn set_log_to_console(&self, log_to_console: bool) {
        let mut state = self.state.lock();

        // Messages logged before this call still go to where they were meant to go
        state.flush();
        state.log_to_console = log_to_console;
    }

    /// Add a writer. 
    /// 
    /// Returns `Ok(index)` if space was available. This index can be used to remove the writer later on.
    /// 
    /// Otherwise returns an `Err` with the provided writer
    pub fn add_writer(&self, writer: BoxedWriter) -> Result<usize, BoxedWriter> {
        let mut state = self.state.lock();
        match state.writers.iter_mut().enumerate().find(|(_, slot)| slot.is_none()) {
            Some((idx, slot)) => {
                *slot = Some(writer);
                Ok(idx)
            },
            None => Err(writer),
        }
    }

    /// Remove a writer from the logger, pending messages are written to it first
    pub fn remove_writer(&self, index: usize) -> Option<BoxedWriter> {
        let mut state = self.state.lock();
        state.flush();
        state.writers.get_mut(index).and_then(Option::take)
    }

    pub fn log_fmt(&self, category: LogCategory, level: LogLevel, loc: LogLocation, args: Arguments) {
        if !self.is_enabled(level) {
            return;
        }

        let location = LocationFormatter { loc: &loc, level };
        let timestamp = loc.timestamp();
        self.state.lock().format_message(format_args!("\x1B[38m{timestamp}\x1B[0m {level} [{category}]{location}: {args}\n"));
    }

    pub fn flush(&self) {
        self.state.lock().flush()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.flush();
    }
}

#[macro_export]
macro_rules! log {
    ($category:expr, $level:expr, $func:expr, $($fmt:tt)+) => {
        $crate::get_logger().log_fmt($category, $level, $crate::log_location!($func), format_args!($($fmt)+))
    };
}

#[macro_export]
macro_rules! log_severe {
    ($category:expr, $func:expr, $($fmt:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Severe, $func, $($fmt)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $func:expr, $($fmt:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Error, $func, $($fmt)+)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $($fmt:tt)+) => {
        $crate::get_logger().log_fmt($category, $crate::LogLevel::Warning, $crate::log_location!(), format_args!($($fmt)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $($fmt:tt)+) => {
        $crate::get_logger().log_fmt($category, $crate::LogLevel::Info, $crate::log_location!(), format_args!($($fmt)+))
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($category:expr, $($fmt:tt)+) => {
        $crate::get_logger().log_fmt($category, $crate::LogLevel::Verbose, $crate::log_location!(), format_args!($($fmt)+))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $func:expr, $($fmt:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Debug, $func, $($fmt)+)
    };
}
