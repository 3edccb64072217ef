//! Structured logging system for alerthub
//!
//! Provides a clean, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug)
//! - Level filtering from the LOG_LEVEL environment knob
//! - Colored, fixed-width console output
//! - A mutex-guarded request audit file used by the HTTP log pipeline
//!
//! ## Usage
//!
//! ```rust
//! use alerthub::logger::{self, LogTag};
//!
//! logger::error(LogTag::Database, "Connection failed");
//! logger::warning(LogTag::Weather, "Upstream returned non-OK status");
//! logger::info(LogTag::System, "Server started");
//! logger::debug(LogTag::Websocket, "Frame details: ..."); // Only at LOG_LEVEL=debug
//! ```
//!
//! ## Initialization
//!
//! Call once at startup (in main.rs), before any logging occurs:
//! ```rust
//! alerthub::logger::init();
//! ```

mod core;
mod file;
mod levels;
mod tags;

pub use file::{append_request_log, flush_file_logging};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// This must be called once at application startup, before any logging
/// occurs. It reads LOG_LEVEL from the environment and opens the request
/// audit log file.
pub fn init() {
    core::init_from_env();
    file::init_file_logging();
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues that are not critical)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics, only at LOG_LEVEL=debug)
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Force flush all pending audit log writes
///
/// Call this during shutdown to ensure all entries are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
