/// Console log formatting and level filtering
///
/// Output format is a fixed-width prefix followed by the message:
/// `HH:MM:SS [TAG     ] [LEVEL] message`
use chrono::Local;
use colored::*;
use once_cell::sync::OnceCell;
use std::env;

use super::levels::LogLevel;
use super::tags::LogTag;

/// Fixed tag column width for aligned output
const TAG_WIDTH: usize = 8;
/// Fixed level column width for aligned output
const LEVEL_WIDTH: usize = 5;

/// Maximum level that is printed; set once at startup from LOG_LEVEL
static MAX_LEVEL: OnceCell<LogLevel> = OnceCell::new();

/// Read LOG_LEVEL from the environment and freeze the filter
pub fn init_from_env() {
    let level = env::var("LOG_LEVEL")
        .map(|v| LogLevel::from_str(&v))
        .unwrap_or(LogLevel::Debug);
    let _ = MAX_LEVEL.set(level);
}

fn max_level() -> LogLevel {
    *MAX_LEVEL.get().unwrap_or(&LogLevel::Debug)
}

/// Write one formatted log line to the console
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if level > max_level() {
        return;
    }

    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format!("{:<width$}", tag.label(), width = TAG_WIDTH);
    let tag_str = match tag {
        LogTag::System => tag_str.bright_yellow().bold(),
        LogTag::Config => tag_str.yellow().bold(),
        LogTag::Database => tag_str.bright_magenta().bold(),
        LogTag::Webserver => tag_str.bright_cyan().bold(),
        LogTag::Websocket => tag_str.bright_blue().bold(),
        LogTag::Alerts => tag_str.bright_red().bold(),
        LogTag::Hydrants => tag_str.bright_green().bold(),
        LogTag::Weather => tag_str.cyan().bold(),
        LogTag::Logs => tag_str.white().bold(),
        LogTag::Auth => tag_str.magenta().bold(),
        LogTag::Notify => tag_str.green().bold(),
    };

    let level_str = format!("{:<width$}", level.label(), width = LEVEL_WIDTH);
    let level_str = match level {
        LogLevel::Error => level_str.bright_red().bold(),
        LogLevel::Warning => level_str.bright_yellow().bold(),
        LogLevel::Info => level_str.bright_blue().bold(),
        LogLevel::Debug => level_str.bright_black().bold(),
    };

    println!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        level_str,
        message.bright_white()
    );
}
