/// Configuration loading and access helpers
///
/// All configuration comes from environment variables with embedded
/// defaults. The loaded configuration lives in a global read-write slot
/// so every subsystem shares one source of truth:
/// - `load_config()` reads the environment once at startup
/// - `with_config(|cfg| ...)` is the thread-safe accessor
use once_cell::sync::OnceCell;
use std::env;
use std::sync::RwLock;
use std::time::Duration;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub weather: WeatherConfig,
    pub notification: NotificationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Authentication configuration
///
/// An empty API password disables authentication entirely.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_password: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub request_logging: bool,
}

/// Weather poller configuration
///
/// The station coordinates are fixed per deployment; an empty API key
/// leaves the poller idle.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: String,
    pub station_lat: f64,
    pub station_lon: f64,
}

/// Notification configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub email: EmailConfig,
}

/// Email notification configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub min_level: String,
}

impl Config {
    /// Build a configuration snapshot from the current environment
    pub fn from_env() -> Config {
        Config {
            server: ServerConfig {
                port: get_int_env("SERVER_PORT", 8080) as u16,
                read_timeout: get_duration_env("SERVER_READ_TIMEOUT", Duration::from_secs(15)),
                write_timeout: get_duration_env("SERVER_WRITE_TIMEOUT", Duration::from_secs(15)),
                idle_timeout: get_duration_env("SERVER_IDLE_TIMEOUT", Duration::from_secs(60)),
                shutdown_timeout: get_duration_env(
                    "SERVER_SHUTDOWN_TIMEOUT",
                    Duration::from_secs(15),
                ),
                cors_allowed_origins: get_slice_env("CORS_ALLOWED_ORIGINS", &["*"]),
            },
            database: DatabaseConfig {
                path: get_env("DB_PATH", "alerthub.db"),
            },
            auth: AuthConfig {
                api_password: get_env("API_PASSWORD", ""),
            },
            logging: LoggingConfig {
                level: get_env("LOG_LEVEL", "debug"),
                format: get_env("LOG_FORMAT", "console"),
                request_logging: get_bool_env("REQUEST_LOGGING", true),
            },
            weather: WeatherConfig {
                api_key: get_env("WEATHER_API_KEY", ""),
                station_lat: get_float_env("WEATHER_LAT", 39.192838630478995),
                station_lon: get_float_env("WEATHER_LON", -96.60012287125629),
            },
            notification: NotificationConfig {
                email: EmailConfig {
                    enabled: get_bool_env("EMAIL_NOTIFICATIONS_ENABLED", false),
                    smtp_host: get_env("EMAIL_SMTP_HOST", ""),
                    smtp_port: get_int_env("EMAIL_SMTP_PORT", 587) as u16,
                    username: get_env("EMAIL_USERNAME", ""),
                    password: get_env("EMAIL_PASSWORD", ""),
                    from_address: get_env("EMAIL_FROM_ADDRESS", ""),
                    to_addresses: get_slice_env("EMAIL_TO_ADDRESSES", &[]),
                    min_level: get_env("EMAIL_MIN_LEVEL", "error"),
                },
            },
        }
    }
}

/// Load configuration from the environment and initialize the global CONFIG
///
/// Call once at startup. Returns an error when the global slot was already
/// initialized.
pub fn load_config() -> Result<(), String> {
    CONFIG
        .set(RwLock::new(Config::from_env()))
        .map_err(|_| "Config already initialized".to_string())
}

/// Thread-safe configuration accessor
///
/// Falls back to a fresh environment snapshot when `load_config` has not
/// run (unit tests exercise modules in isolation).
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => match lock.read() {
            Ok(cfg) => f(&cfg),
            Err(poisoned) => f(&poisoned.into_inner()),
        },
        None => f(&Config::from_env()),
    }
}

// Environment helpers

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_int_env(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn get_float_env(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn get_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn get_slice_env(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Parse duration values like "15s", "2m", "1h" or plain seconds
fn get_duration_env(key: &str, default: Duration) -> Duration {
    let value = match env::var(key) {
        Ok(v) => v,
        Err(_) => return default,
    };
    parse_duration(&value).unwrap_or(default)
}

fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let (number, unit) = value.split_at(value.len().checked_sub(1)?);
    let number = number.parse::<u64>().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(number)),
        "m" => Some(Duration::from_secs(number * 60)),
        "h" => Some(Duration::from_secs(number * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("15s"), Some(Duration::from_secs(15)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("abc"), None);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_env();
        assert!(cfg.server.port > 0);
        assert_eq!(cfg.server.shutdown_timeout, Duration::from_secs(15));
        assert!(!cfg.notification.email.enabled);
    }

    #[test]
    fn test_slice_env_parsing() {
        env::set_var("ALERTHUB_TEST_SLICE", "a, b,c");
        assert_eq!(
            get_slice_env("ALERTHUB_TEST_SLICE", &["*"]),
            vec!["a", "b", "c"]
        );
        env::remove_var("ALERTHUB_TEST_SLICE");
        assert_eq!(get_slice_env("ALERTHUB_TEST_SLICE", &["*"]), vec!["*"]);
    }
}
