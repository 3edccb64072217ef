/// Centralized argument handling for alerthub
///
/// Consolidates command-line argument parsing so binaries and tests share
/// one access path.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Flag presence checks and flag-value lookup
/// - Support for test overrides via set_cmd_args
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_lookup() {
        set_cmd_args(vec![
            "alerthub".to_string(),
            "--port".to_string(),
            "9090".to_string(),
            "--help".to_string(),
        ]);

        assert!(has_arg("--help"));
        assert!(!has_arg("--reset"));
        assert_eq!(get_arg_value("--port"), Some("9090".to_string()));
        assert_eq!(get_arg_value("--help"), None);
    }
}
