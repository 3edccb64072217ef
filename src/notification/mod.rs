/// Critical-error notification service
///
/// Narrow interface over the email notifier: the core reports critical
/// failures here and the service decides whether anything leaves the
/// process. Delivery transport lives outside the core; with email
/// disabled (the default) notifications are only logged.
use crate::config::with_config;
use crate::logger::{self, LogTag};

pub struct NotificationService;

impl NotificationService {
    pub fn new() -> std::sync::Arc<NotificationService> {
        std::sync::Arc::new(NotificationService)
    }

    /// Report a critical error
    pub fn notify_error(&self, operation: &str, error: &str) {
        self.dispatch("error", operation, error);
    }

    /// Report a fatal error
    pub fn notify_fatal(&self, operation: &str, error: &str) {
        self.dispatch("fatal", operation, error);
    }

    fn dispatch(&self, level: &str, operation: &str, error: &str) {
        let email = with_config(|cfg| cfg.notification.email.clone());

        if !email.enabled {
            logger::debug(
                LogTag::Notify,
                &format!("Email notifications disabled ({} in {}: {})", level, operation, error),
            );
            return;
        }

        if !level_reaches(&email.min_level, level) {
            return;
        }

        // Hand-off point for the SMTP transport; recipients and sender
        // come from the EMAIL_* knobs
        logger::warning(
            LogTag::Notify,
            &format!(
                "Notifying {} recipient(s) of {} in {}: {}",
                email.to_addresses.len(),
                level,
                operation,
                error
            ),
        );
    }
}

/// Whether a notification at `level` meets the configured minimum
fn level_reaches(min_level: &str, level: &str) -> bool {
    rank(level) >= rank(min_level)
}

fn rank(level: &str) -> u8 {
    match level {
        "fatal" => 2,
        "error" => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_threshold() {
        assert!(level_reaches("error", "error"));
        assert!(level_reaches("error", "fatal"));
        assert!(!level_reaches("fatal", "error"));
    }

    #[test]
    fn test_disabled_notifier_is_silent() {
        // Default config has email disabled; must not panic or block
        let service = NotificationService::new();
        service.notify_error("unit test", "synthetic failure");
        service.notify_fatal("unit test", "synthetic failure");
    }
}
