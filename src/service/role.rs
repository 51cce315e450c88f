//! Well-known service roles
//!
//! A small, closed set of roles gets a richer fallback than the generic safe
//! shape: the fallback implements the role's trait with logging-only methods,
//! so callers holding an `Arc<dyn Notifier>` never need to check whether the
//! real notifier came up.

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// User-facing notifications (toasts, banners)
    Notifications,
    /// Error reporting and display
    ErrorReporting,
}

impl ServiceRole {
    /// Infer the role of a service from its registered name.
    ///
    /// Besides the well-known service names, a service named after the role
    /// itself (`"error_reporting"`) gets that role.
    pub fn from_service_name(name: &str) -> Option<Self> {
        match name {
            "notifications" | "toast_manager" => Some(Self::Notifications),
            "error_handler" | "error_reporter" => Some(Self::ErrorReporting),
            _ => name.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Shows short messages to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    fn info(&self, message: &str) {
        self.notify(NotificationLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.notify(NotificationLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.notify(NotificationLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Reports errors raised anywhere in the application.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_role_from_well_known_names() {
        assert_eq!(
            ServiceRole::from_service_name("toast_manager"),
            Some(ServiceRole::Notifications)
        );
        assert_eq!(
            ServiceRole::from_service_name("error_handler"),
            Some(ServiceRole::ErrorReporting)
        );
        assert_eq!(
            ServiceRole::from_service_name("error_reporting"),
            Some(ServiceRole::ErrorReporting)
        );
        assert_eq!(ServiceRole::from_service_name("ai_client"), None);
        assert_eq!(ServiceRole::ErrorReporting.to_string(), "error_reporting");
    }

    #[test]
    fn test_notifier_shortcuts_forward_level() {
        struct Recorder(Mutex<Vec<(NotificationLevel, String)>>);

        impl Notifier for Recorder {
            fn notify(&self, level: NotificationLevel, message: &str) {
                self.0.lock().unwrap().push((level, message.to_string()));
            }
        }

        let recorder = Recorder(Mutex::new(Vec::new()));
        recorder.warning("field not detected");
        recorder.success("saved");

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen[0], (NotificationLevel::Warning, "field not detected".to_string()));
        assert_eq!(seen[1].0, NotificationLevel::Success);
    }
}
