//! Safe stand-ins for services that failed to start

use crate::service::{
    ErrorReporter, NotificationLevel, Notifier, Service, ServiceError, ServiceRole,
};
use std::sync::Arc;

/// Foundational services installed by `ServiceManager::create_emergency_services`
pub const EMERGENCY_SERVICES: &[(&str, ServiceRole)] = &[
    ("error_handler", ServiceRole::ErrorReporting),
    ("toast_manager", ServiceRole::Notifications),
];

/// Inert replacement for a failed non-critical service
///
/// Never ready; `init` and `cleanup` do nothing. Services with a well-known
/// role also get that role's interface, implemented as logging only.
#[derive(Debug)]
pub struct FallbackService {
    name: String,
    role: Option<ServiceRole>,
    reason: String,
    original_error: Option<Arc<ServiceError>>,
}

impl FallbackService {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Option<ServiceRole> {
        self.role
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The error that caused the substitution. `None` for emergency installs.
    pub fn original_error(&self) -> Option<&ServiceError> {
        self.original_error.as_deref()
    }

    pub(crate) fn emergency(name: &str, role: ServiceRole) -> Self {
        Self {
            name: name.to_string(),
            role: Some(role),
            reason: "emergency fallback installed after startup failure".to_string(),
            original_error: None,
        }
    }
}

/// Build the stand-in for `name` after it failed with `error`.
pub fn create_fallback(
    name: &str,
    role: Option<ServiceRole>,
    error: Arc<ServiceError>,
) -> FallbackService {
    match role {
        Some(role) => tracing::debug!("Creating {} fallback for {}", role, name),
        None => tracing::debug!("Creating generic fallback for {}", name),
    }
    FallbackService {
        name: name.to_string(),
        role,
        reason: error.to_string(),
        original_error: Some(error),
    }
}

impl Service for FallbackService {
    fn is_ready(&self) -> bool {
        false
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn status(&self) -> String {
        format!("fallback: {}", self.reason)
    }

    fn notifier(self: Arc<Self>) -> Option<Arc<dyn Notifier>> {
        match self.role {
            Some(ServiceRole::Notifications) => Some(self),
            _ => None,
        }
    }

    fn error_reporter(self: Arc<Self>) -> Option<Arc<dyn ErrorReporter>> {
        match self.role {
            Some(ServiceRole::ErrorReporting) => Some(self),
            _ => None,
        }
    }
}

impl Notifier for FallbackService {
    fn notify(&self, level: NotificationLevel, message: &str) {
        tracing::warn!(service = %self.name, %level, "[fallback notification] {}", message);
    }
}

impl ErrorReporter for FallbackService {
    fn report(&self, context: &str, message: &str) {
        tracing::error!(service = %self.name, "[fallback error report] {}: {}", context, message);
    }
}
