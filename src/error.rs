use crate::registry::ContainerState;
use crate::service::ServiceError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that cross the container boundary.
///
/// Resolution errors and critical service failures abort startup. Everything
/// else a service does wrong is absorbed into a fallback and only shows up in
/// the status snapshot and the logs.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    #[error("Dependency not found: '{dependency}' (required by '{service}')")]
    MissingDependency { service: String, dependency: String },

    #[error("Circular dependency detected at '{service}': {}", cycle.join(" -> "))]
    CircularDependency { service: String, cycle: Vec<String> },

    #[error("Critical service '{service}' failed to initialize: {source}")]
    CriticalServiceFailed {
        service: String,
        #[source]
        source: Arc<ServiceError>,
    },

    #[error("Service '{service}' cannot start because dependency '{dependency}' failed")]
    DependencyFailed { service: String, dependency: String },

    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Service '{service}' is already initialized and cannot be re-registered")]
    AlreadyInitialized { service: String },

    #[error("Timed out after {timeout:?} waiting for service '{service}'")]
    Timeout { service: String, timeout: Duration },

    #[error("Service '{service}' is not of type {type_name}")]
    DowncastFailed { service: String, type_name: String },

    #[error("Service '{service}' is degraded: {reason}")]
    Degraded { service: String, reason: String },

    #[error("Startup did not complete within {timeout:?}")]
    StartupTimeout { timeout: Duration },

    #[error("Cannot register '{service}' while the container is {state}")]
    RegistrationClosed {
        service: String,
        state: ContainerState,
    },

    #[error("Container shut down while initializing service '{service}'")]
    ShutDown { service: String },
}

impl ContainerError {
    pub fn missing_dependency(service: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            service: service.into(),
            dependency: dependency.into(),
        }
    }

    pub fn not_found(service: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service: service.into(),
        }
    }

    pub fn downcast_failed<T: ?Sized>(service: impl Into<String>) -> Self {
        Self::DowncastFailed {
            service: service.into(),
            type_name: std::any::type_name::<T>().to_string(),
        }
    }

    /// True for errors raised while computing the initialization order.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::MissingDependency { .. } | Self::CircularDependency { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_every_service() {
        let err = ContainerError::CircularDependency {
            service: "a".into(),
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected at 'a': a -> b -> a"
        );
        assert!(err.is_resolution_error());
    }

    #[test]
    fn test_critical_failure_keeps_source() {
        let err = ContainerError::CriticalServiceFailed {
            service: "storage".into(),
            source: Arc::new(ServiceError::init_failed("disk unavailable")),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Initialization failed: disk unavailable")
        );
        assert!(!err.is_resolution_error());
    }
}
