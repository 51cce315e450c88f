//! Application Bootstrap
//!
//! Starts a service manager and owns the fatal-startup path: when startup
//! fails, emergency services are installed so the caller can still report
//! the failure to the user.

use super::ShutdownHandler;
use crate::error::{ContainerError, Result};
use crate::registry::{ServiceDescriptor, ServiceManager};
use crate::service::{ErrorReporter, Notifier};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A started set of services
///
/// # Example
///
/// ```rust,ignore
/// use servicehub::lifecycle::Application;
///
/// #[tokio::main]
/// async fn main() {
///     let app = match Application::builder()
///         .register(storage_descriptor)
///         .register(ai_client_descriptor)
///         .init_timeout(Duration::from_secs(30))
///         .build()
///         .await
///     {
///         Ok(app) => app,
///         Err(failure) => {
///             if let Some(errors) = failure.error_reporter() {
///                 errors.report("startup", &failure.to_string());
///             }
///             return;
///         }
///     };
///
///     // Run...
///
///     app.shutdown().await.ok();
/// }
/// ```
pub struct Application {
    manager: Arc<ServiceManager>,
}

impl Application {
    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Get a reference to the service manager
    pub fn manager(&self) -> &Arc<ServiceManager> {
        &self.manager
    }

    /// Create a handler that can shut the services down from another task
    pub fn shutdown_handler(&self) -> ShutdownHandler {
        ShutdownHandler::new(Arc::clone(&self.manager))
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application...");
        self.manager.shutdown().await?;
        tracing::info!("Application shutdown complete");
        Ok(())
    }
}

/// Startup failed; the manager is handed back with emergency services installed
#[derive(Debug, Error)]
#[error("Application startup failed: {source}")]
pub struct StartupError {
    #[source]
    pub source: ContainerError,
    pub manager: Arc<ServiceManager>,
}

impl StartupError {
    pub fn error_reporter(&self) -> Option<Arc<dyn ErrorReporter>> {
        self.manager.error_reporter("error_handler")
    }

    pub fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.manager.notifier("toast_manager")
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    manager: Option<ServiceManager>,
    descriptors: Vec<ServiceDescriptor>,
    init_timeout: Option<Duration>,
    emergency_fallbacks: bool,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    /// Create a new application builder
    pub fn new() -> Self {
        Self {
            manager: None,
            descriptors: Vec::new(),
            init_timeout: None,
            emergency_fallbacks: true,
        }
    }

    /// Use a pre-configured service manager
    pub fn manager(mut self, manager: ServiceManager) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Register a service descriptor
    pub fn register(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Set a timeout for the whole startup pass
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    /// Whether to install emergency services when startup fails (default: on)
    pub fn emergency_fallbacks(mut self, enabled: bool) -> Self {
        self.emergency_fallbacks = enabled;
        self
    }

    /// Register everything and start all eager services
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] carrying the manager if registration,
    /// resolution or a critical service fails, or the timeout elapses.
    pub async fn build(self) -> std::result::Result<Application, StartupError> {
        let manager = Arc::new(self.manager.unwrap_or_default());

        tracing::info!("Starting application initialization...");

        let mut result = Ok(());
        for descriptor in self.descriptors {
            if let Err(e) = manager.register(descriptor) {
                result = Err(e);
                break;
            }
        }

        if result.is_ok() {
            result = match self.init_timeout {
                Some(timeout) => tokio::time::timeout(timeout, manager.initialize_all())
                    .await
                    .unwrap_or(Err(ContainerError::StartupTimeout { timeout })),
                None => manager.initialize_all().await,
            };
        }

        match result {
            Ok(()) => {
                tracing::info!("Application initialization complete");
                Ok(Application { manager })
            }
            Err(source) => {
                tracing::error!("Application initialization failed: {}", source);
                if self.emergency_fallbacks {
                    manager.create_emergency_services();
                }
                Err(StartupError { source, manager })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ContainerState, ServiceState};
    use crate::service::{Service, ServiceError};
    use async_trait::async_trait;

    struct Storage;

    impl Service for Storage {}

    struct Unreachable;

    #[async_trait]
    impl Service for Unreachable {
        async fn init(&self) -> std::result::Result<(), ServiceError> {
            Err(ServiceError::init_failed("backend unreachable"))
        }
    }

    struct Hanging;

    #[async_trait]
    impl Service for Hanging {
        async fn init(&self) -> std::result::Result<(), ServiceError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_build_starts_services() {
        let app = Application::builder()
            .register(ServiceDescriptor::instance("storage", Storage))
            .build()
            .await
            .unwrap();

        assert!(app.manager().has("storage"));
        app.shutdown().await.unwrap();
        assert!(app.manager().is_empty());
    }

    #[tokio::test]
    async fn test_failed_startup_installs_emergency_services() {
        let failure = Application::builder()
            .register(ServiceDescriptor::instance("storage", Unreachable).critical(true))
            .build()
            .await
            .err()
            .unwrap();

        assert!(matches!(
            failure.source,
            ContainerError::CriticalServiceFailed { .. }
        ));
        let reporter = failure.error_reporter().unwrap();
        reporter.report("startup", &failure.to_string());
        assert!(failure.notifier().is_some());
    }

    #[tokio::test]
    async fn test_startup_timeout() {
        let failure = Application::builder()
            .register(ServiceDescriptor::instance("slow", Hanging))
            .init_timeout(Duration::from_millis(20))
            .emergency_fallbacks(false)
            .build()
            .await
            .err()
            .unwrap();

        assert!(matches!(
            failure.source,
            ContainerError::StartupTimeout { .. }
        ));
        assert!(failure.error_reporter().is_none());
        assert_eq!(failure.manager.container_state(), ContainerState::Failed);
        assert_eq!(
            failure.manager.service_state("slow"),
            Some(ServiceState::Registered)
        );
    }
}
