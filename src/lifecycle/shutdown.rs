//! Graceful Shutdown Handler
//!
//! A cloneable handle that shuts the service manager down from any task.

use crate::registry::ServiceManager;
use std::sync::Arc;

/// Handles graceful shutdown of the application
///
/// Runs `ServiceManager::shutdown`, which cleans services up in reverse
/// order. Cleanup errors are logged, never returned.
///
/// # Example
///
/// ```rust,ignore
/// use servicehub::lifecycle::ShutdownHandler;
/// use std::sync::Arc;
///
/// let shutdown_handler = ShutdownHandler::new(Arc::clone(&manager));
///
/// tokio::spawn(async move {
///     host_closed.await;
///     shutdown_handler.shutdown().await;
/// });
/// ```
#[derive(Clone)]
pub struct ShutdownHandler {
    manager: Arc<ServiceManager>,
}

impl ShutdownHandler {
    /// Create a new ShutdownHandler
    pub fn new(manager: Arc<ServiceManager>) -> Self {
        Self { manager }
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) {
        tracing::info!("Starting graceful shutdown...");

        if let Err(e) = self.manager.shutdown().await {
            tracing::error!("Error during service shutdown: {}", e);
        }

        tracing::info!("Graceful shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ContainerState, ServiceDescriptor};
    use crate::service::{Service, ServiceError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Tracked(Arc<AtomicBool>);

    #[async_trait]
    impl Service for Tracked {
        async fn cleanup(&self) -> Result<(), ServiceError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_cleans_up_manager() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let manager = Arc::new(ServiceManager::new());
        manager
            .register(ServiceDescriptor::instance("storage", Tracked(Arc::clone(&cleaned))))
            .unwrap();
        manager.initialize_all().await.unwrap();

        ShutdownHandler::new(Arc::clone(&manager)).shutdown().await;

        assert!(cleaned.load(Ordering::SeqCst));
        assert_eq!(manager.container_state(), ContainerState::Uninitialized);
    }
}
