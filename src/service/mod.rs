//! Service contract
//!
//! Every instance the container hands out, real or fallback, is an
//! `Arc<dyn Service>`. Dependents talk to it through this trait (and the role
//! traits in [`role`]) instead of probing for methods.
//!
//! # Example
//!
//! ```rust,ignore
//! use servicehub::{Service, ServiceError};
//! use async_trait::async_trait;
//!
//! pub struct MetadataDetector {
//!     pages: tokio::sync::Mutex<Vec<String>>,
//! }
//!
//! #[async_trait]
//! impl Service for MetadataDetector {
//!     async fn init(&self) -> Result<(), ServiceError> {
//!         tracing::info!("Loading metadata selectors");
//!         Ok(())
//!     }
//!
//!     async fn cleanup(&self) -> Result<(), ServiceError> {
//!         self.pages.lock().await.clear();
//!         Ok(())
//!     }
//! }
//! ```

mod error;
pub mod role;

pub use error::ServiceError;
pub use role::{ErrorReporter, NotificationLevel, Notifier, ServiceRole};

use crate::registry::TransientFactory;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Upcast helper so `Arc<dyn Service>` can be downcast to its concrete type.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A service managed by the container
#[async_trait]
pub trait Service: AsAny {
    /// Called once after construction, before the service is considered ready
    ///
    /// Dependents are not built until this has completed.
    async fn init(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Called during container shutdown, in reverse initialization order
    async fn cleanup(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_fallback(&self) -> bool {
        false
    }

    /// Human readable status line for diagnostics
    fn status(&self) -> String {
        "ready".to_string()
    }

    /// The notification interface, if this service provides one
    fn notifier(self: Arc<Self>) -> Option<Arc<dyn Notifier>> {
        None
    }

    /// The error reporting interface, if this service provides one
    fn error_reporter(self: Arc<Self>) -> Option<Arc<dyn ErrorReporter>> {
        None
    }
}

/// What a registered name resolves to once it has been started
#[derive(Clone)]
pub enum ServiceInstance {
    /// Built and initialized normally
    Ready(Arc<dyn Service>),
    /// Initialization failed; a safe stand-in was substituted
    Degraded {
        fallback: Arc<dyn Service>,
        reason: String,
    },
    /// Non-singleton registration: a factory that builds a fresh instance per call
    Transient(TransientFactory),
}

impl ServiceInstance {
    /// The shared instance, real or fallback. `None` for transient registrations.
    pub fn service(&self) -> Option<Arc<dyn Service>> {
        match self {
            Self::Ready(service) => Some(Arc::clone(service)),
            Self::Degraded { fallback, .. } => Some(Arc::clone(fallback)),
            Self::Transient(_) => None,
        }
    }

    /// Downcast a ready instance to its concrete type.
    pub fn downcast<T: Service>(&self) -> Option<Arc<T>> {
        match self {
            Self::Ready(service) => Arc::clone(service).into_any().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn transient(&self) -> Option<&TransientFactory> {
        match self {
            Self::Transient(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Degraded { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(service) => f.debug_tuple("Ready").field(&service.status()).finish(),
            Self::Degraded { reason, .. } => {
                f.debug_struct("Degraded").field("reason", reason).finish()
            }
            Self::Transient(factory) => f.debug_tuple("Transient").field(&factory.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parser;

    impl Service for Parser {}

    struct Other;

    impl Service for Other {}

    #[test]
    fn test_downcast_ready_instance() {
        let instance = ServiceInstance::Ready(Arc::new(Parser));
        assert!(instance.downcast::<Parser>().is_some());
        assert!(instance.downcast::<Other>().is_none());
        assert!(!instance.is_fallback());
    }

    #[test]
    fn test_degraded_instance_exposes_reason_not_type() {
        let instance = ServiceInstance::Degraded {
            fallback: Arc::new(Parser),
            reason: "boom".into(),
        };
        assert!(instance.downcast::<Parser>().is_none());
        assert!(instance.service().is_some());
        assert_eq!(instance.degraded_reason(), Some("boom"));
    }
}
