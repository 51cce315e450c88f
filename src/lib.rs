//! # Servicehub
//!
//! An async service container with dependency-ordered startup and graceful
//! degradation.
//!
//! Services are registered by name with a builder, a list of dependencies
//! and a few flags. The container works out a safe initialization order,
//! starts each service once even under concurrent demand, and swaps failed
//! non-critical services for inert fallbacks so the rest of the program
//! keeps running.
//!
//! ## Features
//!
//! - **Dependency Ordering**: Priority-seeded topological sort with cycle and missing-dependency detection
//! - **Coalesced Initialization**: Concurrent requests for a service share a single initialization
//! - **Graceful Degradation**: Non-critical failures become fallbacks; critical ones abort startup
//! - **Role Fallbacks**: Notification and error-reporting fallbacks keep working as log sinks
//! - **Lifecycle Events**: Broadcast events for readiness, degradation and shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use servicehub::prelude::*;
//!
//! struct Storage;
//!
//! #[async_trait]
//! impl Service for Storage {
//!     async fn init(&self) -> Result<(), ServiceError> {
//!         Ok(())
//!     }
//! }
//!
//! struct Annotator {
//!     storage: Arc<Storage>,
//! }
//!
//! impl Service for Annotator {}
//!
//! #[tokio::main]
//! async fn main() -> servicehub::Result<()> {
//!     let manager = ServiceManager::builder()
//!         .register(ServiceDescriptor::instance("storage", Storage).critical(true))
//!         .register(
//!             ServiceDescriptor::new("annotator", |ctx: ServiceContext| async move {
//!                 let storage = ctx.dependencies().get_as::<Storage>("storage")?;
//!                 Ok::<_, ServiceError>(Annotator { storage })
//!             })
//!             .depends_on(["storage"]),
//!         )
//!         .build();
//!
//!     manager.initialize_all().await?;
//!     let annotator = manager.get_as::<Annotator>("annotator");
//!     assert!(annotator.is_some());
//!
//!     manager.shutdown().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod registry;
pub mod service;

// Re-export core types
pub use config::ContainerConfig;
pub use error::{ContainerError, Result};
pub use events::{EventBus, ServiceEvent};
pub use registry::{
    ContainerState, ContainerStatus, Dependencies, ServiceContext, ServiceDescriptor,
    ServiceManager, ServiceManagerBuilder, ServiceState, ServiceStatus, TransientFactory,
};
pub use service::{
    ErrorReporter, NotificationLevel, Notifier, Service, ServiceError, ServiceInstance,
    ServiceRole,
};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use servicehub::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ContainerConfig;
    pub use crate::error::ContainerError;
    pub use crate::events::{EventBus, ServiceEvent};
    pub use crate::lifecycle::{Application, ApplicationBuilder, ShutdownHandler, StartupError};
    pub use crate::registry::{
        ContainerState, ContainerStatus, Dependencies, FallbackService, ServiceContext,
        ServiceDescriptor, ServiceManager, ServiceManagerBuilder, ServiceState, TransientFactory,
    };
    pub use crate::service::{
        ErrorReporter, NotificationLevel, Notifier, Service, ServiceError, ServiceInstance,
        ServiceRole,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
