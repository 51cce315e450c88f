//! Application Lifecycle Module
//!
//! Wraps a [`ServiceManager`](crate::registry::ServiceManager) in the
//! startup and shutdown sequence of a host program.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Configuration Loading (ContainerConfig::from_env)
//!    ↓
//! 2. Service Registration
//!    ↓
//! 3. initialize_all (dependency order)
//!    ↓               ↘ critical failure
//!    ↓                 create_emergency_services → StartupError
//! [Running...]
//!    ↓
//! 4. Application::shutdown / ShutdownHandler::shutdown
//!    ↓
//! 5. cleanup (reverse order)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use servicehub::lifecycle::Application;
//!
//! let app = Application::builder()
//!     .register(ServiceDescriptor::instance("storage", StorageService::default()).critical(true))
//!     .build()
//!     .await?;
//!
//! // ... run ...
//! app.shutdown().await?;
//! ```

mod application;
mod shutdown;

pub use application::{Application, ApplicationBuilder, StartupError};
pub use shutdown::ShutdownHandler;
