mod builder;
mod descriptor;
mod factory;
mod fallback;
mod graph;
mod manager;
mod status;

pub use builder::ServiceManagerBuilder;
pub use descriptor::{ServiceDescriptor, ServiceState};
pub use factory::{Dependencies, ServiceContext, TransientFactory};
pub use fallback::{EMERGENCY_SERVICES, FallbackService, create_fallback};
pub use graph::DependencyGraph;
pub use manager::ServiceManager;
pub use status::{ContainerState, ContainerStatus, ServiceStatus};
