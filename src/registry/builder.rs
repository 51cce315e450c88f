use super::descriptor::ServiceDescriptor;
use super::manager::ServiceManager;
use crate::config::ContainerConfig;

/// Builder for constructing a service manager
///
/// Collects configuration and descriptors before any service can be started.
///
/// # Example
/// ```rust,ignore
/// let manager = ServiceManager::builder()
///     .config(ContainerConfig::from_env())
///     .register(ServiceDescriptor::instance("toast_manager", ToastManager::default()))
///     .register(ServiceDescriptor::new("storage", build_storage).critical(true))
///     .build();
/// ```
pub struct ServiceManagerBuilder {
    config: ContainerConfig,
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceManagerBuilder {
    /// Create a new manager builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            descriptors: Vec::new(),
        }
    }

    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a service descriptor
    ///
    /// A later descriptor with the same name replaces an earlier one.
    pub fn register(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Build the manager
    pub fn build(self) -> ServiceManager {
        let manager = ServiceManager::with_config(self.config);
        for descriptor in self.descriptors {
            manager.insert(descriptor);
        }
        manager
    }
}

impl Default for ServiceManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
