use super::builder::ServiceManagerBuilder;
use super::descriptor::{ServiceDescriptor, ServiceSlot, ServiceState};
use super::factory::InstanceFactory;
use super::fallback::{EMERGENCY_SERVICES, FallbackService, create_fallback};
use super::graph::DependencyGraph;
use super::status::{ContainerState, ContainerStatus, ServiceStatus};
use crate::config::ContainerConfig;
use crate::error::{ContainerError, Result};
use crate::events::{EventBus, ServiceEvent};
use crate::service::{ErrorReporter, Notifier, Service, ServiceError, ServiceInstance};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs its closure when dropped, unless disarmed first
struct DropGuard<F: FnOnce()> {
    on_drop: Option<F>,
}

impl<F: FnOnce()> DropGuard<F> {
    fn new(on_drop: F) -> Self {
        Self {
            on_drop: Some(on_drop),
        }
    }

    fn disarm(mut self) {
        self.on_drop = None;
    }
}

impl<F: FnOnce()> Drop for DropGuard<F> {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

/// Registry and lifecycle driver for named services
///
/// The ServiceManager is responsible for:
/// - Holding service descriptors until startup
/// - Computing a dependency-respecting initialization order
/// - Building and initializing services one at a time, in that order
/// - Substituting fallbacks for non-critical services that fail
/// - Cleaning everything up in reverse order on shutdown
///
/// Share it as `Arc<ServiceManager>`; every method takes `&self`.
///
/// # Example
///
/// ```rust,ignore
/// use servicehub::{ServiceDescriptor, ServiceManager};
///
/// let manager = ServiceManager::new();
/// manager.register(ServiceDescriptor::new("storage", |_| async { Ok(Storage::default()) }).critical(true))?;
/// manager.register(
///     ServiceDescriptor::new("metadata", |ctx| async move {
///         let storage = ctx.dependencies().get_as::<Storage>("storage")?;
///         Ok::<_, ServiceError>(MetadataDetector::new(storage))
///     })
///     .depends_on(["storage"]),
/// )?;
///
/// manager.initialize_all().await?;
/// let detector = manager.get_as::<MetadataDetector>("metadata");
/// // ... application runs ...
/// manager.shutdown().await?;
/// ```
pub struct ServiceManager {
    slots: DashMap<String, Arc<ServiceSlot>>,
    next_index: AtomicUsize,
    order: Mutex<Vec<String>>,
    state: Mutex<ContainerState>,
    events: EventBus,
    config: ContainerConfig,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            slots: DashMap::new(),
            next_index: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
            state: Mutex::new(ContainerState::Uninitialized),
            events: EventBus::new(config.event_capacity),
            config,
        }
    }

    pub fn builder() -> ServiceManagerBuilder {
        ServiceManagerBuilder::new()
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Bus carrying [`ServiceEvent`]s for every lifecycle transition
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn container_state(&self) -> ContainerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ContainerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Register a service descriptor
    ///
    /// Registering a name again replaces the earlier descriptor as long as it
    /// has not started initializing. Registration is closed while a startup
    /// pass or a shutdown is running.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Result<()> {
        let name = descriptor.name().to_string();
        let state = self.container_state();
        if matches!(
            state,
            ContainerState::Initializing | ContainerState::ShuttingDown
        ) {
            return Err(ContainerError::RegistrationClosed {
                service: name,
                state,
            });
        }
        match self.slots.get(&name).map(|slot| slot.state()) {
            Some(ServiceState::Registered) => {
                tracing::warn!("Service {} is already registered, replacing it", name);
            }
            Some(_) => return Err(ContainerError::AlreadyInitialized { service: name }),
            None => {}
        }

        tracing::debug!(
            "Registered service: {} (dependencies: {:?}, priority: {}, critical: {})",
            name,
            descriptor.dependencies(),
            descriptor.get_priority(),
            descriptor.is_critical()
        );
        self.insert(descriptor);
        Ok(())
    }

    pub(crate) fn insert(&self, descriptor: ServiceDescriptor) -> Arc<ServiceSlot> {
        let name = descriptor.name().to_string();
        let index = self
            .slots
            .get(&name)
            .map(|slot| slot.index)
            .unwrap_or_else(|| self.next_index.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(ServiceSlot::new(descriptor, index));
        self.slots.insert(name, Arc::clone(&slot));
        slot
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.slots_in_order()
            .iter()
            .map(|slot| slot.descriptor.name().to_string())
            .collect()
    }

    fn slot(&self, name: &str) -> Option<Arc<ServiceSlot>> {
        self.slots.get(name).map(|slot| Arc::clone(slot.value()))
    }

    fn slots_in_order(&self) -> Vec<Arc<ServiceSlot>> {
        let mut slots: Vec<_> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        slots.sort_by_key(|slot| slot.index);
        slots
    }

    /// Snapshot of the dependency graph over every registered service
    pub fn graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for slot in self.slots_in_order() {
            let descriptor = &slot.descriptor;
            graph.add_node(
                descriptor.name(),
                descriptor.get_priority(),
                descriptor.dependencies().iter().cloned(),
            );
        }
        graph
    }

    /// The order computed by the last `initialize_all`
    pub fn initialization_order(&self) -> Vec<String> {
        self.order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start every eager service in dependency order
    ///
    /// Services are started one after another; a service's `init()` has
    /// completed before anything depending on it is built. Non-critical
    /// failures degrade to fallbacks, a critical failure aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns a resolution error (missing or circular dependency) before
    /// touching any service, or the first critical service failure.
    ///
    /// If the returned future is dropped before it completes, the container
    /// is left `Failed` and the pass can be run again.
    pub async fn initialize_all(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                ContainerState::Initializing
                | ContainerState::Ready
                | ContainerState::ShuttingDown => {
                    tracing::warn!("initialize_all called while {}, ignoring", *state);
                    return Ok(());
                }
                ContainerState::Uninitialized | ContainerState::Failed => {
                    *state = ContainerState::Initializing;
                }
            }
        }

        let interrupted = DropGuard::new(|| {
            tracing::warn!("Service initialization was interrupted");
            self.set_state(ContainerState::Failed);
        });

        let started = Instant::now();
        tracing::info!("Initializing {} services...", self.len());

        let order = match self.graph().resolve() {
            Ok(order) => order,
            Err(e) => {
                interrupted.disarm();
                tracing::error!("Service resolution failed: {}", e);
                self.set_state(ContainerState::Failed);
                return Err(e);
            }
        };
        tracing::debug!("Initialization order: {:?}", order);
        *self.order.lock().unwrap_or_else(PoisonError::into_inner) = order.clone();

        for name in &order {
            let Some(slot) = self.slot(name) else {
                continue;
            };
            if slot.descriptor.is_lazy() {
                tracing::debug!("Deferring lazy service: {}", name);
                continue;
            }
            if let Err(e) = self.ensure(name).await {
                interrupted.disarm();
                tracing::error!("Startup aborted at {}: {}", name, e);
                self.set_state(ContainerState::Failed);
                return Err(e);
            }
        }

        interrupted.disarm();
        self.set_state(ContainerState::Ready);
        self.events.publish(ServiceEvent::ContainerReady);

        let status = self.status();
        tracing::info!(
            "Service initialization complete in {:?} ({} ready, {} fallback, {} pending)",
            started.elapsed(),
            status.initialized,
            status.fallback,
            status.pending
        );
        Ok(())
    }

    /// Start one service (and its dependencies) on demand
    ///
    /// Idempotent: a started service returns its cached instance, and
    /// concurrent calls for the same name share one initialization.
    pub async fn initialize_service(&self, name: &str) -> Result<ServiceInstance> {
        if let Some(instance) = self.slot(name).and_then(|slot| slot.instance()) {
            return Ok(instance);
        }
        if self.container_state() == ContainerState::ShuttingDown {
            return Err(ContainerError::ShutDown {
                service: name.to_string(),
            });
        }
        self.graph().resolve_from(name)?;
        self.ensure(name).await
    }

    fn ensure<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<ServiceInstance>> {
        Box::pin(async move {
            let slot = self
                .slot(name)
                .ok_or_else(|| ContainerError::not_found(name))?;
            if let Some(instance) = slot.instance() {
                return Ok(instance);
            }
            slot.outcome
                .get_or_init(|| self.start(&slot))
                .await
                .clone()
        })
    }

    async fn start(&self, slot: &ServiceSlot) -> Result<ServiceInstance> {
        let descriptor = &slot.descriptor;
        let name = descriptor.name();

        slot.mark_initializing();
        tracing::debug!("Initializing: {}", name);

        let interrupted = DropGuard::new(|| slot.mark_interrupted());
        let built = self.build(descriptor).await;
        interrupted.disarm();

        match built {
            Ok(instance) => {
                if !self.commit(slot, &instance) {
                    tracing::warn!("Container shut down while {} was initializing", name);
                    if let Some(service) = instance.service() {
                        if let Err(e) = service.cleanup().await {
                            tracing::error!("Cleanup failed for {}: {}", name, e);
                        }
                    }
                    slot.mark_failed("container shut down during initialization".to_string());
                    return Err(ContainerError::ShutDown {
                        service: name.to_string(),
                    });
                }
                tracing::debug!("Initialized: {}", name);
                self.events.publish(ServiceEvent::Initialized {
                    service: name.to_string(),
                });
                Ok(instance)
            }
            Err(error) if descriptor.is_critical() => {
                let reason = error.to_string();
                tracing::error!("Critical service {} failed: {}", name, reason);
                slot.mark_failed(reason.clone());
                self.events.publish(ServiceEvent::Failed {
                    service: name.to_string(),
                    reason,
                });
                Err(ContainerError::CriticalServiceFailed {
                    service: name.to_string(),
                    source: Arc::new(error),
                })
            }
            Err(error) => {
                let error = Arc::new(error);
                let reason = error.to_string();
                tracing::warn!("Service {} failed, using fallback: {}", name, reason);

                let fallback = create_fallback(name, descriptor.get_role(), error);
                let instance = ServiceInstance::Degraded {
                    fallback: Arc::new(fallback),
                    reason: reason.clone(),
                };
                slot.mark_fallback(instance.clone(), reason.clone());
                self.events.publish(ServiceEvent::Degraded {
                    service: name.to_string(),
                    reason,
                });
                Ok(instance)
            }
        }
    }

    /// Store a freshly built instance unless the container was shut down meanwhile
    ///
    /// Checked under the state lock, so a shutdown either sees the instance
    /// or this refuses it.
    fn commit(&self, slot: &ServiceSlot, instance: &ServiceInstance) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self
            .slots
            .get(slot.descriptor.name())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry.value()), slot));
        if *state == ContainerState::ShuttingDown || !current {
            return false;
        }
        slot.mark_initialized(instance.clone());
        true
    }

    async fn build(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> std::result::Result<ServiceInstance, ServiceError> {
        let name = descriptor.name();

        let mut resolved = HashMap::with_capacity(descriptor.dependencies().len());
        for dependency in descriptor.dependencies() {
            let instance = self.ensure(dependency).await.map_err(|e| {
                tracing::warn!("Dependency {} of {} is unavailable: {}", dependency, name, e);
                ContainerError::DependencyFailed {
                    service: name.to_string(),
                    dependency: dependency.clone(),
                }
            })?;
            resolved.insert(dependency.clone(), instance);
        }

        let build = InstanceFactory::build(descriptor, resolved);
        match self.config.service_init_timeout {
            Some(limit) => tokio::time::timeout(limit, build).await.map_err(|_| {
                ServiceError::timeout(
                    "init",
                    format!("{} did not initialize within {:?}", name, limit),
                )
            })?,
            None => build.await,
        }
    }

    fn available(&self, name: &str) -> Option<ServiceInstance> {
        self.slot(name).and_then(|slot| slot.instance())
    }

    /// The instance registered under `name`, if it is initialized or degraded
    ///
    /// Never fails: a missing or not yet started service is logged and
    /// reported as `None`.
    pub fn get(&self, name: &str) -> Option<ServiceInstance> {
        let instance = self.available(name);
        if instance.is_none() {
            tracing::warn!("Service {} is not available", name);
        }
        instance
    }

    /// Downcast a ready service to its concrete type
    pub fn get_as<T: Service>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name)?.downcast::<T>()
    }

    /// The shared instance, real or fallback
    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.get(name)?.service()
    }

    pub fn notifier(&self, name: &str) -> Option<Arc<dyn Notifier>> {
        self.service(name)?.notifier()
    }

    pub fn error_reporter(&self, name: &str) -> Option<Arc<dyn ErrorReporter>> {
        self.service(name)?.error_reporter()
    }

    /// True once `name` has an instance, real or fallback
    pub fn has(&self, name: &str) -> bool {
        self.available(name).is_some()
    }

    pub fn service_state(&self, name: &str) -> Option<ServiceState> {
        self.slot(name).map(|slot| slot.state())
    }

    /// Wait until `name` has an instance
    ///
    /// Resolves immediately if it already has one. Timing out only stops this
    /// waiter; the service's own initialization keeps going.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Timeout`] if nothing arrives in time.
    pub async fn wait_for(&self, name: &str, timeout: Duration) -> Result<ServiceInstance> {
        let mut events = self.events.subscribe();
        if let Some(instance) = self.available(name) {
            return Ok(instance);
        }

        tracing::debug!("Waiting up to {:?} for {}", timeout, name);
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if event.service() == Some(name) => {
                        if let Some(instance) = self.available(name) {
                            return Ok(instance);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Waiter for {} skipped {} events", name, skipped);
                        if let Some(instance) = self.available(name) {
                            return Ok(instance);
                        }
                    }
                    Err(RecvError::Closed) => return Err(ContainerError::not_found(name)),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ContainerError::Timeout {
                service: name.to_string(),
                timeout,
            })?
    }

    /// [`wait_for`](Self::wait_for) with the configured default timeout
    pub async fn wait_for_default(&self, name: &str) -> Result<ServiceInstance> {
        self.wait_for(name, self.config.default_wait_timeout).await
    }

    /// Diagnostic snapshot of every registered service
    pub fn status(&self) -> ContainerStatus {
        let services = self
            .slots_in_order()
            .iter()
            .map(|slot| {
                let descriptor = &slot.descriptor;
                let state = slot.state();
                let instance = slot.instance();
                let status = match instance.as_ref().map(ServiceInstance::service) {
                    Some(Some(service)) => service.status(),
                    Some(None) => "transient".to_string(),
                    None => state.to_string(),
                };

                ServiceStatus {
                    name: descriptor.name().to_string(),
                    state,
                    initialized: instance.is_some(),
                    critical: descriptor.is_critical(),
                    lazy: descriptor.is_lazy(),
                    singleton: descriptor.is_singleton(),
                    dependencies: descriptor.dependencies().to_vec(),
                    is_fallback: instance.as_ref().is_some_and(ServiceInstance::is_fallback),
                    status,
                    error: slot.error(),
                    initialized_at: slot.initialized_at(),
                }
            })
            .collect();

        ContainerStatus::new(
            self.container_state(),
            self.initialization_order(),
            services,
        )
    }

    /// Install minimal fallbacks for the foundational services
    ///
    /// For use when startup itself failed before normal degradation could
    /// run. Services that already have an instance are left alone. Returns
    /// how many fallbacks were installed.
    pub fn create_emergency_services(&self) -> usize {
        tracing::warn!("Creating emergency services...");

        let mut installed = 0;
        for &(name, role) in EMERGENCY_SERVICES {
            let slot = match self.slot(name) {
                Some(slot) => slot,
                None => self.insert(
                    ServiceDescriptor::new(name, move |_| async move {
                        Ok(FallbackService::emergency(name, role))
                    })
                    .role(role),
                ),
            };
            if slot.instance().is_some() {
                continue;
            }

            let fallback = FallbackService::emergency(name, role);
            let reason = fallback.reason().to_string();
            slot.mark_fallback(
                ServiceInstance::Degraded {
                    fallback: Arc::new(fallback),
                    reason: reason.clone(),
                },
                reason.clone(),
            );
            self.events.publish(ServiceEvent::Degraded {
                service: name.to_string(),
                reason,
            });
            tracing::warn!("Emergency fallback installed for {}", name);
            installed += 1;
        }
        installed
    }

    /// Clean up every started service in reverse initialization order
    ///
    /// A failing `cleanup()` is logged and does not stop the others. All
    /// registrations are dropped afterwards and the container returns to
    /// `Uninitialized`. Ignored while a startup pass is running; a service
    /// started on demand that finishes after shutdown is cleaned up at once.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                ContainerState::ShuttingDown => {
                    tracing::warn!("Shutdown already in progress");
                    return Ok(());
                }
                ContainerState::Initializing => {
                    tracing::warn!("Shutdown requested while services are initializing, ignoring");
                    return Ok(());
                }
                _ => *state = ContainerState::ShuttingDown,
            }
        }
        tracing::info!("Shutting down services...");

        let mut order = std::mem::take(
            &mut *self.order.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if order.is_empty() {
            order = self.graph().resolve().unwrap_or_default();
        }
        for name in self.names() {
            if !order.contains(&name) {
                order.push(name);
            }
        }

        let mut cleaned = 0;
        for name in order.iter().rev() {
            let Some(service) = self.available(name).and_then(|i| i.service()) else {
                continue;
            };

            tracing::debug!("Cleaning up: {}", name);
            let result = match self.config.cleanup_timeout {
                Some(limit) => tokio::time::timeout(limit, service.cleanup())
                    .await
                    .unwrap_or_else(|_| {
                        Err(ServiceError::timeout(
                            "cleanup",
                            format!("{} did not clean up within {:?}", name, limit),
                        ))
                    }),
                None => service.cleanup().await,
            };
            match result {
                Ok(()) => cleaned += 1,
                Err(e) => tracing::error!("Cleanup failed for {}: {}", name, e),
            }
        }

        self.slots.clear();
        self.next_index.store(0, Ordering::Relaxed);
        self.set_state(ContainerState::Uninitialized);
        self.events.publish(ServiceEvent::ShutdownComplete);

        tracing::info!("Shutdown complete ({} services cleaned up)", cleaned);
        Ok(())
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("state", &self.container_state())
            .field("services", &self.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
