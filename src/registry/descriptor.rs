use super::factory::ServiceContext;
use crate::error::ContainerError;
use crate::service::{Service, ServiceError, ServiceInstance, ServiceRole};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use strum_macros::{AsRefStr, Display};
use tokio::sync::OnceCell;

pub(crate) type BuildFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn Service>, ServiceError>> + Send>>;

pub(crate) type BuilderFn = Arc<dyn Fn(ServiceContext) -> BuildFuture + Send + Sync>;

/// Per-service lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Registered,
    Initializing,
    Initialized,
    Failed,
    Fallback,
}

/// Registration record: how to build a service and where it sits in the graph
///
/// # Example
///
/// ```rust,ignore
/// let descriptor = ServiceDescriptor::new("ai_client", |ctx: ServiceContext| async move {
///     let errors = ctx.dependencies().error_reporter("error_handler")?;
///     Ok::<_, ServiceError>(AiClient::new(ctx.config_as()?, errors))
/// })
/// .depends_on(["error_handler"])
/// .priority(5)
/// .config(serde_json::json!({ "endpoint": "https://api.example.org" }));
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    name: String,
    builder: BuilderFn,
    dependencies: Vec<String>,
    priority: i32,
    critical: bool,
    singleton: bool,
    lazy: bool,
    config: serde_json::Value,
    role: Option<ServiceRole>,
}

impl ServiceDescriptor {
    /// Describe a service built by an async builder closure.
    ///
    /// The builder receives the service's config and its already initialized
    /// dependencies. `init()` is awaited on the returned value before the
    /// service counts as ready.
    pub fn new<F, Fut, S>(name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, ServiceError>> + Send + 'static,
        S: Service,
    {
        let builder: BuilderFn = Arc::new(move |ctx: ServiceContext| -> BuildFuture {
            let built = builder(ctx);
            Box::pin(async move { built.await.map(|service| Arc::new(service) as Arc<dyn Service>) })
        });
        Self::with_builder(name.into(), builder)
    }

    /// Describe a service that is already constructed.
    pub fn instance<S: Service>(name: impl Into<String>, service: S) -> Self {
        let service: Arc<dyn Service> = Arc::new(service);
        let builder: BuilderFn = Arc::new(move |_: ServiceContext| -> BuildFuture {
            let service = Arc::clone(&service);
            Box::pin(async move { Ok(service) })
        });
        Self::with_builder(name.into(), builder)
    }

    fn with_builder(name: String, builder: BuilderFn) -> Self {
        let role = ServiceRole::from_service_name(&name);
        Self {
            name,
            builder,
            dependencies: Vec::new(),
            priority: 0,
            critical: false,
            singleton: true,
            lazy: false,
            config: serde_json::Value::Null,
            role,
        }
    }

    /// Names this service needs initialized first. Duplicates are ignored.
    pub fn depends_on<I, N>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        for dependency in dependencies {
            let dependency = dependency.into();
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    /// Higher runs earlier among services with no dependency relationship
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// A critical service's failure aborts container startup
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// `false` exposes a [`TransientFactory`](super::TransientFactory) instead of one shared instance
    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Skip this service in the eager startup pass
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Override the role inferred from the service name
    pub fn role(mut self, role: ServiceRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn get_priority(&self) -> i32 {
        self.priority
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn get_config(&self) -> &serde_json::Value {
        &self.config
    }

    pub fn get_role(&self) -> Option<ServiceRole> {
        self.role
    }

    pub(crate) fn builder(&self) -> &BuilderFn {
        &self.builder
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("critical", &self.critical)
            .field("singleton", &self.singleton)
            .field("lazy", &self.lazy)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) struct SlotState {
    pub(crate) state: ServiceState,
    pub(crate) instance: Option<ServiceInstance>,
    pub(crate) error: Option<String>,
    pub(crate) initialized_at: Option<DateTime<Utc>>,
}

/// A descriptor plus everything the container tracks about it
pub(crate) struct ServiceSlot {
    pub(crate) descriptor: ServiceDescriptor,
    pub(crate) index: usize,
    state: Mutex<SlotState>,
    /// Settled outcome of the one and only initialization attempt
    pub(crate) outcome: OnceCell<Result<ServiceInstance, ContainerError>>,
}

impl ServiceSlot {
    pub(crate) fn new(descriptor: ServiceDescriptor, index: usize) -> Self {
        Self {
            descriptor,
            index,
            state: Mutex::new(SlotState {
                state: ServiceState::Registered,
                instance: None,
                error: None,
                initialized_at: None,
            }),
            outcome: OnceCell::new(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SlotState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub(crate) fn state(&self) -> ServiceState {
        self.with_state(|s| s.state)
    }

    pub(crate) fn instance(&self) -> Option<ServiceInstance> {
        self.with_state(|s| s.instance.clone())
    }

    pub(crate) fn error(&self) -> Option<String> {
        self.with_state(|s| s.error.clone())
    }

    pub(crate) fn initialized_at(&self) -> Option<DateTime<Utc>> {
        self.with_state(|s| s.initialized_at)
    }

    pub(crate) fn mark_initializing(&self) {
        self.with_state(|s| s.state = ServiceState::Initializing);
    }

    pub(crate) fn mark_initialized(&self, instance: ServiceInstance) {
        self.with_state(|s| {
            s.state = ServiceState::Initialized;
            s.instance = Some(instance);
            s.initialized_at = Some(Utc::now());
        });
    }

    pub(crate) fn mark_fallback(&self, instance: ServiceInstance, reason: String) {
        self.with_state(|s| {
            s.state = ServiceState::Fallback;
            s.instance = Some(instance);
            s.error = Some(reason);
            s.initialized_at = Some(Utc::now());
        });
    }

    /// Back to `Registered` after an initialization that was dropped midway.
    pub(crate) fn mark_interrupted(&self) {
        self.with_state(|s| {
            if s.state == ServiceState::Initializing {
                s.state = ServiceState::Registered;
            }
        });
    }

    pub(crate) fn mark_failed(&self, reason: String) {
        self.with_state(|s| {
            s.state = ServiceState::Failed;
            s.error = Some(reason);
        });
    }
}
