use super::descriptor::{BuilderFn, ServiceDescriptor};
use crate::error::{ContainerError, Result};
use crate::service::{ErrorReporter, Notifier, Service, ServiceError, ServiceInstance};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The initialized dependencies handed to a service builder
#[derive(Clone)]
pub struct Dependencies {
    owner: String,
    resolved: Arc<HashMap<String, ServiceInstance>>,
}

impl Dependencies {
    pub(crate) fn new(owner: impl Into<String>, resolved: HashMap<String, ServiceInstance>) -> Self {
        Self {
            owner: owner.into(),
            resolved: Arc::new(resolved),
        }
    }

    /// Look up a declared dependency.
    pub fn get(&self, name: &str) -> Result<&ServiceInstance> {
        self.resolved
            .get(name)
            .ok_or_else(|| ContainerError::missing_dependency(&self.owner, name))
    }

    /// The shared instance, whether it came up normally or degraded.
    pub fn service(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.get(name)?
            .service()
            .ok_or_else(|| ContainerError::downcast_failed::<dyn Service>(name))
    }

    /// Downcast a dependency to its concrete type. Fails if it is degraded.
    pub fn get_as<T: Service>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.get(name)?;
        if let Some(reason) = instance.degraded_reason() {
            return Err(ContainerError::Degraded {
                service: name.to_string(),
                reason: reason.to_string(),
            });
        }
        instance
            .downcast::<T>()
            .ok_or_else(|| ContainerError::downcast_failed::<T>(name))
    }

    pub fn notifier(&self, name: &str) -> Result<Arc<dyn Notifier>> {
        self.service(name)?
            .notifier()
            .ok_or_else(|| ContainerError::downcast_failed::<dyn Notifier>(name))
    }

    pub fn error_reporter(&self, name: &str) -> Result<Arc<dyn ErrorReporter>> {
        self.service(name)?
            .error_reporter()
            .ok_or_else(|| ContainerError::downcast_failed::<dyn ErrorReporter>(name))
    }

    pub fn transient(&self, name: &str) -> Result<TransientFactory> {
        self.get(name)?
            .transient()
            .cloned()
            .ok_or_else(|| ContainerError::downcast_failed::<TransientFactory>(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolved.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Everything a builder gets to construct its service
pub struct ServiceContext {
    name: String,
    config: serde_json::Value,
    dependencies: Dependencies,
}

impl ServiceContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    /// Deserialize the opaque config into a typed settings struct.
    pub fn config_as<T: DeserializeOwned>(&self) -> std::result::Result<T, ServiceError> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            ServiceError::init_failed(format!("invalid config for '{}': {}", self.name, e))
        })
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }
}

/// Builds fresh instances of a non-singleton service
///
/// Each call runs the builder and awaits `init()` on the result. The
/// dependencies it passes along were resolved once, when the registration
/// was started.
#[derive(Clone)]
pub struct TransientFactory {
    name: String,
    builder: BuilderFn,
    config: serde_json::Value,
    dependencies: Dependencies,
}

impl TransientFactory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create(&self) -> std::result::Result<Arc<dyn Service>, ServiceError> {
        InstanceFactory::construct(
            &self.name,
            &self.builder,
            self.config.clone(),
            self.dependencies.clone(),
        )
        .await
    }

    /// Create an instance and downcast it to its concrete type.
    pub async fn create_as<T: Service>(&self) -> std::result::Result<Arc<T>, ServiceError> {
        self.create()
            .await?
            .into_any()
            .downcast::<T>()
            .map_err(|_| ContainerError::downcast_failed::<T>(&self.name).into())
    }
}

impl fmt::Debug for TransientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Turns a descriptor plus its resolved dependencies into an instance
pub(crate) struct InstanceFactory;

impl InstanceFactory {
    pub(crate) async fn build(
        descriptor: &ServiceDescriptor,
        resolved: HashMap<String, ServiceInstance>,
    ) -> std::result::Result<ServiceInstance, ServiceError> {
        let dependencies = Dependencies::new(descriptor.name(), resolved);

        if !descriptor.is_singleton() {
            return Ok(ServiceInstance::Transient(TransientFactory {
                name: descriptor.name().to_string(),
                builder: Arc::clone(descriptor.builder()),
                config: descriptor.get_config().clone(),
                dependencies,
            }));
        }

        let service = Self::construct(
            descriptor.name(),
            descriptor.builder(),
            descriptor.get_config().clone(),
            dependencies,
        )
        .await?;
        Ok(ServiceInstance::Ready(service))
    }

    async fn construct(
        name: &str,
        builder: &BuilderFn,
        config: serde_json::Value,
        dependencies: Dependencies,
    ) -> std::result::Result<Arc<dyn Service>, ServiceError> {
        let context = ServiceContext {
            name: name.to_string(),
            config,
            dependencies,
        };
        let service = builder(context).await?;
        service.init().await?;
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Storage {
        inits: AtomicUsize,
    }

    #[async_trait]
    impl Service for Storage {
        async fn init(&self) -> std::result::Result<(), ServiceError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Service for Broken {
        async fn init(&self) -> std::result::Result<(), ServiceError> {
            Err(ServiceError::init_failed("no connection"))
        }
    }

    #[derive(Debug, Deserialize)]
    struct AiSettings {
        model: String,
        max_tokens: u32,
    }

    #[tokio::test]
    async fn test_build_awaits_init() {
        let descriptor = ServiceDescriptor::new("storage", |_| async {
            Ok(Storage {
                inits: AtomicUsize::new(0),
            })
        });

        let instance = InstanceFactory::build(&descriptor, HashMap::new())
            .await
            .unwrap();
        let storage = instance.downcast::<Storage>().unwrap();
        assert_eq!(storage.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_failure_propagates() {
        let descriptor = ServiceDescriptor::instance("broken", Broken);
        let err = InstanceFactory::build(&descriptor, HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Initialization failed: no connection");
    }

    #[tokio::test]
    async fn test_builder_receives_config_and_dependencies() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in_builder = Arc::clone(&seen);

        let descriptor = ServiceDescriptor::new("ai_client", move |ctx: ServiceContext| {
            let seen = Arc::clone(&seen_in_builder);
            async move {
                let settings: AiSettings = ctx.config_as()?;
                let storage = ctx.dependencies().get_as::<Storage>("storage")?;
                *seen.lock().unwrap() = Some((
                    settings.model,
                    settings.max_tokens,
                    storage.inits.load(Ordering::SeqCst),
                ));
                Ok::<_, ServiceError>(Broken)
            }
        })
        .depends_on(["storage"])
        .config(serde_json::json!({ "model": "small", "max_tokens": 512 }));

        let storage: Arc<dyn Service> = Arc::new(Storage {
            inits: AtomicUsize::new(1),
        });
        let resolved = HashMap::from([("storage".to_string(), ServiceInstance::Ready(storage))]);

        // Broken::init fails, but the builder already ran
        assert!(InstanceFactory::build(&descriptor, resolved).await.is_err());
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some(("small".to_string(), 512, 1))
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_init_failure() {
        let descriptor = ServiceDescriptor::new("ai_client", |ctx: ServiceContext| async move {
            let _settings: AiSettings = ctx.config_as()?;
            Ok::<_, ServiceError>(Broken)
        })
        .config(serde_json::json!({ "model": 3 }));

        let err = InstanceFactory::build(&descriptor, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InitializationFailed(_)));
    }

    #[tokio::test]
    async fn test_non_singleton_is_exposed_unconstructed() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        let descriptor = ServiceDescriptor::new("parser", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(Storage {
                    inits: AtomicUsize::new(0),
                })
            }
        })
        .singleton(false);

        let instance = InstanceFactory::build(&descriptor, HashMap::new())
            .await
            .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let factory = instance.transient().unwrap();
        let first = factory.create_as::<Storage>().await.unwrap();
        let second = factory.create_as::<Storage>().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.inits.load(Ordering::SeqCst), 1);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dependencies_lookup_errors() {
        let degraded = ServiceInstance::Degraded {
            fallback: Arc::new(Broken),
            reason: "offline".into(),
        };
        let deps = Dependencies::new(
            "annotator",
            HashMap::from([("ai_client".to_string(), degraded)]),
        );

        assert!(deps.service("ai_client").is_ok());
        assert!(matches!(
            deps.get_as::<Broken>("ai_client"),
            Err(ContainerError::Degraded { .. })
        ));
        assert!(matches!(
            deps.get("storage"),
            Err(ContainerError::MissingDependency { .. })
        ));
        assert!(deps.notifier("ai_client").is_err());
        assert_eq!(deps.names().collect::<Vec<_>>(), ["ai_client"]);
    }
}
