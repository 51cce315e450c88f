//! Paper annotator wiring
//!
//! Starts the services behind a paper-annotation workflow. The AI client
//! cannot reach its backend, so it degrades to a fallback while the rest of
//! the workflow keeps running.
//!
//! ```text
//! cargo run --example annotator
//! ```

use servicehub::prelude::*;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Storage {
    annotations: Mutex<Vec<String>>,
}

impl Storage {
    fn save(&self, annotation: &str) {
        if let Ok(mut annotations) = self.annotations.lock() {
            annotations.push(annotation.to_string());
        }
    }

    fn count(&self) -> usize {
        self.annotations.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Service for Storage {
    async fn init(&self) -> Result<(), ServiceError> {
        tracing::info!("Opening annotation store");
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ServiceError> {
        tracing::info!("Flushing {} annotations", self.count());
        Ok(())
    }
}

struct ToastManager;

impl Service for ToastManager {
    fn notifier(self: Arc<Self>) -> Option<Arc<dyn Notifier>> {
        Some(self)
    }
}

impl Notifier for ToastManager {
    fn notify(&self, level: NotificationLevel, message: &str) {
        println!("[toast:{}] {}", level, message);
    }
}

#[derive(serde::Deserialize)]
struct AiSettings {
    endpoint: String,
}

struct AiClient {
    endpoint: String,
}

#[async_trait]
impl Service for AiClient {
    async fn init(&self) -> Result<(), ServiceError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(ServiceError::init_failed(format!(
            "{} is unreachable",
            self.endpoint
        )))
    }
}

struct FieldDetector {
    ai: Arc<dyn Service>,
    toasts: Arc<dyn Notifier>,
}

impl FieldDetector {
    fn detect(&self, title: &str) -> String {
        if self.ai.is_ready() {
            return format!("ai-detected field for '{}'", title);
        }
        self.toasts
            .warning("AI assistance unavailable, using keyword detection");
        "computer science".to_string()
    }
}

impl Service for FieldDetector {}

struct TextExtractor {
    storage: Arc<Storage>,
}

impl Service for TextExtractor {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let manager = ServiceManager::builder()
        .config(ContainerConfig::from_env())
        .register(ServiceDescriptor::instance("storage", Storage::default()).critical(true))
        .register(ServiceDescriptor::instance("toast_manager", ToastManager).priority(10))
        .register(
            ServiceDescriptor::new("ai_client", |ctx: ServiceContext| async move {
                let settings: AiSettings = ctx.config_as()?;
                Ok::<_, ServiceError>(AiClient {
                    endpoint: settings.endpoint,
                })
            })
            .config(serde_json::json!({ "endpoint": "http://localhost:11434" })),
        )
        .register(
            ServiceDescriptor::new("field_detector", |ctx: ServiceContext| async move {
                let deps = ctx.dependencies();
                Ok::<_, ServiceError>(FieldDetector {
                    ai: deps.service("ai_client")?,
                    toasts: deps.notifier("toast_manager")?,
                })
            })
            .depends_on(["ai_client", "toast_manager"]),
        )
        .register(
            ServiceDescriptor::new("text_extractor", |ctx: ServiceContext| async move {
                Ok::<_, ServiceError>(TextExtractor {
                    storage: ctx.dependencies().get_as::<Storage>("storage")?,
                })
            })
            .depends_on(["storage"])
            .singleton(false)
            .lazy(true),
        )
        .build();

    let mut events = manager.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!("event: {}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    let app = match Application::builder()
        .manager(manager)
        .init_timeout(Duration::from_secs(10))
        .build()
        .await
    {
        Ok(app) => app,
        Err(failure) => {
            if let Some(errors) = failure.error_reporter() {
                errors.report("startup", &failure.to_string());
            }
            return Err(failure.into());
        }
    };
    let manager = app.manager();

    let detector = manager
        .get_as::<FieldDetector>("field_detector")
        .ok_or_else(|| anyhow::anyhow!("field detector unavailable"))?;
    println!("research field: {}", detector.detect("Attention Is All You Need"));

    let extractor = manager.initialize_service("text_extractor").await?;
    if let Some(factory) = extractor.transient() {
        let extractor = factory.create_as::<TextExtractor>().await?;
        extractor.storage.save("abstract: sequence transduction without recurrence");
    }

    println!("{}", serde_json::to_string_pretty(&manager.status().to_json())?);

    app.shutdown().await?;
    Ok(())
}
