use super::descriptor::ServiceState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Container-wide lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    ShuttingDown,
}

/// Diagnostic view of one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// An instance (real or fallback) is available
    pub initialized: bool,
    pub critical: bool,
    pub lazy: bool,
    pub singleton: bool,
    pub dependencies: Vec<String>,
    pub is_fallback: bool,
    pub status: String,
    pub error: Option<String>,
    pub initialized_at: Option<DateTime<Utc>>,
}

/// Diagnostic snapshot returned by `ServiceManager::status`
#[derive(Debug, Clone, Serialize)]
pub struct ContainerStatus {
    pub state: ContainerState,
    pub order: Vec<String>,
    pub total: usize,
    pub initialized: usize,
    pub fallback: usize,
    pub failed: usize,
    pub pending: usize,
    pub services: Vec<ServiceStatus>,
}

impl ContainerStatus {
    pub(crate) fn new(
        state: ContainerState,
        order: Vec<String>,
        services: Vec<ServiceStatus>,
    ) -> Self {
        let count = |wanted: ServiceState| services.iter().filter(|s| s.state == wanted).count();
        let initialized = count(ServiceState::Initialized);
        let fallback = count(ServiceState::Fallback);
        let failed = count(ServiceState::Failed);

        Self {
            state,
            order,
            total: services.len(),
            initialized,
            fallback,
            failed,
            pending: services.len() - initialized - fallback - failed,
            services,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceStatus> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Services that degraded to a fallback.
    pub fn degraded(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.services.iter().filter(|s| s.is_fallback)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, state: ServiceState) -> ServiceStatus {
        ServiceStatus {
            name: name.to_string(),
            state,
            initialized: matches!(state, ServiceState::Initialized | ServiceState::Fallback),
            critical: false,
            lazy: false,
            singleton: true,
            dependencies: Vec::new(),
            is_fallback: state == ServiceState::Fallback,
            status: state.to_string(),
            error: None,
            initialized_at: None,
        }
    }

    #[test]
    fn test_counts() {
        let status = ContainerStatus::new(
            ContainerState::Ready,
            vec!["a".into(), "b".into()],
            vec![
                entry("a", ServiceState::Initialized),
                entry("b", ServiceState::Fallback),
                entry("c", ServiceState::Registered),
                entry("d", ServiceState::Failed),
            ],
        );

        assert_eq!(status.total, 4);
        assert_eq!(status.initialized, 1);
        assert_eq!(status.fallback, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.degraded().count(), 1);
        assert!(status.service("c").is_some_and(|s| !s.initialized));
    }

    #[test]
    fn test_json_snapshot() {
        let status = ContainerStatus::new(
            ContainerState::Initializing,
            Vec::new(),
            vec![entry("toast_manager", ServiceState::Fallback)],
        );
        let json = status.to_json();
        assert_eq!(json["state"], "initializing");
        assert_eq!(json["services"][0]["state"], "fallback");
        assert_eq!(json["services"][0]["is_fallback"], true);
    }
}
