use crate::events::MAX_EVENT_CAPACITY;
use std::env;
use std::time::Duration;

const WAIT_TIMEOUT_VAR: &str = "SERVICEHUB_WAIT_TIMEOUT_MS";
const INIT_TIMEOUT_VAR: &str = "SERVICEHUB_INIT_TIMEOUT_MS";
const SHUTDOWN_TIMEOUT_VAR: &str = "SERVICEHUB_SHUTDOWN_TIMEOUT_MS";
const EVENT_CAPACITY_VAR: &str = "SERVICEHUB_EVENT_CAPACITY";

/// Container-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Default timeout used by `ServiceManager::wait_for_default`
    pub default_wait_timeout: Duration,
    /// Upper bound for a single service's build + `init()`; `None` waits forever
    pub service_init_timeout: Option<Duration>,
    /// Upper bound for a single service's `cleanup()`; `None` waits forever
    pub cleanup_timeout: Option<Duration>,
    /// Capacity of the lifecycle event channel, at most `MAX_EVENT_CAPACITY`
    pub event_capacity: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout: Duration::from_secs(5),
            service_init_timeout: None,
            cleanup_timeout: None,
            event_capacity: 100,
        }
    }
}

impl ContainerConfig {
    /// Defaults overridden by `SERVICEHUB_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = parse_var(&lookup, WAIT_TIMEOUT_VAR) {
            config.default_wait_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, INIT_TIMEOUT_VAR) {
            config.service_init_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var(&lookup, SHUTDOWN_TIMEOUT_VAR) {
            config.cleanup_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(capacity) = parse_var(&lookup, EVENT_CAPACITY_VAR) {
            match usize::try_from(capacity) {
                Ok(capacity) if (1..=MAX_EVENT_CAPACITY).contains(&capacity) => {
                    config.event_capacity = capacity;
                }
                _ => tracing::warn!(
                    "Ignoring {}={}: must be between 1 and {}",
                    EVENT_CAPACITY_VAR,
                    capacity,
                    MAX_EVENT_CAPACITY
                ),
            }
        }

        config
    }

    pub fn with_default_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = timeout;
        self
    }

    pub fn with_service_init_timeout(mut self, timeout: Duration) -> Self {
        self.service_init_timeout = Some(timeout);
        self
    }

    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = Some(timeout);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_env() {
        let config = ContainerConfig::from_lookup(|_| None);
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (WAIT_TIMEOUT_VAR, "250"),
            (INIT_TIMEOUT_VAR, "1000"),
            (EVENT_CAPACITY_VAR, "not-a-number"),
        ]);
        let config = ContainerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_wait_timeout, Duration::from_millis(250));
        assert_eq!(config.service_init_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.cleanup_timeout, None);
        assert_eq!(config.event_capacity, 100);
    }

    #[test]
    fn test_out_of_range_event_capacity_is_ignored() {
        for raw in ["0", "18446744073709551615"] {
            let config = ContainerConfig::from_lookup(|key| {
                (key == EVENT_CAPACITY_VAR).then(|| raw.to_string())
            });
            assert_eq!(config.event_capacity, 100);
        }

        let config =
            ContainerConfig::from_lookup(|key| (key == EVENT_CAPACITY_VAR).then(|| "512".into()));
        assert_eq!(config.event_capacity, 512);
        let _manager = crate::ServiceManager::with_config(config.with_event_capacity(usize::MAX));
    }
}
