//! Service registry with synchronous handlers

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use guard_core::{Context, ServiceCall, ServiceError};
use tracing::{debug, instrument, warn};

use crate::store::StateStore;

/// Handles one service call; may write states through the store
pub type ServiceHandler =
    Arc<dyn Fn(&ServiceCall, &StateStore, DateTime<Utc>) -> Result<(), ServiceError> + Send + Sync>;

/// Wildcard service name matching every service of a domain
const ANY_SERVICE: &str = "*";

/// Services keyed by "domain.service", plus a log of every call made
pub struct ServiceRegistry {
    services: DashMap<String, ServiceHandler>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler; `service` may be `*` to catch a whole domain
    pub fn register<F>(&self, domain: &str, service: &str, handler: F)
    where
        F: Fn(&ServiceCall, &StateStore, DateTime<Utc>) -> Result<(), ServiceError>
            + Send
            + Sync
            + 'static,
    {
        debug!(domain, service, "Registering service");
        self.services
            .insert(format!("{domain}.{service}"), Arc::new(handler));
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.lookup(domain, service).is_some()
    }

    fn lookup(&self, domain: &str, service: &str) -> Option<ServiceHandler> {
        self.services
            .get(&format!("{domain}.{service}"))
            .or_else(|| self.services.get(&format!("{domain}.{ANY_SERVICE}")))
            .map(|h| h.clone())
    }

    /// Record and dispatch a call
    #[instrument(skip(self, service_data, store, now))]
    pub fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        store: &StateStore,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let call = ServiceCall::new(domain, service, service_data, Context::new());
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.clone());

        let Some(handler) = self.lookup(domain, service) else {
            warn!(domain, service, "Service not found");
            return Err(ServiceError::NotFound {
                domain: domain.to_string(),
                service: service.to_string(),
            });
        };

        debug!(domain, service, "Calling service");
        handler(&call, store, now)
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeBus;
    use serde_json::json;

    fn store() -> StateStore {
        StateStore::new(Arc::new(ChangeBus::new()))
    }

    #[test]
    fn test_dispatch_and_record() {
        let registry = ServiceRegistry::new();
        registry.register("switch", "turn_on", |call, store, now| {
            for id in call.entity_ids() {
                let id = id
                    .parse()
                    .map_err(|e| ServiceError::InvalidData(format!("{e}")))?;
                store.set_value(id, "on", call.context.child(), now);
            }
            Ok(())
        });

        let store = store();
        registry
            .call(
                "switch",
                "turn_on",
                json!({"entity_id": "switch.siren"}),
                &store,
                Utc::now(),
            )
            .unwrap();

        assert!(store.is_state(&"switch.siren".parse().unwrap(), "on"));
        let calls = registry.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].service_id(), "switch.turn_on");
    }

    #[test]
    fn test_wildcard_and_missing() {
        let registry = ServiceRegistry::new();
        registry.register("notify", "*", |_, _, _| Ok(()));

        assert!(registry.has_service("notify", "mobile_app_phone"));
        assert!(!registry.has_service("tts", "speak"));

        let store = store();
        let err = registry
            .call("tts", "speak", json!({}), &store, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        // Failed calls are still recorded
        assert_eq!(registry.calls().len(), 1);
        registry.clear_calls();
        assert!(registry.calls().is_empty());
    }
}
