//! Service calls issued by the engine and the errors a host may answer with

use crate::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request to actuate something on the host (arm the panel, switch a
/// siren, send a notification)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// e.g. "alarm_control_panel", "light", "notify"
    pub domain: String,

    /// e.g. "alarm_arm_away", "turn_on", "mobile_app_phone"
    pub service: String,

    pub service_data: serde_json::Value,

    pub context: Context,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
        context: Context,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
            context,
        }
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Entity ids targeted by this call, accepting a single string or a list
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }
}

/// Reasons a host may refuse a service call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("Invalid service data: {0}")]
    InvalidData(String),

    #[error("Service call failed: {0}")]
    CallFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_ids_single_and_list() {
        let single = ServiceCall::new(
            "light",
            "turn_on",
            json!({"entity_id": "light.hall"}),
            Context::new(),
        );
        assert_eq!(single.service_id(), "light.turn_on");
        assert_eq!(single.entity_ids(), vec!["light.hall"]);

        let many = ServiceCall::new(
            "switch",
            "turn_off",
            json!({"entity_id": ["switch.siren_a", "switch.siren_b"]}),
            Context::new(),
        );
        assert_eq!(many.entity_ids().len(), 2);

        let none = ServiceCall::new("notify", "phone", json!({"message": "x"}), Context::new());
        assert!(none.entity_ids().is_empty());
        assert_eq!(none.get::<String>("message").as_deref(), Some("x"));
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::NotFound {
            domain: "tts".into(),
            service: "speak".into(),
        };
        assert_eq!(err.to_string(), "Service not found: tts.speak");
    }
}
