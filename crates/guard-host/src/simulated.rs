//! Built-in service handlers emulating the devices homeguard drives
//!
//! Enough behaviour for the binary to run end-to-end without an external
//! host: the alarm panel changes state on request, lights/switches/sirens
//! toggle, and notification services log what they would deliver.

use guard_core::{attrs, EntityId, ServiceCall, ServiceError};
use serde_json::json;
use tracing::{debug, info};

use crate::services::ServiceRegistry;
use crate::store::StateStore;

/// Panel attribute holding the PIN a simulated panel insists on
pub(crate) const PANEL_CODE_ATTR: &str = "code";

fn target_ids(call: &ServiceCall) -> Result<Vec<EntityId>, ServiceError> {
    let ids = call.entity_ids();
    if ids.is_empty() {
        return Err(ServiceError::InvalidData(format!(
            "{} requires entity_id",
            call.service_id()
        )));
    }
    ids.iter()
        .map(|id| {
            id.parse()
                .map_err(|e| ServiceError::InvalidData(format!("{id}: {e}")))
        })
        .collect()
}

fn register_panel_service(registry: &ServiceRegistry, service: &'static str, target: &'static str) {
    registry.register("alarm_control_panel", service, move |call, store, now| {
        for id in target_ids(call)? {
            let current = store.get(&id);
            let required = current
                .as_ref()
                .and_then(|s| s.attribute_str(PANEL_CODE_ATTR).map(str::to_string));
            if let Some(required) = required {
                let given: Option<String> = call.get("code");
                if given.as_deref() != Some(required.as_str()) {
                    return Err(ServiceError::CallFailed(format!("invalid code for {id}")));
                }
            }
            store.set_value(id, target, call.context.child(), now);
        }
        Ok(())
    });
}

fn register_toggle_domain(registry: &ServiceRegistry, domain: &'static str) {
    registry.register(domain, "turn_on", |call, store, now| {
        for id in target_ids(call)? {
            let mut attributes = store.get(&id).map(|s| s.attributes).unwrap_or_default();
            if let Some(pct) = call.get::<f64>("brightness_pct") {
                let level = (pct.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u64;
                attributes.insert(attrs::BRIGHTNESS.to_string(), json!(level));
            }
            if let Some(rgb) = call.service_data.get(attrs::RGB_COLOR) {
                attributes.insert(attrs::RGB_COLOR.to_string(), rgb.clone());
            }
            store.set(id, "on", attributes, call.context.child(), now);
        }
        Ok(())
    });
    registry.register(domain, "turn_off", |call, store, now| {
        for id in target_ids(call)? {
            store.set_value(id, "off", call.context.child(), now);
        }
        Ok(())
    });
    registry.register(domain, "toggle", |call, store, now| {
        for id in target_ids(call)? {
            let next = if store.is_state(&id, "on") { "off" } else { "on" };
            store.set_value(id, next, call.context.child(), now);
        }
        Ok(())
    });
}

fn log_delivery(call: &ServiceCall, _: &StateStore) -> Result<(), ServiceError> {
    let message: String = call.get("message").unwrap_or_default();
    info!(service = %call.service_id(), %message, "Delivering notification");
    Ok(())
}

/// Register every simulated domain on `registry`
pub fn register_simulated_services(registry: &ServiceRegistry) {
    for (service, target) in [
        ("alarm_arm_home", "armed_home"),
        ("alarm_arm_away", "armed_away"),
        ("alarm_arm_night", "armed_night"),
        ("alarm_arm_vacation", "armed_vacation"),
        ("alarm_disarm", "disarmed"),
        ("alarm_trigger", "triggered"),
    ] {
        register_panel_service(registry, service, target);
    }

    for domain in ["light", "switch", "siren", "input_boolean"] {
        register_toggle_domain(registry, domain);
    }

    registry.register("media_player", "volume_set", |call, _, _| {
        let level: f64 = call.get("volume_level").unwrap_or_default();
        debug!(entity_ids = ?call.entity_ids(), level, "Setting volume");
        Ok(())
    });
    registry.register("notify", "*", |call, store, _| log_delivery(call, store));
    registry.register("tts", "speak", |call, store, _| log_delivery(call, store));
    registry.register("persistent_notification", "create", |call, store, _| {
        log_delivery(call, store)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeBus;
    use chrono::Utc;
    use guard_core::Context;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn setup() -> (ServiceRegistry, StateStore) {
        let registry = ServiceRegistry::new();
        register_simulated_services(&registry);
        (registry, StateStore::new(Arc::new(ChangeBus::new())))
    }

    #[test]
    fn test_panel_follows_requests() {
        let (registry, store) = setup();
        let panel: EntityId = "alarm_control_panel.home_alarm".parse().unwrap();
        store.set(panel.clone(), "disarmed", HashMap::new(), Context::new(), Utc::now());

        registry
            .call(
                "alarm_control_panel",
                "alarm_arm_away",
                json!({"entity_id": panel.to_string()}),
                &store,
                Utc::now(),
            )
            .unwrap();
        assert!(store.is_state(&panel, "armed_away"));
        let armed = store.get(&panel).unwrap();
        assert!(armed.context.parent_id.is_some());

        registry
            .call(
                "alarm_control_panel",
                "alarm_trigger",
                json!({"entity_id": panel.to_string()}),
                &store,
                Utc::now(),
            )
            .unwrap();
        assert!(store.is_state(&panel, "triggered"));
    }

    #[test]
    fn test_panel_rejects_wrong_code() {
        let (registry, store) = setup();
        let panel: EntityId = "alarm_control_panel.home_alarm".parse().unwrap();
        let attrs = HashMap::from([(PANEL_CODE_ATTR.to_string(), json!("1234"))]);
        store.set(panel.clone(), "armed_home", attrs, Context::new(), Utc::now());

        let wrong = registry.call(
            "alarm_control_panel",
            "alarm_disarm",
            json!({"entity_id": panel.to_string(), "code": "0000"}),
            &store,
            Utc::now(),
        );
        assert!(matches!(wrong, Err(ServiceError::CallFailed(_))));
        assert!(store.is_state(&panel, "armed_home"));

        registry
            .call(
                "alarm_control_panel",
                "alarm_disarm",
                json!({"entity_id": panel.to_string(), "code": "1234"}),
                &store,
                Utc::now(),
            )
            .unwrap();
        assert!(store.is_state(&panel, "disarmed"));
    }

    #[test]
    fn test_light_brightness_and_color() {
        let (registry, store) = setup();
        registry
            .call(
                "light",
                "turn_on",
                json!({"entity_id": ["light.hall", "light.porch"], "brightness_pct": 50, "rgb_color": [0, 255, 0]}),
                &store,
                Utc::now(),
            )
            .unwrap();

        let hall = store.get(&"light.hall".parse().unwrap()).unwrap();
        assert!(hall.is_on());
        assert_eq!(hall.attribute::<u64>("brightness"), Some(128));
        assert_eq!(hall.attribute::<Vec<u8>>("rgb_color"), Some(vec![0, 255, 0]));

        registry
            .call("light", "toggle", json!({"entity_id": "light.porch"}), &store, Utc::now())
            .unwrap();
        assert!(store.is_state(&"light.porch".parse().unwrap(), "off"));
    }

    #[test]
    fn test_missing_target_is_invalid() {
        let (registry, store) = setup();
        let result = registry.call("switch", "turn_on", json!({}), &store, Utc::now());
        assert!(matches!(result, Err(ServiceError::InvalidData(_))));
        assert!(registry
            .call("notify", "family", json!({"message": "hi"}), &store, Utc::now())
            .is_ok());
    }
}
