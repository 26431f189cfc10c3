//! Test house: a simulated host, a manual clock and an initialized engine
//!
//! Every test starts on 2026-03-02 at 12:00 UTC with the local offset at zero.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use guard_config::GuardConfig;
use guard_core::{EntityId, ServiceCall};
use guard_engine::AlarmEngine;
use guard_host::{Clock, HostRuntime, LocalHost};

/// House used by most tests
///
/// Doors and the hall motion detector guard away mode, the front door guards
/// home mode, and the kitchen temperature and basement water sensors are
/// watched in every mode.
pub const HOUSE: &str = r#"
alarm:
  panel: alarm_control_panel.home_alarm
  profiles:
    always:
      hazards:
        - sensor.kitchen_temperature
        - binary_sensor.basement_water
    armed_home:
      perimeter:
        - binary_sensor.front_door
    armed_away:
      perimeter:
        - binary_sensor.front_door
        - binary_sensor.back_door
      inside:
        - binary_sensor.hall_motion
  alarm_lights: [light.hall]
  burglar_sirens: [switch.siren]
  fire_sirens: [siren.smoke]
  buttons: [sensor.hall_button]
  vacuum_cleaners: [vacuum.robot]
  guest_control: input_boolean.guests
  vacation_control: input_boolean.vacation
  silent_control: input_boolean.silent
presence:
  device_trackers: [device_tracker.alice]
notify:
  services: [mobile_app_phone]
  media_players: [media_player.kitchen]
simulation:
  - entity_id: alarm_control_panel.home_alarm
    state: disarmed
  - entity_id: binary_sensor.front_door
    state: "off"
    attributes: { device_class: door, friendly_name: Front Door }
  - entity_id: binary_sensor.back_door
    state: "off"
    attributes: { device_class: door, friendly_name: Back Door }
  - entity_id: binary_sensor.hall_motion
    state: "off"
    attributes: { device_class: motion, friendly_name: Hall Motion Detector }
  - entity_id: sensor.kitchen_temperature
    state: "21.5"
    attributes: { device_class: temperature, friendly_name: Kitchen Temperature }
  - entity_id: binary_sensor.basement_water
    state: "off"
    attributes: { device_class: moisture, friendly_name: Basement Water }
  - entity_id: light.hall
    state: "off"
  - entity_id: switch.siren
    state: "off"
  - entity_id: siren.smoke
    state: "off"
  - entity_id: vacuum.robot
    state: docked
  - entity_id: input_boolean.guests
    state: "off"
  - entity_id: input_boolean.vacation
    state: "off"
  - entity_id: input_boolean.silent
    state: "off"
  - entity_id: device_tracker.alice
    state: home
    attributes: { friendly_name: Alice }
  - entity_id: sensor.hall_button
    state: idle
    attributes: { friendly_name: Hall Button }
"#;

pub const PANEL: &str = "alarm_control_panel.home_alarm";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

pub fn id(s: &str) -> EntityId {
    s.parse().expect("valid entity id")
}

pub struct TestHouse {
    pub host: Arc<LocalHost>,
    pub runtime: HostRuntime,
    pub engine: AlarmEngine<LocalHost>,
}

impl TestHouse {
    /// Build the default house, with `overrides` written before the engine
    /// starts
    pub fn new(overrides: &[(&str, &str)]) -> Self {
        Self::from_yaml(HOUSE, overrides)
    }

    pub fn from_yaml(yaml: &str, overrides: &[(&str, &str)]) -> Self {
        let config: GuardConfig = serde_yaml::from_str(yaml).expect("test config parses");
        let host = Arc::new(LocalHost::simulated(
            Clock::manual(start_time()),
            FixedOffset::east_opt(0).unwrap(),
        ));
        host.seed(&config.simulation);
        for (entity, state) in overrides {
            host.set_value(&id(entity), state);
        }

        let runtime = HostRuntime::new(Arc::clone(&host));
        let mut engine = AlarmEngine::new(Arc::clone(&host), &config).expect("engine builds");
        engine.initialize();

        let mut house = Self {
            host,
            runtime,
            engine,
        };
        house.pump();
        house.host.clear_service_calls();
        house
    }

    pub fn pump(&mut self) -> usize {
        self.runtime.pump(&mut self.engine)
    }

    pub fn advance(&mut self, seconds: i64) -> usize {
        self.runtime
            .advance(&mut self.engine, Duration::seconds(seconds))
    }

    /// Write a state value as the outside world would, then deliver it
    pub fn set(&mut self, entity: &str, state: &str) {
        self.host.set_value(&id(entity), state);
        self.pump();
    }

    pub fn set_with(&mut self, entity: &str, state: &str, attributes: serde_json::Value) {
        let attributes: HashMap<String, serde_json::Value> =
            serde_json::from_value(attributes).expect("attributes are an object");
        self.host.set_state(&id(entity), state, attributes);
        self.pump();
    }

    /// Press the hall button with `event_type`; `seq` makes the state unique
    pub fn press(&mut self, event_type: &str, seq: u32) {
        self.set_with(
            "sensor.hall_button",
            &format!("press_{seq}"),
            serde_json::json!({ "event_type": event_type, "friendly_name": "Hall Button" }),
        );
    }

    pub fn state_of(&self, entity: &str) -> Option<String> {
        self.host.store().get(&id(entity)).map(|s| s.state)
    }

    pub fn panel(&self) -> String {
        self.state_of(PANEL).unwrap_or_default()
    }

    pub fn calls(&self, service_id: &str) -> Vec<ServiceCall> {
        self.host
            .service_calls()
            .into_iter()
            .filter(|c| c.service_id() == service_id)
            .collect()
    }

    /// Services called on the panel, in order
    pub fn panel_requests(&self) -> Vec<String> {
        self.host
            .service_calls()
            .into_iter()
            .filter(|c| c.domain == "alarm_control_panel")
            .map(|c| c.service)
            .collect()
    }

    /// Messages pushed to the phone
    pub fn notifications(&self) -> Vec<String> {
        self.calls("notify.mobile_app_phone")
            .iter()
            .filter_map(|c| c.get::<String>("message"))
            .collect()
    }

    pub fn was_notified(&self, needle: &str) -> bool {
        self.notifications().iter().any(|m| m.contains(needle))
    }
}
