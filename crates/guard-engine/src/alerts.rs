//! Alert aggregation
//!
//! Evaluates monitored sensors and buckets the alerting ones by alarm
//! category. Purely observational: thresholds are applied by the engine.

use chrono::{DateTime, Duration, Utc};
use guard_config::{AlarmSettings, ArmingProfile};
use guard_core::{EntityId, Host};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use crate::classify::{is_numeric_class, AlarmCategory, SemanticType};
use crate::error::EngineResult;
use crate::monitor::MonitorRegistry;
use crate::policy::setting_seconds;
use crate::sensor::Sensor;

/// Normal state of a binary sensor
pub const DESIRED_STATE: &str = guard_core::STATE_OFF;

/// Alerting sensors by category, in evaluation order
///
/// Rebuilt from scratch on every evaluation. A sensor is listed under at most
/// one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alerts {
    by_category: IndexMap<AlarmCategory, Vec<EntityId>>,
}

impl Alerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sensor` under `category` unless it is already listed anywhere
    pub fn insert(&mut self, category: AlarmCategory, sensor: EntityId) -> bool {
        if self.contains(&sensor) {
            return false;
        }
        self.by_category.entry(category).or_default().push(sensor);
        true
    }

    pub fn get(&self, category: AlarmCategory) -> &[EntityId] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count_of(&self, category: AlarmCategory) -> usize {
        self.get(category).len()
    }

    /// Total number of alerting sensors
    pub fn count(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn contains(&self, sensor: &EntityId) -> bool {
        self.by_category.values().any(|s| s.contains(sensor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlarmCategory, &[EntityId])> {
        self.by_category.iter().map(|(c, s)| (*c, s.as_slice()))
    }

    pub fn sensors(&self) -> impl Iterator<Item = &EntityId> {
        self.by_category.values().flatten()
    }
}

/// Per-sensor evaluation settings
#[derive(Debug, Clone, Copy)]
pub struct AlertAggregator {
    fire_temperature_threshold: f64,
    opening_timeout: Duration,
    motion_timeout: Duration,
}

impl AlertAggregator {
    pub fn new(fire_temperature_threshold: f64, opening_timeout: Duration, motion_timeout: Duration) -> Self {
        Self {
            fire_temperature_threshold,
            opening_timeout,
            motion_timeout,
        }
    }

    pub fn from_settings(settings: &AlarmSettings) -> EngineResult<Self> {
        Ok(Self::new(
            settings.fire_temperature_threshold,
            setting_seconds("alarm.opening_timeout", settings.opening_timeout)?,
            setting_seconds("alarm.motion_timeout", settings.motion_timeout)?,
        ))
    }

    /// Debounce used when the caller does not give one
    pub fn default_timeout(&self, semantic_type: Option<SemanticType>) -> Option<Duration> {
        match semantic_type {
            Some(SemanticType::Motion) => Some(self.motion_timeout),
            Some(SemanticType::Door) | Some(SemanticType::Window) => Some(self.opening_timeout),
            _ => None,
        }
    }

    /// Whether `sensor` is alerting at `now`
    ///
    /// `timeout` overrides the per-type debounce; `Some(Duration::zero())`
    /// disables it. Invalid readings and unparsable measurements are never
    /// alerting.
    pub fn evaluate_sensor(
        &self,
        sensor: &Sensor,
        desired_state: &str,
        timeout: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        if sensor.is_invalid() {
            warn!(
                entity_id = %sensor.id,
                state = %sensor.current_state,
                "Sensor is in an invalid state"
            );
            return false;
        }

        if sensor.device_class.as_deref().is_some_and(is_numeric_class) {
            return match sensor.current_state.trim().parse::<f64>() {
                Ok(value) if value > self.fire_temperature_threshold => {
                    warn!(
                        entity_id = %sensor.id,
                        value,
                        threshold = self.fire_temperature_threshold,
                        "Sensor exceeds the fire temperature threshold"
                    );
                    true
                }
                Ok(value) => {
                    trace!(entity_id = %sensor.id, value, "Temperature within range");
                    false
                }
                Err(_) => {
                    warn!(
                        entity_id = %sensor.id,
                        state = %sensor.current_state,
                        "Sensor reading is not numeric"
                    );
                    false
                }
            };
        }

        if sensor.current_state == desired_state {
            trace!(entity_id = %sensor.id, "Sensor in desired state");
            return false;
        }

        let timeout = timeout.or_else(|| self.default_timeout(sensor.semantic_type()));
        if let Some(timeout) = timeout {
            let held = sensor.unchanged_for(now);
            if held < timeout {
                debug!(
                    entity_id = %sensor.id,
                    state = %sensor.current_state,
                    held_secs = held.num_milliseconds() as f64 / 1000.0,
                    timeout_secs = timeout.num_seconds(),
                    "Sensor changed within the debounce window"
                );
                return false;
            }
        }

        warn!(
            entity_id = %sensor.id,
            state = %sensor.current_state,
            expected = desired_state,
            "Sensor is in an unexpected state"
        );
        true
    }

    /// Evaluate every monitored sensor of `profile` (plus `always`)
    pub fn collect_alerts<H: Host + ?Sized>(
        &self,
        host: &H,
        registry: &MonitorRegistry,
        profile: Option<ArmingProfile>,
        ignored: &IndexSet<EntityId>,
        timeout: Option<Duration>,
    ) -> Alerts {
        let now = host.now();
        let mut alerts = Alerts::new();

        for id in registry.monitored_sensors(profile, ignored) {
            let Some(sensor) = Sensor::read(host, &id) else {
                warn!(entity_id = %id, "Monitored sensor is unknown to the host");
                continue;
            };
            let Some(category) = sensor.alarm_category() else {
                debug!(
                    entity_id = %id,
                    device_class = ?sensor.device_class,
                    "Skipping sensor without an alarm category"
                );
                continue;
            };
            if self.evaluate_sensor(&sensor, DESIRED_STATE, timeout, now) {
                alerts.insert(category, id);
            }
        }

        if !alerts.is_empty() {
            debug!(profile = ?profile, count = alerts.count(), "Collected alerts");
        }
        alerts
    }

    pub fn count_alerts<H: Host + ?Sized>(
        &self,
        host: &H,
        registry: &MonitorRegistry,
        profile: Option<ArmingProfile>,
        ignored: &IndexSet<EntityId>,
        timeout: Option<Duration>,
    ) -> usize {
        self.collect_alerts(host, registry, profile, ignored, timeout)
            .count()
    }
}
