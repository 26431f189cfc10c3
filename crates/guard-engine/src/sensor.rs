//! Point-in-time view of a monitored sensor

use chrono::{DateTime, Duration, Utc};
use guard_core::{EntityId, Host, State};

use crate::classify::{classify_alarm_category, classify_sensor_type, AlarmCategory, SemanticType};

/// A sensor as read from the host
///
/// Classification is derived from `device_class` on every call and never
/// cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: EntityId,
    pub device_class: Option<String>,
    pub current_state: String,
    pub last_changed: DateTime<Utc>,
    pub name: String,
}

impl Sensor {
    pub fn from_state(state: &State) -> Self {
        Self {
            id: state.entity_id.clone(),
            device_class: state.device_class().map(str::to_string),
            current_state: state.state.clone(),
            last_changed: state.last_changed,
            name: state.display_name(),
        }
    }

    /// `None` when the host does not know the entity
    pub fn read<H: Host + ?Sized>(host: &H, id: &EntityId) -> Option<Self> {
        host.get_state(id).map(|s| Self::from_state(&s))
    }

    pub fn semantic_type(&self) -> Option<SemanticType> {
        self.device_class.as_deref().and_then(classify_sensor_type)
    }

    pub fn alarm_category(&self) -> Option<AlarmCategory> {
        self.device_class.as_deref().and_then(classify_alarm_category)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(
            self.current_state.as_str(),
            "" | guard_core::STATE_UNKNOWN | guard_core::STATE_UNAVAILABLE
        )
    }

    pub fn is_on(&self) -> bool {
        self.current_state == guard_core::STATE_ON
    }

    pub fn unchanged_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_changed).max(Duration::zero())
    }
}
