//! Host-reported state of a single entity

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{attrs, Context, EntityId, STATE_ON, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// The state of an entity at a point in time
///
/// Timestamps come from the host's clock rather than the wall clock so that a
/// manually driven clock produces consistent `last_changed` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// Raw state value (e.g. "on", "off", "armed_away", "23.5")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the value last differed from the previous one
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if unchanged
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create an updated state, preserving `last_changed` if the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
        now: DateTime<Utc>,
    ) -> Self {
        let new_state = new_state.into();
        let last_changed = if self.state != new_state {
            now
        } else {
            self.last_changed
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    /// "unknown", "unavailable" or empty
    pub fn is_invalid(&self) -> bool {
        self.state.is_empty() || self.state == STATE_UNKNOWN || self.state == STATE_UNAVAILABLE
    }

    pub fn is_on(&self) -> bool {
        self.state == STATE_ON
    }

    /// Time since the value last changed, never negative
    pub fn unchanged_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_changed).max(Duration::zero())
    }

    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn device_class(&self) -> Option<&str> {
        self.attribute_str(attrs::DEVICE_CLASS)
    }

    /// Friendly name, falling back to the object id with spaces
    pub fn display_name(&self) -> String {
        self.attribute_str(attrs::FRIENDLY_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| self.entity_id.fallback_name())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn door(state: &str) -> State {
        let mut attributes = HashMap::new();
        attributes.insert("device_class".to_string(), json!("door"));
        attributes.insert("friendly_name".to_string(), json!("Front Door"));
        State::new(
            "binary_sensor.front_door".parse().unwrap(),
            state,
            attributes,
            Context::new(),
            t(0),
        )
    }

    #[test]
    fn test_with_update_tracks_last_changed() {
        let off = door("off");
        let same = off.with_update("off", off.attributes.clone(), Context::new(), t(10));
        assert_eq!(same.last_changed, t(0));
        assert_eq!(same.last_updated, t(10));

        let on = same.with_update("on", same.attributes.clone(), Context::new(), t(20));
        assert_eq!(on.last_changed, t(20));
        assert_eq!(on.unchanged_for(t(50)).num_seconds(), 30);
        assert_eq!(on.unchanged_for(t(0)).num_seconds(), 0);
    }

    #[test]
    fn test_invalid_states() {
        assert!(door("unknown").is_invalid());
        assert!(door("unavailable").is_invalid());
        assert!(door("").is_invalid());
        assert!(!door("off").is_invalid());
        assert!(door("on").is_on());
    }

    #[test]
    fn test_attribute_helpers() {
        let s = door("off");
        assert_eq!(s.device_class(), Some("door"));
        assert_eq!(s.display_name(), "Front Door");

        let bare = State::new(
            "binary_sensor.back_door".parse().unwrap(),
            "off",
            HashMap::new(),
            Context::new(),
            t(0),
        );
        assert_eq!(bare.device_class(), None);
        assert_eq!(bare.display_name(), "back door");
    }
}
