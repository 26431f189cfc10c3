//! Sensor classification
//!
//! Pure lookups from a host-reported `device_class` to what the sensor is
//! (its semantic type) and what kind of emergency it signals (its alarm
//! category). Classes missing from both tables are not monitored at all.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a sensor physically observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Door,
    Window,
    Motion,
    Tamper,
    Environmental,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Door => "door",
            SemanticType::Window => "window",
            SemanticType::Motion => "motion",
            SemanticType::Tamper => "tamper",
            SemanticType::Environmental => "environmental",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The class of emergency an alerting sensor implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCategory {
    Burglar,
    Fire,
    Water,
    Safety,
}

impl AlarmCategory {
    pub const ALL: [AlarmCategory; 4] = [
        AlarmCategory::Burglar,
        AlarmCategory::Fire,
        AlarmCategory::Water,
        AlarmCategory::Safety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmCategory::Burglar => "burglar",
            AlarmCategory::Fire => "fire",
            AlarmCategory::Water => "water",
            AlarmCategory::Safety => "safety",
        }
    }

    /// Translation key of the leading sentence of an alarm message
    pub fn alert_key(&self) -> &'static str {
        match self {
            AlarmCategory::Burglar => "burglar_alert",
            AlarmCategory::Fire => "fire_alert",
            AlarmCategory::Water => "water_alert",
            AlarmCategory::Safety => "safety_alert",
        }
    }
}

impl fmt::Display for AlarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SENSOR_TYPES: &[(SemanticType, &[&str])] = &[
    (SemanticType::Door, &["door", "garage_door", "opening"]),
    (SemanticType::Window, &["window"]),
    (SemanticType::Motion, &["motion", "moving", "occupancy", "presence"]),
    (SemanticType::Tamper, &["tamper", "sound", "vibration"]),
    (
        SemanticType::Environmental,
        &[
            "carbon_monoxide",
            "gas",
            "heat",
            "moisture",
            "smoke",
            "safety",
            "temperature",
        ],
    ),
];

const ALARM_CATEGORIES: &[(AlarmCategory, &[&str])] = &[
    (
        AlarmCategory::Burglar,
        &[
            "door",
            "garage_door",
            "opening",
            "window",
            "motion",
            "moving",
            "occupancy",
            "presence",
            "tamper",
            "sound",
            "vibration",
        ],
    ),
    (
        AlarmCategory::Fire,
        &["carbon_monoxide", "gas", "heat", "smoke", "temperature"],
    ),
    (AlarmCategory::Water, &["moisture"]),
    (AlarmCategory::Safety, &["safety"]),
];

/// Classes whose state is a measurement compared against a threshold
const NUMERIC_CLASSES: &[&str] = &["temperature"];

pub fn classify_sensor_type(device_class: &str) -> Option<SemanticType> {
    SENSOR_TYPES
        .iter()
        .find(|(_, keywords)| keywords.contains(&device_class))
        .map(|(t, _)| *t)
}

pub fn classify_alarm_category(device_class: &str) -> Option<AlarmCategory> {
    ALARM_CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.contains(&device_class))
        .map(|(c, _)| *c)
}

pub fn is_numeric_class(device_class: &str) -> bool {
    NUMERIC_CLASSES.contains(&device_class)
}
