//! Typed homeguard settings
//!
//! Every field has a serde default so that a minimal `homeguard.yaml` only
//! needs the panel and the sensor lists.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use guard_core::EntityId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// File name looked up inside the config directory
pub const CONFIG_FILE: &str = "homeguard.yaml";

/// Named set of sensors watched under one security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmingProfile {
    Disarmed,
    ArmedHome,
    ArmedAway,
    ArmedNight,
    ArmedVacation,
    /// Watched in every mode (fire, water)
    Always,
}

impl ArmingProfile {
    pub const ALL: [ArmingProfile; 6] = [
        ArmingProfile::Disarmed,
        ArmingProfile::ArmedHome,
        ArmingProfile::ArmedAway,
        ArmingProfile::ArmedNight,
        ArmingProfile::ArmedVacation,
        ArmingProfile::Always,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArmingProfile::Disarmed => "disarmed",
            ArmingProfile::ArmedHome => "armed_home",
            ArmingProfile::ArmedAway => "armed_away",
            ArmingProfile::ArmedNight => "armed_night",
            ArmingProfile::ArmedVacation => "armed_vacation",
            ArmingProfile::Always => "always",
        }
    }
}

impl fmt::Display for ArmingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group name (e.g. "doors", "image_processing") to ordered sensor ids
pub type ProfileGroups = IndexMap<String, Vec<EntityId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[serde(alias = "en")]
    English,
    #[serde(alias = "de")]
    German,
}

/// Root of `homeguard.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default)]
    pub alarm: AlarmSettings,
    #[serde(default)]
    pub presence: PresenceSettings,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub night: NightSettings,
    #[serde(default)]
    pub change: ChangeSettings,
    /// Initial entity states for the built-in local host
    #[serde(default)]
    pub simulation: Vec<SimulatedEntity>,
}

impl GuardConfig {
    /// Load `homeguard.yaml` from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), CONFIG_FILE)?;
        Self::from_yaml(&yaml)
    }

    /// Deserialize an already tag-resolved document; an empty document gives defaults
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        if yaml.is_null() {
            return Ok(Self::default());
        }
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        serde_yaml::from_value(yaml.clone()).map_err(|e| ConfigError::InvalidValue {
            key: "homeguard".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Panel, sensors, actuators and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmSettings {
    #[serde(default = "default_panel")]
    pub panel: EntityId,

    /// PIN sent with every panel request
    #[serde(default)]
    pub pin: Option<String>,

    #[serde(default)]
    pub profiles: IndexMap<ArmingProfile, ProfileGroups>,

    #[serde(default = "default_fire_temperature")]
    pub fire_temperature_threshold: f64,

    /// Debounce for door and window sensors (seconds)
    #[serde(default = "default_opening_timeout")]
    pub opening_timeout: u64,

    /// Debounce for motion sensors (seconds)
    #[serde(default = "default_motion_timeout")]
    pub motion_timeout: u64,

    /// Burglar threshold while armed home or night
    #[serde(default = "default_home_threshold")]
    pub home_threshold: usize,

    /// Burglar threshold while armed away or on vacation
    #[serde(default = "default_away_threshold")]
    pub away_threshold: usize,

    #[serde(default)]
    pub alarm_lights: Vec<EntityId>,
    #[serde(default)]
    pub burglar_sirens: Vec<EntityId>,
    #[serde(default)]
    pub fire_sirens: Vec<EntityId>,
    #[serde(default)]
    pub buttons: Vec<EntityId>,
    #[serde(default)]
    pub vacuum_cleaners: Vec<EntityId>,

    /// Radio bridge that must be connected before alerts count
    #[serde(default)]
    pub bridge_sensor: Option<EntityId>,
    #[serde(default = "default_bridge_settle_time")]
    pub bridge_settle_time: u64,

    #[serde(default)]
    pub silent_control: Option<EntityId>,
    #[serde(default)]
    pub guest_control: Option<EntityId>,
    #[serde(default)]
    pub vacation_control: Option<EntityId>,

    #[serde(default = "default_flash_max_count")]
    pub flash_max_count: u32,
    #[serde(default = "default_media_max_count")]
    pub media_max_count: u32,
    #[serde(default = "default_media_initial_delay")]
    pub media_initial_delay: u64,
    #[serde(default = "default_media_repeat_delay")]
    pub media_repeat_delay: u64,

    /// No automatic arming this long after a disarm (seconds)
    #[serde(default = "default_disarm_cooldown")]
    pub disarm_cooldown: u64,
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval: u64,

    #[serde(default)]
    pub auto_arm: AutoArmSettings,

    /// "HH:MM" or "HH:MM:SS", local time
    #[serde(default = "default_arm_night_start")]
    pub arm_night_start: String,
    #[serde(default = "default_arm_night_end")]
    pub arm_night_end: String,
}

impl AlarmSettings {
    pub fn groups(&self, profile: ArmingProfile) -> Option<&ProfileGroups> {
        self.profiles.get(&profile)
    }
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            panel: default_panel(),
            pin: None,
            profiles: IndexMap::new(),
            fire_temperature_threshold: default_fire_temperature(),
            opening_timeout: default_opening_timeout(),
            motion_timeout: default_motion_timeout(),
            home_threshold: default_home_threshold(),
            away_threshold: default_away_threshold(),
            alarm_lights: Vec::new(),
            burglar_sirens: Vec::new(),
            fire_sirens: Vec::new(),
            buttons: Vec::new(),
            vacuum_cleaners: Vec::new(),
            bridge_sensor: None,
            bridge_settle_time: default_bridge_settle_time(),
            silent_control: None,
            guest_control: None,
            vacation_control: None,
            flash_max_count: default_flash_max_count(),
            media_max_count: default_media_max_count(),
            media_initial_delay: default_media_initial_delay(),
            media_repeat_delay: default_media_repeat_delay(),
            disarm_cooldown: default_disarm_cooldown(),
            periodic_interval: default_periodic_interval(),
            auto_arm: AutoArmSettings::default(),
            arm_night_start: default_arm_night_start(),
            arm_night_end: default_arm_night_end(),
        }
    }
}

/// Which automatic arming transitions are permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoArmSettings {
    #[serde(default)]
    pub home: bool,
    #[serde(default = "default_true")]
    pub away: bool,
    #[serde(default = "default_true")]
    pub night: bool,
    #[serde(default = "default_true")]
    pub vacation: bool,
}

impl Default for AutoArmSettings {
    fn default() -> Self {
        Self {
            home: false,
            away: true,
            night: true,
            vacation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSettings {
    #[serde(default)]
    pub device_trackers: Vec<EntityId>,
    /// A tracker must stay away this long before it counts as gone (seconds)
    #[serde(default = "default_leave_hold")]
    pub leave_hold: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            device_trackers: Vec::new(),
            leave_hold: default_leave_hold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default)]
    pub language: Language,
    /// Services under the `notify` domain, e.g. "mobile_app_phone"
    #[serde(default)]
    pub services: Vec<String>,
    /// Speakers for spoken warnings
    #[serde(default)]
    pub media_players: Vec<EntityId>,
}

/// Quiet hours for normal-priority notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightSettings {
    #[serde(default = "default_night_start")]
    pub start: String,
    #[serde(default = "default_night_end")]
    pub end: String,
    #[serde(default = "default_night_start_workday")]
    pub start_workday: String,
    #[serde(default = "default_night_end_workday")]
    pub end_workday: String,
    /// `on` when today is a workday
    #[serde(default)]
    pub workday_sensor: Option<EntityId>,
    /// `on` when tomorrow is a workday
    #[serde(default)]
    pub workday_tomorrow_sensor: Option<EntityId>,
}

impl Default for NightSettings {
    fn default() -> Self {
        Self {
            start: default_night_start(),
            end: default_night_end(),
            start_workday: default_night_start_workday(),
            end_workday: default_night_end_workday(),
            workday_sensor: None,
            workday_tomorrow_sensor: None,
        }
    }
}

/// Echo suppression timeouts (seconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChangeSettings {
    #[serde(default = "default_internal_change_timeout")]
    pub internal_change_timeout: f64,
    #[serde(default = "default_external_change_timeout")]
    pub external_change_timeout: f64,
}

impl Default for ChangeSettings {
    fn default() -> Self {
        Self {
            internal_change_timeout: default_internal_change_timeout(),
            external_change_timeout: default_external_change_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedEntity {
    pub entity_id: EntityId,
    pub state: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_panel() -> EntityId {
    EntityId::new("alarm_control_panel", "home_alarm").expect("default panel id is valid")
}

fn default_fire_temperature() -> f64 {
    50.0
}

fn default_opening_timeout() -> u64 {
    30
}

fn default_motion_timeout() -> u64 {
    300
}

fn default_home_threshold() -> usize {
    1
}

fn default_away_threshold() -> usize {
    2
}

fn default_bridge_settle_time() -> u64 {
    300
}

fn default_flash_max_count() -> u32 {
    60
}

fn default_media_max_count() -> u32 {
    30
}

fn default_media_initial_delay() -> u64 {
    10
}

fn default_media_repeat_delay() -> u64 {
    10
}

fn default_disarm_cooldown() -> u64 {
    600
}

fn default_periodic_interval() -> u64 {
    600
}

fn default_arm_night_start() -> String {
    "23:15".to_string()
}

fn default_arm_night_end() -> String {
    "06:00".to_string()
}

fn default_leave_hold() -> u64 {
    300
}

fn default_night_start() -> String {
    "23:15".to_string()
}

fn default_night_end() -> String {
    "08:30".to_string()
}

fn default_night_start_workday() -> String {
    "22:15".to_string()
}

fn default_night_end_workday() -> String {
    "06:30".to_string()
}

fn default_internal_change_timeout() -> f64 {
    10.0
}

fn default_external_change_timeout() -> f64 {
    7200.0
}
