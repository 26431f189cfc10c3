//! Alarm control panel protocol
//!
//! The panel owns the alarm state. The engine observes it through state
//! changes and asks for transitions with service calls on the
//! `alarm_control_panel` domain.

use std::fmt;
use std::str::FromStr;

use guard_config::ArmingProfile;
use serde::{Deserialize, Serialize};

pub const PANEL_DOMAIN: &str = "alarm_control_panel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelState {
    Disarmed,
    Arming,
    Pending,
    Triggered,
    ArmedHome,
    ArmedAway,
    ArmedNight,
    ArmedVacation,
}

impl PanelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelState::Disarmed => "disarmed",
            PanelState::Arming => "arming",
            PanelState::Pending => "pending",
            PanelState::Triggered => "triggered",
            PanelState::ArmedHome => "armed_home",
            PanelState::ArmedAway => "armed_away",
            PanelState::ArmedNight => "armed_night",
            PanelState::ArmedVacation => "armed_vacation",
        }
    }

    pub fn is_armed(&self) -> bool {
        self.arm_mode().is_some()
    }

    pub fn arm_mode(&self) -> Option<ArmMode> {
        match self {
            PanelState::ArmedHome => Some(ArmMode::Home),
            PanelState::ArmedAway => Some(ArmMode::Away),
            PanelState::ArmedNight => Some(ArmMode::Night),
            PanelState::ArmedVacation => Some(ArmMode::Vacation),
            _ => None,
        }
    }

    /// Sensor profile watched in this state; transitional states have none
    pub fn profile(&self) -> Option<ArmingProfile> {
        match self {
            PanelState::Disarmed => Some(ArmingProfile::Disarmed),
            _ => self.arm_mode().map(ArmMode::profile),
        }
    }

    /// Translation key of the sentence announcing this state
    pub fn announcement_key(&self) -> String {
        format!("alarm_system_{}", self.as_str())
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "disarmed" => PanelState::Disarmed,
            "arming" => PanelState::Arming,
            "pending" => PanelState::Pending,
            "triggered" => PanelState::Triggered,
            "armed_home" => PanelState::ArmedHome,
            "armed_away" => PanelState::ArmedAway,
            "armed_night" => PanelState::ArmedNight,
            "armed_vacation" => PanelState::ArmedVacation,
            other => return Err(format!("unknown panel state '{other}'")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmMode {
    Home,
    Away,
    Night,
    Vacation,
}

impl ArmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmMode::Home => "home",
            ArmMode::Away => "away",
            ArmMode::Night => "night",
            ArmMode::Vacation => "vacation",
        }
    }

    pub fn panel_state(&self) -> PanelState {
        match self {
            ArmMode::Home => PanelState::ArmedHome,
            ArmMode::Away => PanelState::ArmedAway,
            ArmMode::Night => PanelState::ArmedNight,
            ArmMode::Vacation => PanelState::ArmedVacation,
        }
    }

    pub fn profile(self) -> ArmingProfile {
        match self {
            ArmMode::Home => ArmingProfile::ArmedHome,
            ArmMode::Away => ArmingProfile::ArmedAway,
            ArmMode::Night => ArmingProfile::ArmedNight,
            ArmMode::Vacation => ArmingProfile::ArmedVacation,
        }
    }
}

impl fmt::Display for ArmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition requested from the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Arm(ArmMode),
    Disarm,
    Trigger,
}

impl PanelAction {
    pub fn service(&self) -> &'static str {
        match self {
            PanelAction::Arm(ArmMode::Home) => "alarm_arm_home",
            PanelAction::Arm(ArmMode::Away) => "alarm_arm_away",
            PanelAction::Arm(ArmMode::Night) => "alarm_arm_night",
            PanelAction::Arm(ArmMode::Vacation) => "alarm_arm_vacation",
            PanelAction::Disarm => "alarm_disarm",
            PanelAction::Trigger => "alarm_trigger",
        }
    }
}
