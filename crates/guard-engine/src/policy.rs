//! Automatic arming policy and time windows

use chrono::{DateTime, Duration, NaiveTime, Utc};
use guard_config::{AlarmSettings, AutoArmSettings, NightSettings};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::panel::ArmMode;

/// Parse "HH:MM:SS" or "HH:MM"
pub fn parse_time(s: &str) -> EngineResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| EngineError::InvalidTime {
            value: s.to_string(),
        })
}

/// A whole-second setting as a `Duration`
pub fn setting_seconds(key: &str, secs: u64) -> EngineResult<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| EngineError::InvalidSetting {
            key: key.to_string(),
            reason: format!("{secs} seconds is out of range"),
        })
}

/// A daily local-time window; `start > end` wraps past midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl NightWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> EngineResult<Self> {
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }

    /// Start inclusive, end exclusive
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Quiet hours for normal-priority notifications
///
/// The window starts earlier before a workday and ends earlier on one.
#[derive(Debug, Clone, Copy)]
pub struct NotificationNight {
    regular: NightWindow,
    workday: NightWindow,
}

impl NotificationNight {
    pub fn from_settings(settings: &NightSettings) -> EngineResult<Self> {
        Ok(Self {
            regular: NightWindow::parse(&settings.start, &settings.end)?,
            workday: NightWindow::parse(&settings.start_workday, &settings.end_workday)?,
        })
    }

    pub fn window_for(&self, today_workday: bool, tomorrow_workday: bool) -> NightWindow {
        NightWindow {
            start: if tomorrow_workday {
                self.workday.start
            } else {
                self.regular.start
            },
            end: if today_workday {
                self.workday.end
            } else {
                self.regular.end
            },
        }
    }
}

/// Household facts the policy decides on, read fresh for every decision
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    pub now: DateTime<Utc>,
    /// Local wall-clock time
    pub local_time: NaiveTime,
    /// A tracker is home or guest mode is on
    pub somebody_home: bool,
    pub guest_mode: bool,
    pub vacation_mode: bool,
    pub last_disarm: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ArmingPolicy {
    auto_arm: AutoArmSettings,
    arm_night: NightWindow,
    disarm_cooldown: Duration,
}

impl ArmingPolicy {
    pub fn new(auto_arm: AutoArmSettings, arm_night: NightWindow, disarm_cooldown: Duration) -> Self {
        Self {
            auto_arm,
            arm_night,
            disarm_cooldown,
        }
    }

    pub fn from_settings(settings: &AlarmSettings) -> EngineResult<Self> {
        Ok(Self::new(
            settings.auto_arm,
            NightWindow::parse(&settings.arm_night_start, &settings.arm_night_end)?,
            setting_seconds("alarm.disarm_cooldown", settings.disarm_cooldown)?,
        ))
    }

    pub fn arm_night_window(&self) -> &NightWindow {
        &self.arm_night
    }

    pub fn is_last_disarm_recent(&self, last_disarm: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_disarm.is_some_and(|at| now - at < self.disarm_cooldown)
    }

    pub fn is_auto_arming_allowed(&self, ctx: &PolicyContext) -> bool {
        if self.is_last_disarm_recent(ctx.last_disarm, ctx.now) {
            debug!("Last disarm was too recent for automatic arming");
            return false;
        }
        if ctx.guest_mode {
            debug!("Guest mode blocks automatic arming");
            return false;
        }
        if ctx.vacation_mode {
            return self.auto_arm.vacation;
        }
        if ctx.somebody_home {
            if self.arm_night.contains(ctx.local_time) {
                return self.auto_arm.night;
            }
            return self.auto_arm.home;
        }
        self.auto_arm.away
    }

    /// Advisory mode the house should be in right now
    pub fn desired_arming_state(&self, ctx: &PolicyContext) -> ArmMode {
        if ctx.vacation_mode {
            ArmMode::Vacation
        } else if ctx.somebody_home && self.arm_night.contains(ctx.local_time) {
            ArmMode::Night
        } else if ctx.somebody_home {
            ArmMode::Home
        } else {
            ArmMode::Away
        }
    }
}
