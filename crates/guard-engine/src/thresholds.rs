//! Alert count needed per category before the alarm is triggered

use guard_config::AlarmSettings;

use crate::classify::AlarmCategory;
use crate::panel::{ArmMode, PanelState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdTable {
    pub burglar_home: usize,
    pub burglar_away: usize,
    pub fire: usize,
    pub water: usize,
    pub safety: usize,
}

impl ThresholdTable {
    pub fn from_settings(settings: &AlarmSettings) -> Self {
        Self {
            burglar_home: settings.home_threshold.max(1),
            burglar_away: settings.away_threshold.max(1),
            ..Self::default()
        }
    }

    /// Threshold for `category` in `state`, `None` when the category cannot
    /// trigger there
    ///
    /// Burglar and safety alerts only count while armed. A returning vacuum
    /// cleaner lowers the away threshold to a single sensor.
    pub fn threshold(
        &self,
        category: AlarmCategory,
        state: PanelState,
        vacuum_returning: bool,
    ) -> Option<usize> {
        match category {
            AlarmCategory::Fire => Some(self.fire),
            AlarmCategory::Water => Some(self.water),
            AlarmCategory::Safety => state.arm_mode().map(|_| self.safety),
            AlarmCategory::Burglar => match state.arm_mode()? {
                ArmMode::Home | ArmMode::Night => Some(self.burglar_home),
                ArmMode::Away | ArmMode::Vacation if vacuum_returning => Some(1),
                ArmMode::Away | ArmMode::Vacation => Some(self.burglar_away),
            },
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            burglar_home: 1,
            burglar_away: 2,
            fire: 1,
            water: 1,
            safety: 1,
        }
    }
}
