//! Which sensors are watched under which arming profile

use chrono::Duration;
use guard_config::{AlarmSettings, ArmingProfile, ProfileGroups};
use guard_core::{EntityId, Host, ListenerId};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

/// Per-profile sensor groups plus the state listeners subscribed for them
///
/// `armed_night` falls back to the `armed_home` groups and `armed_vacation`
/// to the `armed_away` groups when they are not configured.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    profiles: IndexMap<ArmingProfile, ProfileGroups>,
    listeners: IndexMap<EntityId, ListenerId>,
}

impl MonitorRegistry {
    pub fn new(profiles: IndexMap<ArmingProfile, ProfileGroups>) -> Self {
        Self {
            profiles,
            listeners: IndexMap::new(),
        }
    }

    pub fn from_settings(settings: &AlarmSettings) -> Self {
        Self::new(settings.profiles.clone())
    }

    fn groups(&self, profile: ArmingProfile) -> Option<&ProfileGroups> {
        self.profiles.get(&profile).or_else(|| match profile {
            ArmingProfile::ArmedNight => self.profiles.get(&ArmingProfile::ArmedHome),
            ArmingProfile::ArmedVacation => self.profiles.get(&ArmingProfile::ArmedAway),
            _ => None,
        })
    }

    /// Sensors of one profile in configuration order, without duplicates
    pub fn profile_sensors(&self, profile: ArmingProfile) -> IndexSet<EntityId> {
        self.groups(profile)
            .map(|groups| groups.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// `always` sensors plus those of `profile`, minus `ignored`
    pub fn monitored_sensors(
        &self,
        profile: Option<ArmingProfile>,
        ignored: &IndexSet<EntityId>,
    ) -> Vec<EntityId> {
        let mut sensors = self.profile_sensors(ArmingProfile::Always);
        if let Some(profile) = profile.filter(|p| *p != ArmingProfile::Always) {
            sensors.extend(self.profile_sensors(profile));
        }
        sensors.retain(|s| !ignored.contains(s));
        sensors.into_iter().collect()
    }

    /// Whether `sensor` belongs to `always` or any of `profiles` and is not ignored
    pub fn is_monitored(
        &self,
        sensor: &EntityId,
        profiles: &[ArmingProfile],
        ignored: &IndexSet<EntityId>,
    ) -> bool {
        if ignored.contains(sensor) {
            return false;
        }
        std::iter::once(ArmingProfile::Always)
            .chain(profiles.iter().copied())
            .any(|p| {
                self.groups(p)
                    .is_some_and(|groups| groups.values().any(|g| g.contains(sensor)))
            })
    }

    /// Every configured sensor across all profiles
    pub fn all_sensors(&self) -> IndexSet<EntityId> {
        self.profiles
            .values()
            .flat_map(|groups| groups.values().flatten())
            .cloned()
            .collect()
    }

    pub fn contains(&self, sensor: &EntityId) -> bool {
        self.profiles
            .values()
            .any(|groups| groups.values().any(|g| g.contains(sensor)))
    }

    /// Subscribe one listener per sensor; sensors already subscribed are skipped
    ///
    /// `hold_for` gives the debounce hold a sensor's listener should use, so
    /// that a change is looked at again once it has outlasted the debounce.
    pub fn register_listeners<H, F>(&mut self, host: &H, hold_for: F) -> usize
    where
        H: Host + ?Sized,
        F: Fn(&EntityId) -> Option<Duration>,
    {
        let mut added = 0;
        for sensor in self.all_sensors() {
            if self.listeners.contains_key(&sensor) {
                debug!(entity_id = %sensor, "Already listening, skipping");
                continue;
            }
            let hold = hold_for(&sensor);
            let id = host.listen_state(&sensor, hold);
            info!(
                entity_id = %sensor,
                hold_secs = hold.map(|h| h.num_seconds()),
                "Monitoring sensor"
            );
            self.listeners.insert(sensor, id);
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn registry() -> MonitorRegistry {
        let mut profiles = IndexMap::new();
        profiles.insert(
            ArmingProfile::ArmedHome,
            ProfileGroups::from([(
                "doors".to_string(),
                vec![id("binary_sensor.front_door"), id("binary_sensor.back_door")],
            )]),
        );
        profiles.insert(
            ArmingProfile::ArmedAway,
            ProfileGroups::from([
                (
                    "doors".to_string(),
                    vec![id("binary_sensor.front_door"), id("binary_sensor.back_door")],
                ),
                ("motion".to_string(), vec![id("binary_sensor.hall_motion")]),
            ]),
        );
        profiles.insert(
            ArmingProfile::Always,
            ProfileGroups::from([("fire".to_string(), vec![id("sensor.kitchen_temperature")])]),
        );
        MonitorRegistry::new(profiles)
    }

    #[test]
    fn test_monitored_sensors_include_always() {
        let registry = registry();
        let sensors = registry.monitored_sensors(Some(ArmingProfile::ArmedHome), &IndexSet::new());
        assert_eq!(
            sensors,
            vec![
                id("sensor.kitchen_temperature"),
                id("binary_sensor.front_door"),
                id("binary_sensor.back_door"),
            ]
        );

        let disarmed = registry.monitored_sensors(Some(ArmingProfile::Disarmed), &IndexSet::new());
        assert_eq!(disarmed, vec![id("sensor.kitchen_temperature")]);
        assert_eq!(registry.monitored_sensors(None, &IndexSet::new()).len(), 1);
    }

    #[test]
    fn test_fallback_profiles() {
        let registry = registry();
        let night = registry.profile_sensors(ArmingProfile::ArmedNight);
        assert_eq!(night, registry.profile_sensors(ArmingProfile::ArmedHome));
        let vacation = registry.profile_sensors(ArmingProfile::ArmedVacation);
        assert!(vacation.contains(&id("binary_sensor.hall_motion")));
    }

    #[test]
    fn test_ignored_are_excluded() {
        let registry = registry();
        let ignored = IndexSet::from([id("binary_sensor.front_door")]);
        let sensors = registry.monitored_sensors(Some(ArmingProfile::ArmedAway), &ignored);
        assert!(!sensors.contains(&id("binary_sensor.front_door")));
        assert!(!registry.is_monitored(
            &id("binary_sensor.front_door"),
            &[ArmingProfile::ArmedAway],
            &ignored
        ));
    }

    #[test]
    fn test_is_monitored() {
        let registry = registry();
        let none = IndexSet::new();
        let motion = id("binary_sensor.hall_motion");
        assert!(!registry.is_monitored(&motion, &[ArmingProfile::ArmedHome], &none));
        assert!(registry.is_monitored(
            &motion,
            &[ArmingProfile::ArmedHome, ArmingProfile::ArmedAway],
            &none
        ));
        assert!(registry.is_monitored(&id("sensor.kitchen_temperature"), &[], &none));
        assert!(!registry.is_monitored(&id("binary_sensor.unknown"), &[ArmingProfile::ArmedAway], &none));
    }

    #[test]
    fn test_all_sensors_deduplicated() {
        let registry = registry();
        assert_eq!(registry.all_sensors().len(), 4);
        assert!(registry.contains(&id("binary_sensor.back_door")));
        assert!(!registry.contains(&id("light.hall")));
    }
}
