//! Bounded siren, flash and voice escalation
//!
//! Each repeating warning is a counter with a maximum and the handle of its
//! next scheduled tick. Stopping cancels the handle and sets the counter to
//! the maximum, so a tick that was already in flight does nothing.

use chrono::Duration;
use guard_config::AlarmSettings;
use guard_core::{EntityId, Host, TimerHandle, TimerKind};
use serde_json::json;
use tracing::{debug, info};

use crate::actuate;
use crate::error::EngineResult;
use crate::notify::Notifier;
use crate::policy::setting_seconds;

fn flash_interval() -> Duration {
    Duration::seconds(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightColor {
    Red,
    Orange,
    Yellow,
    Green,
}

impl LightColor {
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            LightColor::Red => [255, 0, 0],
            LightColor::Orange => [255, 165, 0],
            LightColor::Yellow => [255, 255, 0],
            LightColor::Green => [0, 255, 0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Flash,
    Voice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirenKind {
    Burglar,
    Fire,
}

#[derive(Debug, Clone)]
struct Repeater {
    count: u32,
    max: u32,
    handle: Option<TimerHandle>,
}

impl Repeater {
    fn stopped(max: u32) -> Self {
        Self {
            count: max,
            max,
            handle: None,
        }
    }

    /// Accept a tick only from the handle we scheduled last
    fn accept(&mut self, handle: TimerHandle) -> bool {
        if self.handle != Some(handle) || self.count >= self.max {
            return false;
        }
        self.handle = None;
        self.count += 1;
        true
    }

    fn stop<H: Host + ?Sized>(&mut self, host: &H) -> bool {
        self.count = self.max;
        match self.handle.take() {
            Some(handle) => {
                host.cancel_timer(handle);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EscalationController {
    lights: Vec<EntityId>,
    burglar_sirens: Vec<EntityId>,
    fire_sirens: Vec<EntityId>,
    flash: Repeater,
    voice: Repeater,
    voice_initial_delay: Duration,
    voice_repeat_delay: Duration,
    voice_message: String,
}

impl EscalationController {
    pub fn from_settings(settings: &AlarmSettings) -> EngineResult<Self> {
        Ok(Self {
            lights: settings.alarm_lights.clone(),
            burglar_sirens: settings.burglar_sirens.clone(),
            fire_sirens: settings.fire_sirens.clone(),
            flash: Repeater::stopped(settings.flash_max_count),
            voice: Repeater::stopped(settings.media_max_count),
            voice_initial_delay: setting_seconds(
                "alarm.media_initial_delay",
                settings.media_initial_delay,
            )?,
            voice_repeat_delay: setting_seconds("alarm.media_repeat_delay", settings.media_repeat_delay)?,
            voice_message: String::new(),
        })
    }

    pub fn is_active(&self, channel: Channel) -> bool {
        match channel {
            Channel::Flash => self.flash.handle.is_some(),
            Channel::Voice => self.voice.handle.is_some(),
        }
    }

    pub fn count(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Flash => self.flash.count,
            Channel::Voice => self.voice.count,
        }
    }

    /// Switch the alarm lights on in `color`
    pub fn set_lights<H: Host + ?Sized>(&self, host: &H, color: LightColor, brightness_pct: u8) {
        for light in &self.lights {
            actuate::call(
                host,
                light.domain(),
                "turn_on",
                json!({
                    "entity_id": light.to_string(),
                    "rgb_color": color.rgb(),
                    "brightness_pct": brightness_pct,
                }),
            );
        }
    }

    /// Restart the flash loop: lights on in `color`, then a toggle every second
    pub fn start_flash<H: Host + ?Sized>(&mut self, host: &H, color: LightColor, brightness_pct: u8) {
        if self.lights.is_empty() {
            debug!("No alarm lights configured, not flashing");
            return;
        }
        self.flash.stop(host);
        if self.flash.max == 0 {
            debug!("Flash warning disabled");
            return;
        }
        self.flash.count = 0;
        self.set_lights(host, color, brightness_pct);
        info!(?color, brightness_pct, "Starting flash warning");
        self.flash.handle = Some(host.run_in(flash_interval(), TimerKind::FlashWarning));
    }

    /// Handle a flash timer; returns false for stale or exhausted ticks
    pub fn flash_tick<H: Host + ?Sized>(&mut self, host: &H, handle: TimerHandle) -> bool {
        if !self.flash.accept(handle) {
            debug!(handle = handle.0, "Ignoring stale flash tick");
            return false;
        }
        for light in &self.lights {
            actuate::switch(host, light, "toggle");
        }
        debug!(count = self.flash.count, "Flash warning tick");
        if self.flash.count < self.flash.max {
            self.flash.handle = Some(host.run_in(flash_interval(), TimerKind::FlashWarning));
        }
        true
    }

    /// Restart spoken warnings of `message`
    pub fn start_voice<H: Host + ?Sized>(&mut self, host: &H, message: impl Into<String>) {
        self.voice.stop(host);
        self.voice_message = message.into();
        if self.voice.max == 0 {
            debug!("Voice warning disabled");
            return;
        }
        self.voice.count = 0;
        info!("Starting voice warning");
        self.voice.handle = Some(host.run_in(self.voice_initial_delay, TimerKind::VoiceWarning));
    }

    /// Replace what the next voice ticks say
    pub fn set_voice_message(&mut self, message: impl Into<String>) {
        self.voice_message = message.into();
    }

    pub fn voice_message(&self) -> &str {
        &self.voice_message
    }

    pub fn voice_tick<H: Host + ?Sized>(
        &mut self,
        host: &H,
        handle: TimerHandle,
        notifier: &Notifier,
        silent: bool,
    ) -> bool {
        if !self.voice.accept(handle) {
            debug!(handle = handle.0, "Ignoring stale voice tick");
            return false;
        }
        notifier.speak(host, &self.voice_message, silent);
        debug!(count = self.voice.count, "Voice warning tick");
        if self.voice.count < self.voice.max {
            self.voice.handle = Some(host.run_in(self.voice_repeat_delay, TimerKind::VoiceWarning));
        }
        true
    }

    /// Stop one repeating warning; stopping a stopped one does nothing
    pub fn stop<H: Host + ?Sized>(&mut self, host: &H, channel: Channel) {
        let stopped = match channel {
            Channel::Flash => self.flash.stop(host),
            Channel::Voice => self.voice.stop(host),
        };
        if stopped {
            info!(?channel, "Stopped warning");
        }
    }

    /// Sound the sirens for `kind` unless `silent`
    pub fn start_sirens<H: Host + ?Sized>(&self, host: &H, kind: SirenKind, silent: bool) {
        if silent {
            info!(?kind, "Siren suppressed by silent mode");
            return;
        }
        let sirens = match kind {
            SirenKind::Burglar => &self.burglar_sirens,
            SirenKind::Fire => &self.fire_sirens,
        };
        for siren in sirens {
            info!(entity_id = %siren, ?kind, "Turning on siren");
            actuate::switch(host, siren, "turn_on");
        }
    }

    pub fn stop_sirens<H: Host + ?Sized>(&self, host: &H) {
        for siren in self.burglar_sirens.iter().chain(&self.fire_sirens) {
            debug!(entity_id = %siren, "Turning off siren");
            actuate::switch(host, siren, "turn_off");
        }
    }

    pub fn stop_all<H: Host + ?Sized>(&mut self, host: &H) {
        self.stop_sirens(host);
        self.stop(host, Channel::Voice);
        self.stop(host, Channel::Flash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use guard_config::{Language, NotifySettings};
    use guard_host::{Clock, LocalHost};

    use crate::translations::Translator;

    fn host() -> LocalHost {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        LocalHost::simulated(Clock::manual(start), FixedOffset::east_opt(0).unwrap())
    }

    fn controller() -> EscalationController {
        EscalationController::from_settings(&AlarmSettings {
            alarm_lights: vec!["light.hall".parse().unwrap()],
            burglar_sirens: vec!["switch.siren".parse().unwrap()],
            fire_sirens: vec!["siren.smoke".parse().unwrap()],
            flash_max_count: 3,
            media_max_count: 2,
            ..AlarmSettings::default()
        })
        .unwrap()
    }

    fn count_calls(host: &LocalHost, service_id: &str) -> usize {
        host.service_calls()
            .iter()
            .filter(|c| c.service_id() == service_id)
            .count()
    }

    #[test]
    fn test_flash_is_bounded() {
        let host = host();
        let mut esc = controller();
        esc.start_flash(&host, LightColor::Red, 100);
        assert!(esc.is_active(Channel::Flash));
        assert_eq!(count_calls(&host, "light.turn_on"), 1);

        for _ in 0..3 {
            let handle = esc.flash.handle.unwrap();
            assert!(esc.flash_tick(&host, handle));
        }
        assert_eq!(esc.count(Channel::Flash), 3);
        assert!(!esc.is_active(Channel::Flash));
        assert_eq!(count_calls(&host, "light.toggle"), 3);
    }

    #[test]
    fn test_stale_tick_after_stop() {
        let host = host();
        let mut esc = controller();
        esc.start_flash(&host, LightColor::Orange, 100);
        let handle = esc.flash.handle.unwrap();

        esc.stop(&host, Channel::Flash);
        assert!(!host.is_timer_pending(handle));
        assert_eq!(esc.count(Channel::Flash), 3);
        assert!(!esc.flash_tick(&host, handle));
        assert_eq!(count_calls(&host, "light.toggle"), 0);

        // already stopped
        esc.stop(&host, Channel::Flash);
        assert_eq!(esc.count(Channel::Flash), 3);
    }

    #[test]
    fn test_restart_replaces_timer() {
        let host = host();
        let mut esc = controller();
        esc.start_flash(&host, LightColor::Yellow, 50);
        let first = esc.flash.handle.unwrap();
        esc.start_flash(&host, LightColor::Red, 100);
        assert!(!host.is_timer_pending(first));
        assert_eq!(host.pending_timers(), 1);
    }

    #[test]
    fn test_voice_repeats_current_message() {
        let host = host();
        let notifier = Notifier::new(
            &NotifySettings {
                media_players: vec!["media_player.kitchen".parse().unwrap()],
                ..NotifySettings::default()
            },
            &Translator::new(Language::English),
        );
        let mut esc = controller();
        esc.start_voice(&host, "first");
        let handle = esc.voice.handle.unwrap();
        esc.set_voice_message("second");
        assert!(esc.voice_tick(&host, handle, &notifier, false));

        let speak = host
            .service_calls()
            .into_iter()
            .find(|c| c.service_id() == "tts.speak")
            .unwrap();
        assert_eq!(speak.get::<String>("message").as_deref(), Some("second"));

        let handle = esc.voice.handle.unwrap();
        assert!(esc.voice_tick(&host, handle, &notifier, false));
        assert!(!esc.is_active(Channel::Voice));
        assert_eq!(count_calls(&host, "tts.speak"), 2);
    }

    #[test]
    fn test_sirens_and_silent_mode() {
        let host = host();
        let mut esc = controller();
        esc.start_sirens(&host, SirenKind::Burglar, true);
        assert!(host.service_calls().is_empty());

        esc.start_sirens(&host, SirenKind::Fire, false);
        assert_eq!(count_calls(&host, "siren.turn_on"), 1);

        esc.stop_all(&host);
        assert_eq!(count_calls(&host, "switch.turn_off"), 1);
        assert_eq!(count_calls(&host, "siren.turn_off"), 1);
    }

    #[test]
    fn test_no_lights_no_flash() {
        let host = host();
        let mut esc = EscalationController::from_settings(&AlarmSettings::default()).unwrap();
        esc.start_flash(&host, LightColor::Red, 100);
        assert!(!esc.is_active(Channel::Flash));
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_zero_max_count_disables_warning() {
        let host = host();
        let mut esc = EscalationController::from_settings(&AlarmSettings {
            alarm_lights: vec!["light.hall".parse().unwrap()],
            flash_max_count: 0,
            media_max_count: 0,
            ..AlarmSettings::default()
        })
        .unwrap();

        esc.start_flash(&host, LightColor::Red, 100);
        esc.start_voice(&host, "Burglar alarm");
        assert!(!esc.is_active(Channel::Flash));
        assert!(!esc.is_active(Channel::Voice));
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(count_calls(&host, "light.turn_on"), 0);
    }

    #[test]
    fn test_out_of_range_delay_is_rejected() {
        let err = EscalationController::from_settings(&AlarmSettings {
            media_repeat_delay: u64::MAX,
            ..AlarmSettings::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("alarm.media_repeat_delay"));
    }
}
