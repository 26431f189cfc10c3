//! The alarm engine
//!
//! [`AlarmEngine`] owns every piece of alarm logic and reacts to what its
//! [`Host`] delivers: panel transitions, sensor changes, presence, buttons and
//! its own timers. All entity state is read fresh from the host at decision
//! time; the cached panel mode in [`AlarmState`] is only a record of the last
//! observation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use guard_config::{ArmingProfile, GuardConfig};
use guard_core::{
    attrs, EntityId, Host, Reactor, StateChange, TimerHandle, TimerKind, STATE_HOME,
};
use indexmap::IndexSet;
use serde_json::json;
use tracing::{debug, info, trace, warn};

use crate::actuate;
use crate::alerts::{AlertAggregator, Alerts, DESIRED_STATE};
use crate::arbiter::ChangeArbiter;
use crate::classify::{AlarmCategory, SemanticType};
use crate::error::{EngineError, EngineResult};
use crate::escalation::{EscalationController, LightColor, SirenKind};
use crate::message::compose_alarm_message;
use crate::monitor::MonitorRegistry;
use crate::notify::{Notifier, Priority, Quiet};
use crate::panel::{ArmMode, PanelAction, PanelState, PANEL_DOMAIN};
use crate::policy::{setting_seconds, ArmingPolicy, NotificationNight, PolicyContext};
use crate::sensor::Sensor;
use crate::thresholds::ThresholdTable;
use crate::translations::Translator;

/// Vacuum state that lowers the away threshold
const VACUUM_RETURNING: &str = "returning";

/// Mutable record of what the engine has observed and decided
#[derive(Debug, Clone, Default)]
pub struct AlarmState {
    /// Panel state as last observed
    pub mode: Option<PanelState>,
    /// Profile snapshot taken when the panel last became armed
    pub arming_profile: Option<ArmingProfile>,
    pub alarm_type: Option<AlarmCategory>,
    pub message: Option<String>,
    /// Sensors already alerting when the panel armed
    pub ignored: IndexSet<EntityId>,
    pub last_disarm: Option<DateTime<Utc>>,
}

pub struct AlarmEngine<H: Host> {
    host: Arc<H>,
    panel: EntityId,
    pin: Option<String>,
    buttons: Vec<EntityId>,
    trackers: Vec<EntityId>,
    leave_hold: Duration,
    vacuum_cleaners: Vec<EntityId>,
    bridge_sensor: Option<EntityId>,
    bridge_settle_time: Duration,
    silent_control: Option<EntityId>,
    guest_control: Option<EntityId>,
    vacation_control: Option<EntityId>,
    workday_sensor: Option<EntityId>,
    workday_tomorrow_sensor: Option<EntityId>,
    periodic_interval: Duration,

    registry: MonitorRegistry,
    aggregator: AlertAggregator,
    thresholds: ThresholdTable,
    policy: ArmingPolicy,
    notification_night: NotificationNight,
    arbiter: ChangeArbiter,
    escalation: EscalationController,
    notifier: Notifier,
    translator: Translator,

    state: AlarmState,
    timers: Vec<TimerHandle>,
    initialized: bool,
}

impl<H: Host> AlarmEngine<H> {
    pub fn new(host: Arc<H>, config: &GuardConfig) -> EngineResult<Self> {
        let alarm = &config.alarm;
        if alarm.periodic_interval == 0 {
            return Err(EngineError::InvalidSetting {
                key: "alarm.periodic_interval".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let translator = Translator::new(config.notify.language);
        Ok(Self {
            panel: alarm.panel.clone(),
            pin: alarm.pin.clone(),
            buttons: alarm.buttons.clone(),
            trackers: config.presence.device_trackers.clone(),
            leave_hold: setting_seconds("presence.leave_hold", config.presence.leave_hold)?,
            vacuum_cleaners: alarm.vacuum_cleaners.clone(),
            bridge_sensor: alarm.bridge_sensor.clone(),
            bridge_settle_time: setting_seconds("alarm.bridge_settle_time", alarm.bridge_settle_time)?,
            silent_control: alarm.silent_control.clone(),
            guest_control: alarm.guest_control.clone(),
            vacation_control: alarm.vacation_control.clone(),
            workday_sensor: config.night.workday_sensor.clone(),
            workday_tomorrow_sensor: config.night.workday_tomorrow_sensor.clone(),
            periodic_interval: setting_seconds("alarm.periodic_interval", alarm.periodic_interval)?,

            registry: MonitorRegistry::from_settings(alarm),
            aggregator: AlertAggregator::from_settings(alarm)?,
            thresholds: ThresholdTable::from_settings(alarm),
            policy: ArmingPolicy::from_settings(alarm)?,
            notification_night: NotificationNight::from_settings(&config.night)?,
            arbiter: ChangeArbiter::from_settings(&config.change),
            escalation: EscalationController::from_settings(alarm)?,
            notifier: Notifier::new(&config.notify, &translator),
            translator,

            state: AlarmState::default(),
            timers: Vec::new(),
            initialized: false,
            host,
        })
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn arbiter(&self) -> &ChangeArbiter {
        &self.arbiter
    }

    pub fn escalation(&self) -> &EscalationController {
        &self.escalation
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn ignored_sensors(&self) -> &IndexSet<EntityId> {
        &self.state.ignored
    }

    // --- lifecycle ---

    /// Subscribe to every entity the engine reacts to, schedule the periodic
    /// and daily checks, and announce startup
    pub fn initialize(&mut self) {
        if self.initialized {
            debug!("Alarm engine already initialized");
            return;
        }
        self.initialized = true;
        info!(panel = %self.panel, "Initializing alarm engine");
        let host = Arc::clone(&self.host);
        let aggregator = self.aggregator;

        let sensors = self.registry.register_listeners(host.as_ref(), |id| {
            let semantic_type = Sensor::read(host.as_ref(), id).and_then(|s| s.semantic_type());
            aggregator.default_timeout(semantic_type)
        });
        debug!(sensors, "Sensor listeners registered");

        host.listen_state(&self.panel, None);
        for button in &self.buttons {
            host.listen_state(button, None);
        }
        for tracker in &self.trackers {
            host.listen_state(tracker, None);
            host.listen_state(tracker, Some(self.leave_hold));
        }
        for control in [&self.vacation_control, &self.guest_control]
            .into_iter()
            .flatten()
        {
            host.listen_state(control, None);
        }

        self.state.mode = self.panel_state();
        self.state.arming_profile = self
            .state
            .mode
            .filter(PanelState::is_armed)
            .and_then(|mode| mode.profile());
        if self.state.mode.is_none() {
            warn!(panel = %self.panel, "Panel state is unknown at startup");
        }

        self.escalation.stop_sirens(host.as_ref());

        self.timers.push(host.run_every(
            self.periodic_interval,
            self.periodic_interval,
            TimerKind::PeriodicCheck,
        ));
        let window = *self.policy.arm_night_window();
        self.timers
            .push(host.run_daily(window.start, TimerKind::ScheduleCheck));
        self.timers
            .push(host.run_daily(window.end, TimerKind::ScheduleCheck));

        self.notify(&self.translator.translate("system_start"), Priority::Normal);
        info!(mode = ?self.state.mode, "Alarm engine initialized");
    }

    /// Stop every warning, cancel scheduled checks and leave the panel disarmed
    pub fn terminate(&mut self) {
        info!("Terminating alarm engine");
        let host = Arc::clone(&self.host);
        for handle in self.timers.drain(..) {
            host.cancel_timer(handle);
        }
        self.escalation.stop_all(host.as_ref());
        self.disarm_alarm();
    }

    // --- household facts ---

    /// Panel state read fresh from the host
    pub fn panel_state(&self) -> Option<PanelState> {
        let state = self.host.get_state(&self.panel)?;
        match state.state.parse() {
            Ok(mode) => Some(mode),
            Err(_) => {
                warn!(panel = %self.panel, state = %state.state, "Panel reports an unknown state");
                None
            }
        }
    }

    fn refresh_mode(&mut self) -> Option<PanelState> {
        self.state.mode = self.panel_state();
        self.state.mode
    }

    fn is_control_on(&self, control: &Option<EntityId>) -> bool {
        control
            .as_ref()
            .and_then(|id| self.host.get_state(id))
            .is_some_and(|s| s.is_on())
    }

    pub fn in_silent_mode(&self) -> bool {
        self.is_control_on(&self.silent_control)
    }

    pub fn in_guest_mode(&self) -> bool {
        self.is_control_on(&self.guest_control)
    }

    pub fn in_vacation_mode(&self) -> bool {
        self.is_control_on(&self.vacation_control)
    }

    /// Number of trackers currently at home
    pub fn trackers_home(&self) -> usize {
        self.trackers
            .iter()
            .filter_map(|id| self.host.get_state(id))
            .filter(|s| s.state == STATE_HOME)
            .count()
    }

    pub fn is_somebody_home(&self) -> bool {
        self.trackers_home() > 0 || self.in_guest_mode()
    }

    fn is_motion_detected(&self) -> bool {
        self.registry.all_sensors().iter().any(|id| {
            Sensor::read(self.host.as_ref(), id)
                .is_some_and(|s| s.semantic_type() == Some(SemanticType::Motion) && s.is_on())
        })
    }

    fn is_house_quiet(&self) -> bool {
        !self.is_somebody_home() && !self.is_motion_detected()
    }

    fn is_vacuum_returning(&self) -> bool {
        self.vacuum_cleaners.iter().any(|id| {
            self.host
                .get_state(id)
                .is_some_and(|s| s.state == VACUUM_RETURNING)
        })
    }

    /// The sensor bridge is up and has been for the settle time
    ///
    /// Without a configured bridge sensor this is always true.
    pub fn is_bridge_ready(&self) -> bool {
        let Some(bridge) = &self.bridge_sensor else {
            return true;
        };
        match self.host.get_state(bridge) {
            Some(state) if state.is_on() => {
                let up_for = state.unchanged_for(self.host.now());
                if up_for < self.bridge_settle_time {
                    debug!(up_secs = up_for.num_seconds(), "Sensor bridge still settling");
                    return false;
                }
                true
            }
            _ => {
                warn!(entity_id = %bridge, "Sensor bridge is down, not evaluating sensors");
                false
            }
        }
    }

    pub fn in_notification_night(&self) -> bool {
        let window = self.notification_night.window_for(
            self.is_control_on(&self.workday_sensor),
            self.is_control_on(&self.workday_tomorrow_sensor),
        );
        window.contains(self.host.local_now().time())
    }

    fn policy_context(&self) -> PolicyContext {
        PolicyContext {
            now: self.host.now(),
            local_time: self.host.local_now().time(),
            somebody_home: self.is_somebody_home(),
            guest_mode: self.in_guest_mode(),
            vacation_mode: self.in_vacation_mode(),
            last_disarm: self.state.last_disarm,
        }
    }

    pub fn is_auto_arming_allowed(&self) -> bool {
        self.policy.is_auto_arming_allowed(&self.policy_context())
    }

    pub fn desired_arming_state(&self) -> ArmMode {
        self.policy.desired_arming_state(&self.policy_context())
    }

    fn notify(&self, message: &str, priority: Priority) {
        let quiet = Quiet {
            night: self.in_notification_night(),
            silent: self.in_silent_mode(),
        };
        self.notifier
            .notify(self.host.as_ref(), message, priority, quiet);
    }

    // --- alerts ---

    /// Alerts among the sensors of `profile`, with `timeout` overriding the
    /// per-type debounce
    pub fn collect_alerts(&self, profile: Option<ArmingProfile>, timeout: Option<Duration>) -> Alerts {
        self.aggregator.collect_alerts(
            self.host.as_ref(),
            &self.registry,
            profile,
            &self.state.ignored,
            timeout,
        )
    }

    pub fn count_alerts(&self, profile: Option<ArmingProfile>, timeout: Option<Duration>) -> usize {
        self.collect_alerts(profile, timeout).count()
    }

    /// Threshold for `category` in the current panel state
    pub fn threshold_for(&self, category: AlarmCategory) -> Option<usize> {
        let mode = self.panel_state()?;
        self.thresholds
            .threshold(category, mode, self.is_vacuum_returning())
    }

    fn compose_message(&self, alerts: &Alerts) -> String {
        compose_alarm_message(alerts, &self.translator, |id| {
            Sensor::read(self.host.as_ref(), id)
        })
    }

    /// Look at every monitored sensor and trigger the first category whose
    /// alert count reaches its threshold
    ///
    /// Categories are checked fire, water, safety, burglar. While triggered
    /// only the alarm message is refreshed.
    pub fn analyze_and_trigger(&mut self) {
        if !self.is_bridge_ready() {
            return;
        }
        let Some(mode) = self.refresh_mode() else {
            warn!("Panel state unknown, not analyzing sensors");
            return;
        };

        match mode {
            PanelState::Pending | PanelState::Arming => {
                trace!(%mode, "Not analyzing sensors while {mode}");
                return;
            }
            PanelState::Triggered => {
                let alerts = self.collect_alerts(self.state.arming_profile, None);
                if !alerts.is_empty() {
                    let message = self.compose_message(&alerts);
                    debug!(%message, "Refreshing alarm message");
                    self.escalation.set_voice_message(message.clone());
                    self.state.message = Some(message);
                }
                return;
            }
            _ => {}
        }

        let alerts = self.collect_alerts(mode.profile(), None);
        if alerts.is_empty() {
            trace!(%mode, "No alerts");
            return;
        }

        let vacuum_returning = self.is_vacuum_returning();
        for category in [
            AlarmCategory::Fire,
            AlarmCategory::Water,
            AlarmCategory::Safety,
            AlarmCategory::Burglar,
        ] {
            let found = alerts.count_of(category);
            let Some(threshold) = self.thresholds.threshold(category, mode, vacuum_returning) else {
                continue;
            };
            debug!(%category, found, threshold, "Checking alert threshold");
            if found > 0 && found >= threshold {
                self.trigger_alarm(category, &alerts);
                return;
            }
        }
    }

    // --- panel requests ---

    fn request(&self, action: PanelAction) -> bool {
        let mut data = json!({ "entity_id": self.panel.to_string() });
        if let Some(pin) = &self.pin {
            data["code"] = json!(pin);
        }
        actuate::call(self.host.as_ref(), PANEL_DOMAIN, action.service(), data)
    }

    pub fn arm_alarm(&mut self, mode: ArmMode) -> bool {
        warn!(%mode, "Arming alarm system");
        self.request(PanelAction::Arm(mode))
    }

    /// Request disarm; does nothing when the panel is already disarmed
    pub fn disarm_alarm(&mut self) -> bool {
        if self.panel_state() == Some(PanelState::Disarmed) {
            debug!("Alarm system already disarmed");
            return false;
        }
        warn!("Disarming alarm system");
        self.request(PanelAction::Disarm)
    }

    /// Record why the alarm goes off and ask the panel to trigger
    pub fn trigger_alarm(&mut self, category: AlarmCategory, alerts: &Alerts) -> bool {
        let message = if alerts.is_empty() {
            self.translator.translate(category.alert_key())
        } else {
            self.compose_message(alerts)
        };
        warn!(%category, alerts = alerts.count(), %message, "Triggering alarm");
        self.state.alarm_type = Some(category);
        self.state.message = Some(message);
        self.request(PanelAction::Trigger)
    }

    fn auto_arm(&mut self, mode: ArmMode) {
        let key = format!("auto_arm_{}_schedule", mode.as_str());
        self.notify(&self.translator.translate(&key), Priority::Normal);
        self.arbiter.record_internal_change(self.host.now());
        self.arm_alarm(mode);
    }

    /// Bring the panel to the mode the household calls for
    ///
    /// Never acts while the panel is pending, arming or triggered, and never
    /// overrides a recent manual change unless the house is empty and still.
    pub fn setup(&mut self) {
        let Some(mode) = self.refresh_mode() else {
            warn!("Panel state unknown, skipping setup");
            return;
        };
        if matches!(
            mode,
            PanelState::Pending | PanelState::Arming | PanelState::Triggered
        ) {
            debug!(%mode, "Not changing the panel while {mode}");
            return;
        }

        let ctx = self.policy_context();
        let allowed = self.policy.is_auto_arming_allowed(&ctx);
        if mode == PanelState::Disarmed && !allowed {
            debug!("Automatic arming not allowed");
            return;
        }

        let now = self.host.now();
        if !self.arbiter.is_internal_change_allowed(now, self.is_house_quiet()) {
            info!(
                remaining_secs = self
                    .arbiter
                    .remaining_before_internal_change_allowed(now)
                    .num_seconds(),
                "Recent manual change, leaving the panel alone"
            );
            return;
        }

        if !ctx.somebody_home {
            let target = if ctx.vacation_mode {
                ArmMode::Vacation
            } else {
                ArmMode::Away
            };
            if mode == target.panel_state() || !allowed {
                return;
            }
            self.auto_arm(target);
            return;
        }

        if self.policy.arm_night_window().contains(ctx.local_time) {
            if !allowed || mode == PanelState::ArmedNight {
                return;
            }
            self.auto_arm(ArmMode::Night);
            return;
        }

        match mode {
            PanelState::ArmedHome => {}
            PanelState::Disarmed => {
                if !ctx.vacation_mode {
                    self.auto_arm(ArmMode::Home);
                }
            }
            _ => {
                info!(%mode, "Somebody is home, disarming");
                self.arbiter.record_internal_change(now);
                self.disarm_alarm();
            }
        }
    }

    // --- reactions ---

    pub fn on_panel_changed(&mut self, change: &StateChange) {
        let now = self.host.now();
        if self.arbiter.is_current_change_external(now) {
            info!(from = ?change.old_value(), to = ?change.new_value(), "Panel changed externally");
            self.arbiter.record_external_change(now);
        }

        let Some(mode) = change.new_value().and_then(|v| v.parse::<PanelState>().ok()) else {
            warn!(state = ?change.new_value(), "Panel reports an unknown state");
            self.state.mode = None;
            return;
        };
        let caused_by = change
            .new_state
            .as_ref()
            .and_then(|s| s.context.parent_id.as_deref());
        info!(from = ?change.old_value(), to = %mode, ?caused_by, "Panel state changed");
        self.state.mode = Some(mode);

        let host = Arc::clone(&self.host);
        let silent = self.in_silent_mode();
        let mut message = self.translator.translate(&mode.announcement_key());
        let mut priority = Priority::Normal;

        match mode {
            PanelState::Triggered => {
                self.escalation
                    .start_flash(host.as_ref(), LightColor::Red, 100);
                let alarm_message = self.state.message.clone().unwrap_or_default();
                let spoken = if alarm_message.is_empty() {
                    message.clone()
                } else {
                    alarm_message.clone()
                };
                self.escalation.start_voice(host.as_ref(), spoken);
                match self.state.alarm_type {
                    Some(AlarmCategory::Fire) => {
                        self.escalation
                            .start_sirens(host.as_ref(), SirenKind::Fire, silent)
                    }
                    Some(AlarmCategory::Water) => debug!("No sirens for a water alarm"),
                    _ => self
                        .escalation
                        .start_sirens(host.as_ref(), SirenKind::Burglar, silent),
                }
                append(&mut message, &alarm_message);
                priority = Priority::Urgent;
            }
            PanelState::Pending => {
                self.escalation
                    .start_flash(host.as_ref(), LightColor::Orange, 100);
                append(&mut message, self.state.message.as_deref().unwrap_or_default());
            }
            PanelState::Arming => {
                if !self.in_notification_night() {
                    self.escalation
                        .start_flash(host.as_ref(), LightColor::Yellow, 50);
                }
            }
            PanelState::Disarmed => {
                self.state.message = None;
                self.state.last_disarm = Some(now);
                if !self.state.ignored.is_empty() {
                    info!(count = self.state.ignored.len(), "Releasing ignored sensors");
                    self.state.ignored.clear();
                }
                self.escalation
                    .set_lights(host.as_ref(), LightColor::Green, 10);
            }
            armed => {
                self.state.message = None;
                self.state.arming_profile = armed.profile();
                self.ignore_active_sensors();
            }
        }

        if mode == PanelState::Disarmed || mode.is_armed() {
            self.escalation.stop_all(host.as_ref());
            self.state.alarm_type = None;
        }

        self.notify(&message, priority);
    }

    /// Ignore whatever is alerting right now so it cannot trigger the alarm
    /// it was armed with
    fn ignore_active_sensors(&mut self) {
        self.state.ignored.clear();
        let alerts = self.collect_alerts(self.state.arming_profile, Some(Duration::zero()));
        if alerts.is_empty() {
            return;
        }
        let names: Vec<String> = alerts.sensors().map(|id| id.to_string()).collect();
        warn!(
            count = names.len(),
            sensors = %names.join(", "),
            "Sensors active while arming, ignoring them until they return to normal"
        );
        self.state.ignored.extend(alerts.sensors().cloned());
    }

    pub fn on_sensor_changed(&mut self, change: &StateChange) {
        let id = &change.entity_id;
        if self.state.ignored.contains(id) && !self.is_sensor_alerting(id) {
            self.state.ignored.shift_remove(id);
            info!(entity_id = %id, "Sensor back to normal, no longer ignored");
        }

        let profiles: Vec<ArmingProfile> = self
            .panel_state()
            .and_then(|mode| mode.profile())
            .into_iter()
            .chain(self.state.arming_profile)
            .collect();
        if !self.registry.is_monitored(id, &profiles, &self.state.ignored) {
            trace!(entity_id = %id, "Change on an unmonitored sensor");
            return;
        }
        debug!(
            entity_id = %id,
            state = ?change.new_value(),
            held = change.held_for.is_some(),
            "Monitored sensor changed"
        );
        self.analyze_and_trigger();
    }

    /// Whether `id` alerts right now, without waiting out its debounce
    fn is_sensor_alerting(&self, id: &EntityId) -> bool {
        Sensor::read(self.host.as_ref(), id).is_some_and(|sensor| {
            self.aggregator
                .evaluate_sensor(&sensor, DESIRED_STATE, Some(Duration::zero()), self.host.now())
        })
    }

    pub fn on_presence_changed(&mut self, change: &StateChange) {
        let id = &change.entity_id;
        if !self.trackers.contains(id) {
            info!(entity_id = %id, state = ?change.new_value(), "Household mode changed");
            self.setup();
            return;
        }

        let arrived = change.new_value() == Some(STATE_HOME);
        match (arrived, change.held_for) {
            (true, None) => {
                let mode = self.panel_state();
                let protecting = mode.is_some_and(|m| {
                    m.is_armed() || matches!(m, PanelState::Pending | PanelState::Triggered)
                });
                if protecting {
                    let name = change
                        .new_state
                        .as_ref()
                        .map(|s| s.display_name())
                        .unwrap_or_else(|| id.fallback_name());
                    info!(entity_id = %id, %name, "Arrived home, disarming");
                    let message = self.translator.format("auto_disarm_person", &[name.as_str()]);
                    self.notify(&message, Priority::Normal);
                    self.arbiter.record_internal_change(self.host.now());
                    self.disarm_alarm();
                } else {
                    self.setup();
                }
            }
            (false, None) => {
                debug!(entity_id = %id, "Left home, waiting for the leave to hold");
            }
            (_, Some(held)) => {
                debug!(entity_id = %id, held_secs = held.num_seconds(), "Presence settled");
                self.setup();
            }
        }
    }

    pub fn on_button_event(&mut self, change: &StateChange) {
        let Some(new_state) = &change.new_state else {
            return;
        };
        let Some(event_type) = new_state.attribute_str(attrs::EVENT_TYPE) else {
            debug!(entity_id = %change.entity_id, "Button event without an event type");
            return;
        };
        let name = new_state.display_name();
        let disarmed = self.panel_state() == Some(PanelState::Disarmed);
        info!(entity_id = %change.entity_id, event_type, "Button pressed");

        match event_type {
            "single" if disarmed => {
                let message = self.translator.format("button_arm_home", &[name.as_str()]);
                self.notify(&message, Priority::Normal);
                self.arm_alarm(ArmMode::Home);
            }
            "double" if disarmed => {
                let (key, mode) = if self.in_vacation_mode() {
                    ("button_arm_vacation", ArmMode::Vacation)
                } else {
                    ("button_arm_away", ArmMode::Away)
                };
                let message = self.translator.format(key, &[name.as_str()]);
                self.notify(&message, Priority::Normal);
                self.arm_alarm(mode);
            }
            "hold" if !disarmed => {
                let message = self.translator.format("button_disarm", &[name.as_str()]);
                self.notify(&message, Priority::Normal);
                self.disarm_alarm();
            }
            "triple" | "quadruple" => {
                if !self.is_bridge_ready() {
                    return;
                }
                let message = self.translator.format("button_trigger", &[name.as_str()]);
                self.notify(&message, Priority::Normal);
                self.trigger_alarm(AlarmCategory::Safety, &Alerts::new());
            }
            other => debug!(event_type = other, disarmed, "Button event has no effect"),
        }
    }
}

fn append(message: &mut String, extra: &str) {
    if extra.is_empty() {
        return;
    }
    message.push(' ');
    message.push_str(extra);
}

impl<H: Host> Reactor for AlarmEngine<H> {
    fn on_state_changed(&mut self, change: &StateChange) {
        let id = &change.entity_id;
        if *id == self.panel {
            if change.held_for.is_none() {
                self.on_panel_changed(change);
            }
        } else if self.buttons.contains(id) {
            self.on_button_event(change);
        } else if self.trackers.contains(id)
            || self.guest_control.as_ref() == Some(id)
            || self.vacation_control.as_ref() == Some(id)
        {
            self.on_presence_changed(change);
        } else if self.registry.contains(id) {
            self.on_sensor_changed(change);
        } else {
            trace!(entity_id = %id, "Ignoring change on an unrelated entity");
        }
    }

    fn on_timer(&mut self, handle: TimerHandle, kind: TimerKind) {
        let host = Arc::clone(&self.host);
        match kind {
            TimerKind::FlashWarning => {
                self.escalation.flash_tick(host.as_ref(), handle);
            }
            TimerKind::VoiceWarning => {
                let silent = self.in_silent_mode();
                self.escalation
                    .voice_tick(host.as_ref(), handle, &self.notifier, silent);
            }
            TimerKind::PeriodicCheck | TimerKind::ScheduleCheck => {
                trace!(?kind, "Scheduled check");
                self.setup();
                self.analyze_and_trigger();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use guard_config::{AlarmSettings, ProfileGroups};
    use guard_host::{Clock, LocalHost};
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn host() -> Arc<LocalHost> {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        Arc::new(LocalHost::simulated(
            Clock::manual(start),
            FixedOffset::east_opt(0).unwrap(),
        ))
    }

    fn config() -> GuardConfig {
        let mut away: ProfileGroups = IndexMap::new();
        away.insert("doors".into(), vec![id("binary_sensor.front_door")]);
        let mut profiles = IndexMap::new();
        profiles.insert(ArmingProfile::ArmedAway, away);
        GuardConfig {
            alarm: AlarmSettings {
                profiles,
                vacuum_cleaners: vec![id("vacuum.robot")],
                ..AlarmSettings::default()
            },
            ..GuardConfig::default()
        }
    }

    fn seed_panel(host: &LocalHost, state: &str) {
        host.set_state(&id("alarm_control_panel.home_alarm"), state, HashMap::new());
    }

    fn panel_calls(host: &LocalHost) -> Vec<String> {
        host.service_calls()
            .into_iter()
            .filter(|c| c.domain == PANEL_DOMAIN)
            .map(|c| c.service)
            .collect()
    }

    #[test]
    fn test_zero_periodic_interval_is_rejected() {
        let mut config = config();
        config.alarm.periodic_interval = 0;
        let err = AlarmEngine::new(host(), &config).err().unwrap();
        assert!(matches!(err, EngineError::InvalidSetting { .. }));
    }

    #[test]
    fn test_out_of_range_hold_is_rejected() {
        let mut config = config();
        config.presence.leave_hold = u64::MAX;
        let err = AlarmEngine::new(host(), &config).err().unwrap();
        assert!(err.to_string().contains("presence.leave_hold"));
    }

    #[test]
    fn test_initialize_twice_schedules_once() {
        let host = host();
        seed_panel(&host, "disarmed");
        let mut engine = AlarmEngine::new(Arc::clone(&host), &config()).unwrap();
        engine.initialize();
        let timers = host.pending_timers();
        assert!(timers > 0);

        engine.initialize();
        assert_eq!(host.pending_timers(), timers);
    }

    #[test]
    fn test_bad_night_time_is_rejected() {
        let mut config = config();
        config.alarm.arm_night_start = "25:00".into();
        assert!(matches!(
            AlarmEngine::new(host(), &config),
            Err(EngineError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_disarm_when_disarmed_is_a_no_op() {
        let host = host();
        seed_panel(&host, "disarmed");
        let mut engine = AlarmEngine::new(Arc::clone(&host), &config()).unwrap();
        assert!(!engine.disarm_alarm());
        assert!(panel_calls(&host).is_empty());
    }

    #[test]
    fn test_pin_is_sent_with_requests() {
        let host = host();
        seed_panel(&host, "disarmed");
        let mut config = config();
        config.alarm.pin = Some("1234".into());
        let mut engine = AlarmEngine::new(Arc::clone(&host), &config).unwrap();
        engine.arm_alarm(ArmMode::Away);

        let call = host
            .service_calls()
            .into_iter()
            .find(|c| c.domain == PANEL_DOMAIN)
            .unwrap();
        assert_eq!(call.service, "alarm_arm_away");
        assert_eq!(call.get::<String>("code").as_deref(), Some("1234"));
    }

    #[test]
    fn test_trigger_without_alerts_uses_category_header() {
        let host = host();
        seed_panel(&host, "disarmed");
        let mut engine = AlarmEngine::new(Arc::clone(&host), &config()).unwrap();
        engine.trigger_alarm(AlarmCategory::Safety, &Alerts::new());
        assert_eq!(engine.state().alarm_type, Some(AlarmCategory::Safety));
        assert_eq!(
            engine.state().message.as_deref(),
            Some("Attention security alarm!")
        );
        assert_eq!(panel_calls(&host), vec!["alarm_trigger"]);
    }

    #[test]
    fn test_threshold_follows_panel_and_vacuum() {
        let host = host();
        seed_panel(&host, "armed_away");
        host.set_value(&id("vacuum.robot"), "cleaning");
        let engine = AlarmEngine::new(Arc::clone(&host), &config()).unwrap();
        assert_eq!(engine.threshold_for(AlarmCategory::Burglar), Some(2));

        host.set_value(&id("vacuum.robot"), "returning");
        assert_eq!(engine.threshold_for(AlarmCategory::Burglar), Some(1));

        seed_panel(&host, "disarmed");
        assert_eq!(engine.threshold_for(AlarmCategory::Burglar), None);
        assert_eq!(engine.threshold_for(AlarmCategory::Fire), Some(1));
    }

    #[test]
    fn test_bridge_gate() {
        let host = host();
        let mut config = config();
        config.alarm.bridge_sensor = Some(id("binary_sensor.zigbee_bridge"));
        config.alarm.bridge_settle_time = 300;
        let engine = AlarmEngine::new(Arc::clone(&host), &config).unwrap();
        assert!(!engine.is_bridge_ready());

        host.set_value(&id("binary_sensor.zigbee_bridge"), "on");
        assert!(!engine.is_bridge_ready());

        host.clock().advance_seconds(300);
        assert!(engine.is_bridge_ready());
    }

    #[test]
    fn test_somebody_home_counts_guests() {
        let host = host();
        let mut config = config();
        config.presence.device_trackers = vec![id("device_tracker.alice")];
        config.alarm.guest_control = Some(id("input_boolean.guests"));
        host.set_value(&id("device_tracker.alice"), "not_home");
        host.set_value(&id("input_boolean.guests"), "off");
        let engine = AlarmEngine::new(Arc::clone(&host), &config).unwrap();
        assert!(!engine.is_somebody_home());
        assert_eq!(engine.desired_arming_state(), ArmMode::Away);

        host.set_value(&id("input_boolean.guests"), "on");
        assert!(engine.is_somebody_home());
        assert_eq!(engine.trackers_home(), 0);
        assert!(!engine.is_auto_arming_allowed());
    }
}
