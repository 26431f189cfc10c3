//! Alarm decision engine for homeguard
//!
//! Turns sensor states into alarm decisions: classifies sensors by device
//! class, aggregates alerts per category against mode-dependent thresholds,
//! decides when to arm or disarm automatically, tells engine-initiated panel
//! changes apart from manual ones, and escalates a triggered alarm through
//! lights, sirens, speech and push notifications.
//!
//! Everything runs against the [`guard_core::Host`] trait; [`AlarmEngine`]
//! implements [`guard_core::Reactor`] to receive changes and timers.

mod actuate;
pub mod alerts;
pub mod arbiter;
pub mod classify;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod message;
pub mod monitor;
pub mod notify;
pub mod panel;
pub mod policy;
pub mod sensor;
pub mod thresholds;
pub mod translations;

pub use alerts::{AlertAggregator, Alerts, DESIRED_STATE};
pub use arbiter::ChangeArbiter;
pub use classify::{
    classify_alarm_category, classify_sensor_type, is_numeric_class, AlarmCategory, SemanticType,
};
pub use engine::{AlarmEngine, AlarmState};
pub use error::{EngineError, EngineResult};
pub use escalation::{Channel, EscalationController, LightColor, SirenKind};
pub use message::{clean_sensor_name, compose_alarm_message, join_names};
pub use monitor::MonitorRegistry;
pub use notify::{Notifier, Priority, Quiet};
pub use panel::{ArmMode, PanelAction, PanelState, PANEL_DOMAIN};
pub use policy::{parse_time, ArmingPolicy, NightWindow, NotificationNight, PolicyContext};
pub use sensor::Sensor;
pub use thresholds::ThresholdTable;
pub use translations::Translator;
