//! The seam between the alarm engine and the automation host

use chrono::{DateTime, Duration, Local, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntityId, ServiceError, State};

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

/// Handle of a state subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// What a timer callback is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// One tick of the warning-light flash loop
    FlashWarning,
    /// One repetition of the spoken alarm message
    VoiceWarning,
    /// Periodic re-evaluation of arming and alerts
    PeriodicCheck,
    /// Daily re-evaluation at the night window edges
    ScheduleCheck,
}

/// A state transition delivered to a [`Reactor`]
#[derive(Debug, Clone)]
pub struct StateChange {
    pub entity_id: EntityId,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
    /// Set when this is the delayed re-delivery of a hold subscription: the
    /// new state has stayed unchanged for this long
    pub held_for: Option<Duration>,
}

impl StateChange {
    pub fn old_value(&self) -> Option<&str> {
        self.old_state.as_ref().map(|s| s.state.as_str())
    }

    pub fn new_value(&self) -> Option<&str> {
        self.new_state.as_ref().map(|s| s.state.as_str())
    }

    /// True when the value itself differs (attribute-only updates are false)
    pub fn is_value_change(&self) -> bool {
        self.old_value() != self.new_value()
    }
}

/// Services the engine consumes from its host
///
/// All calls are synchronous and non-blocking. Timer and state callbacks are
/// delivered later through [`Reactor`].
pub trait Host: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock time in the household's timezone, for night windows
    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&Local).naive_local()
    }

    fn get_state(&self, entity_id: &EntityId) -> Option<State>;

    /// Fire-and-forget actuation; an `Err` means the host refused the call
    fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: serde_json::Value,
    ) -> Result<(), ServiceError>;

    /// Subscribe to changes of `entity_id`
    ///
    /// With `hold`, every change is delivered immediately and again once the
    /// new value has been held for that long.
    fn listen_state(&self, entity_id: &EntityId, hold: Option<Duration>) -> ListenerId;

    fn run_in(&self, delay: Duration, kind: TimerKind) -> TimerHandle;

    fn run_every(&self, first: Duration, interval: Duration, kind: TimerKind) -> TimerHandle;

    /// Fire every day at `at` local time
    fn run_daily(&self, at: NaiveTime, kind: TimerKind) -> TimerHandle;

    /// Cancelling an unknown or already fired handle is a no-op
    fn cancel_timer(&self, handle: TimerHandle);
}

/// Callbacks a host drives, strictly one at a time
pub trait Reactor {
    fn on_state_changed(&mut self, change: &StateChange);

    fn on_timer(&mut self, handle: TimerHandle, kind: TimerKind);
}
