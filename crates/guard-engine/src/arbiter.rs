//! Echo suppression
//!
//! The engine records an internal change whenever it actuates something
//! itself. A change observed shortly afterwards is attributed to the engine;
//! anything else came from a person or another system. After an external
//! change the engine backs off from automatic actions until the external
//! timeout has passed, unless the house is empty and still.

use chrono::{DateTime, Duration, Utc};
use guard_config::ChangeSettings;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ChangeArbiter {
    internal_timeout: Duration,
    external_timeout: Duration,
    last_internal: Option<DateTime<Utc>>,
    last_external: Option<DateTime<Utc>>,
    internal_count: u64,
    external_count: u64,
}

fn seconds(secs: f64) -> Duration {
    Duration::milliseconds((secs.max(0.0) * 1000.0).round() as i64)
}

impl ChangeArbiter {
    pub fn new(internal_timeout: Duration, external_timeout: Duration) -> Self {
        Self {
            internal_timeout,
            external_timeout,
            last_internal: None,
            last_external: None,
            internal_count: 0,
            external_count: 0,
        }
    }

    pub fn from_settings(settings: &ChangeSettings) -> Self {
        Self::new(
            seconds(settings.internal_change_timeout),
            seconds(settings.external_change_timeout),
        )
    }

    pub fn record_internal_change(&mut self, now: DateTime<Utc>) {
        debug!("Recording internal change");
        self.last_internal = Some(now);
        self.internal_count += 1;
    }

    pub fn record_external_change(&mut self, now: DateTime<Utc>) {
        info!("Recording external change");
        self.last_external = Some(now);
        self.external_count += 1;
    }

    pub fn reset_internal_change_records(&mut self) {
        self.last_internal = None;
        self.internal_count = 0;
    }

    pub fn reset_external_change_records(&mut self) {
        self.last_external = None;
        self.external_count = 0;
    }

    pub fn last_internal_change(&self) -> Option<DateTime<Utc>> {
        self.last_internal
    }

    pub fn last_external_change(&self) -> Option<DateTime<Utc>> {
        self.last_external
    }

    pub fn internal_count(&self) -> u64 {
        self.internal_count
    }

    pub fn external_count(&self) -> u64 {
        self.external_count
    }

    /// A change observed at `now` is external unless it falls inside the
    /// internal window after the last recorded internal change
    pub fn is_current_change_external(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_internal else {
            return true;
        };
        let elapsed = now - last;
        let external = elapsed >= self.internal_timeout;
        debug!(
            elapsed_ms = elapsed.num_milliseconds(),
            timeout_ms = self.internal_timeout.num_milliseconds(),
            external,
            "Classified current change"
        );
        external
    }

    pub fn is_last_change_external(&self) -> bool {
        match (self.last_external, self.last_internal) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(external), Some(internal)) => external > internal,
        }
    }

    /// Time left before automatic changes are allowed again, never negative
    pub fn remaining_before_internal_change_allowed(&self, now: DateTime<Utc>) -> Duration {
        if !self.is_last_change_external() {
            return Duration::zero();
        }
        let Some(last) = self.last_external else {
            return Duration::zero();
        };
        let elapsed = (now - last).max(Duration::zero());
        (self.external_timeout - elapsed).max(Duration::zero())
    }

    /// `quiet_house` is true when nobody is present and no motion is active
    pub fn is_internal_change_allowed(&self, now: DateTime<Utc>, quiet_house: bool) -> bool {
        if !self.is_last_change_external() {
            return true;
        }
        if quiet_house {
            debug!("Nobody is home and nothing moves, internal change allowed");
            return true;
        }
        let remaining = self.remaining_before_internal_change_allowed(now);
        if remaining > Duration::zero() {
            debug!(
                remaining_secs = remaining.num_seconds(),
                "Internal change not allowed yet"
            );
            return false;
        }
        true
    }
}

impl Default for ChangeArbiter {
    fn default() -> Self {
        Self::from_settings(&ChangeSettings::default())
    }
}
