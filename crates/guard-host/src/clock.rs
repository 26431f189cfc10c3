//! Injectable time source

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// Where the host reads "now" from
///
/// `Manual` clocks only move when told to, which makes debounce, cooldown and
/// escalation timing testable without sleeping. Clones share the same time.
#[derive(Debug, Clone)]
pub enum Clock {
    System,
    Manual(Arc<RwLock<DateTime<Utc>>>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn manual(start: DateTime<Utc>) -> Self {
        Clock::Manual(Arc::new(RwLock::new(start)))
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Clock::Manual(_))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(current) => *current.read().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Jump a manual clock to `time`; ignored for the system clock
    pub fn set(&self, time: DateTime<Utc>) {
        if let Clock::Manual(current) = self {
            *current.write().unwrap_or_else(|e| e.into_inner()) = time;
        }
    }

    /// Move a manual clock forward; ignored for the system clock
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(current) = self {
            let mut current = current.write().unwrap_or_else(|e| e.into_inner());
            *current += by;
        }
    }

    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}
