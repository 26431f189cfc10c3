//! Timer table backing `run_in`, `run_every`, `run_daily` and hold listeners

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use guard_core::{EntityId, State, TimerHandle, TimerKind};

#[derive(Debug, Clone)]
pub(crate) enum Repeat {
    Once,
    Every(Duration),
    Daily,
}

/// What happens when a timer comes due
#[derive(Debug, Clone)]
pub(crate) enum TimerAction {
    Fire(TimerKind),
    /// Re-deliver a change if the entity still holds the value written at `since`
    Hold {
        entity_id: EntityId,
        hold: Duration,
        old_state: Option<State>,
        since: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct TimerEntry {
    pub handle: TimerHandle,
    pub due: DateTime<Utc>,
    pub repeat: Repeat,
    pub action: TimerAction,
}

/// Pending timers keyed by handle
#[derive(Debug, Default)]
pub(crate) struct TimerTable {
    next_handle: u64,
    entries: BTreeMap<TimerHandle, TimerEntry>,
}

impl TimerTable {
    pub fn schedule(&mut self, due: DateTime<Utc>, repeat: Repeat, action: TimerAction) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.entries.insert(
            handle,
            TimerEntry {
                handle,
                due,
                repeat,
                action,
            },
        );
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries.values().map(|e| e.due).min()
    }

    /// Remove and return the earliest entry due at or before `now`
    ///
    /// Repeating entries are rescheduled before being returned, so a callback
    /// that cancels its own handle stops the repetition.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<TimerEntry> {
        let handle = self
            .entries
            .values()
            .filter(|e| e.due <= now)
            .min_by_key(|e| (e.due, e.handle))
            .map(|e| e.handle)?;

        let entry = self.entries.remove(&handle)?;
        match &entry.repeat {
            Repeat::Once => {}
            Repeat::Every(interval) => {
                let mut next = entry.clone();
                next.due = entry.due + *interval;
                self.entries.insert(handle, next);
            }
            Repeat::Daily => {
                let mut next = entry.clone();
                next.due = entry.due + Duration::days(1);
                self.entries.insert(handle, next);
            }
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }
}

/// First instant strictly after `now` whose local time is `at`
pub(crate) fn next_daily(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_now = now.with_timezone(&offset);
    let today = local_now.date_naive().and_time(at);
    let candidate = offset
        .from_local_datetime(&today)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}
