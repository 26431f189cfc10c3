//! `Host` implementation backed by in-process components

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, NaiveTime, Offset, Utc};
use dashmap::DashMap;
use guard_config::SimulatedEntity;
use guard_core::{
    Context, EntityId, Host, ListenerId, ServiceCall, ServiceError, State, StateChange, TimerHandle,
    TimerKind,
};
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use crate::bus::ChangeBus;
use crate::clock::Clock;
use crate::services::ServiceRegistry;
use crate::simulated::register_simulated_services;
use crate::store::StateStore;
use crate::timers::{next_daily, Repeat, TimerAction, TimerEntry, TimerTable};

/// The in-process host
///
/// States, services and timers live here; delivery of changes and timer
/// callbacks to a reactor is the job of [`crate::HostRuntime`].
pub struct LocalHost {
    clock: Clock,
    /// Offset used for `local_now` and daily timers
    offset: FixedOffset,
    bus: Arc<ChangeBus>,
    store: StateStore,
    services: ServiceRegistry,
    timers: Mutex<TimerTable>,
    /// Hold durations requested per entity; `None` means plain delivery
    listeners: DashMap<EntityId, Vec<(ListenerId, Option<Duration>)>>,
    next_listener_id: AtomicU64,
}

impl LocalHost {
    /// Host with no services registered, using the machine's current UTC offset
    pub fn new(clock: Clock) -> Self {
        let offset = Local::now().offset().fix();
        Self::with_offset(clock, offset)
    }

    pub fn with_offset(clock: Clock, offset: FixedOffset) -> Self {
        let bus = Arc::new(ChangeBus::new());
        Self {
            clock,
            offset,
            store: StateStore::new(bus.clone()),
            bus,
            services: ServiceRegistry::new(),
            timers: Mutex::new(TimerTable::default()),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Host with the simulated device domains registered
    pub fn simulated(clock: Clock, offset: FixedOffset) -> Self {
        let host = Self::with_offset(clock, offset);
        register_simulated_services(&host.services);
        host
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.bus.subscribe()
    }

    /// Write a state as an outside actor would (a sensor reporting, a user
    /// flipping a toggle)
    pub fn set_state(
        &self,
        entity_id: &EntityId,
        state: &str,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        self.store
            .set(entity_id.clone(), state, attributes, Context::new(), self.clock.now())
    }

    /// Like [`set_state`](Self::set_state) but keeps existing attributes
    pub fn set_value(&self, entity_id: &EntityId, state: &str) -> State {
        self.store
            .set_value(entity_id.clone(), state, Context::new(), self.clock.now())
    }

    /// Load initial entity states
    pub fn seed(&self, entities: &[SimulatedEntity]) {
        for entity in entities {
            debug!(entity_id = %entity.entity_id, state = %entity.state, "Seeding entity");
            self.set_state(&entity.entity_id, &entity.state, entity.attributes.clone());
        }
    }

    pub fn service_calls(&self) -> Vec<ServiceCall> {
        self.services.calls()
    }

    pub fn clear_service_calls(&self) {
        self.services.clear_calls();
    }

    pub fn pending_timers(&self) -> usize {
        self.timers().len()
    }

    pub fn is_timer_pending(&self, handle: TimerHandle) -> bool {
        self.timers().contains(handle)
    }

    pub(crate) fn has_listener(&self, entity_id: &EntityId) -> bool {
        self.listeners.contains_key(entity_id)
    }

    /// Distinct hold durations subscribed for `entity_id`
    pub(crate) fn holds_for(&self, entity_id: &EntityId) -> Vec<Duration> {
        let mut holds: Vec<Duration> = self
            .listeners
            .get(entity_id)
            .map(|l| l.iter().filter_map(|(_, hold)| *hold).collect())
            .unwrap_or_default();
        holds.sort();
        holds.dedup();
        holds
    }

    pub(crate) fn schedule_hold(
        &self,
        entity_id: EntityId,
        hold: Duration,
        old_state: Option<State>,
        since: DateTime<Utc>,
    ) {
        trace!(%entity_id, hold_secs = hold.num_seconds(), "Scheduling hold check");
        self.timers().schedule(
            since + hold,
            Repeat::Once,
            TimerAction::Hold {
                entity_id,
                hold,
                old_state,
                since,
            },
        );
    }

    pub(crate) fn next_timer_due(&self) -> Option<DateTime<Utc>> {
        self.timers().next_due()
    }

    pub(crate) fn pop_due_timer(&self) -> Option<TimerEntry> {
        let now = self.clock.now();
        self.timers().pop_due(now)
    }

    fn timers(&self) -> MutexGuard<'_, TimerTable> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Host for LocalHost {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.offset).naive_local()
    }

    fn get_state(&self, entity_id: &EntityId) -> Option<State> {
        self.store.get(entity_id)
    }

    fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: serde_json::Value,
    ) -> Result<(), ServiceError> {
        self.services
            .call(domain, service, data, &self.store, self.clock.now())
    }

    #[instrument(skip(self), fields(entity_id = %entity_id))]
    fn listen_state(&self, entity_id: &EntityId, hold: Option<Duration>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .entry(entity_id.clone())
            .or_default()
            .push((id, hold));
        debug!(listener = id.0, "Listening for state changes");
        id
    }

    fn run_in(&self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let due = self.clock.now() + delay;
        self.timers()
            .schedule(due, Repeat::Once, TimerAction::Fire(kind))
    }

    fn run_every(&self, first: Duration, interval: Duration, kind: TimerKind) -> TimerHandle {
        let due = self.clock.now() + first;
        self.timers()
            .schedule(due, Repeat::Every(interval), TimerAction::Fire(kind))
    }

    fn run_daily(&self, at: NaiveTime, kind: TimerKind) -> TimerHandle {
        let due = next_daily(self.clock.now(), at, self.offset);
        self.timers()
            .schedule(due, Repeat::Daily, TimerAction::Fire(kind))
    }

    fn cancel_timer(&self, handle: TimerHandle) {
        if self.timers().cancel(handle) {
            trace!(handle = handle.0, "Cancelled timer");
        }
    }
}
