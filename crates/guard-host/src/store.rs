//! Concurrent entity state store

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use guard_core::{Context, EntityId, State, StateChange};
use tracing::{debug, instrument};

use crate::bus::ChangeBus;

/// Current state of every entity, keyed by id
///
/// Every write is published on the [`ChangeBus`], including writes that only
/// touch attributes.
pub struct StateStore {
    states: DashMap<EntityId, State>,
    bus: Arc<ChangeBus>,
}

impl StateStore {
    pub fn new(bus: Arc<ChangeBus>) -> Self {
        Self {
            states: DashMap::new(),
            bus,
        }
    }

    /// Write a state, keeping `last_changed` if the value is unchanged
    #[instrument(skip(self, state, attributes, context, now), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
        now: DateTime<Utc>,
    ) -> State {
        let old_state = self.get(&entity_id);

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context, now),
            None => State::new(entity_id.clone(), state, attributes, context, now),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting entity state"
        );

        self.states.insert(entity_id.clone(), new_state.clone());

        self.bus.fire(StateChange {
            entity_id,
            old_state,
            new_state: Some(new_state.clone()),
            held_for: None,
        });

        new_state
    }

    /// Write only the value, keeping existing attributes
    pub fn set_value(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        context: Context,
        now: DateTime<Utc>,
    ) -> State {
        let attributes = self
            .get(&entity_id)
            .map(|s| s.attributes)
            .unwrap_or_default();
        self.set(entity_id, state, attributes, context, now)
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    pub fn is_state(&self, entity_id: &EntityId, state: &str) -> bool {
        self.states
            .get(entity_id)
            .map(|s| s.state == state)
            .unwrap_or(false)
    }

}
