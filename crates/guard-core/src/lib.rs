//! Core types for homeguard
//!
//! Value types shared between the alarm engine and whatever host it runs on
//! (EntityId, State, Context, ServiceCall), plus the two traits that form the
//! seam between them: [`Host`] is what the engine consumes, [`Reactor`] is what
//! the host drives.

mod context;
mod entity_id;
mod host;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use host::{Host, ListenerId, Reactor, StateChange, TimerHandle, TimerKind};
pub use service_call::{ServiceCall, ServiceError};
pub use state::State;

/// State value for binary entities that are active
pub const STATE_ON: &str = "on";

/// State value for binary entities that are inactive
pub const STATE_OFF: &str = "off";

/// State value reported when the host does not know the value
pub const STATE_UNKNOWN: &str = "unknown";

/// State value reported when the device cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Device tracker state for a person at home
pub const STATE_HOME: &str = "home";

/// Well-known attribute names
pub mod attrs {
    pub const DEVICE_CLASS: &str = "device_class";
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const EVENT_TYPE: &str = "event_type";
    pub const BRIGHTNESS: &str = "brightness";
    pub const RGB_COLOR: &str = "rgb_color";
}
