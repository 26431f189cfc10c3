//! In-process host for homeguard
//!
//! [`LocalHost`] implements [`guard_core::Host`] on top of a concurrent state
//! store, a service registry with simulated device domains and a timer table.
//! [`HostRuntime`] turns state changes and due timers into [`guard_core::Reactor`]
//! callbacks, either from an async loop driven by the system clock or
//! synchronously against a manual [`Clock`] for tests.

mod bus;
mod clock;
mod local;
mod runtime;
mod services;
mod simulated;
mod store;
mod timers;

pub use bus::ChangeBus;
pub use clock::Clock;
pub use local::LocalHost;
pub use runtime::{HostRuntime, ShutdownHandle};
pub use services::{ServiceHandler, ServiceRegistry};
pub use simulated::register_simulated_services;
pub use store::StateStore;
