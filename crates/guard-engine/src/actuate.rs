//! Fire-and-forget service calls

use guard_core::{EntityId, Host};
use serde_json::{json, Value};
use tracing::{trace, warn};

/// Call a service, logging a refusal; failures are never retried here
pub(crate) fn call<H: Host + ?Sized>(host: &H, domain: &str, service: &str, data: Value) -> bool {
    trace!(domain, service, %data, "Calling service");
    match host.call_service(domain, service, data) {
        Ok(()) => true,
        Err(e) => {
            warn!(domain, service, error = %e, "Service call failed");
            false
        }
    }
}

/// `turn_on`/`turn_off`/`toggle` on an entity in its own domain
pub(crate) fn switch<H: Host + ?Sized>(host: &H, entity_id: &EntityId, service: &str) -> bool {
    call(
        host,
        entity_id.domain(),
        service,
        json!({ "entity_id": entity_id.to_string() }),
    )
}
