//! Context type for tracing which actor caused a change

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Origin marker carried by service calls and the states they produce
///
/// A state written by a service handler carries a child of the call's
/// context, so log lines can tie a panel transition back to the request
/// that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// Parent context ID for tracking causality chains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: None,
        }
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_parent() {
        let root = Context::new();
        let child = root.child();
        assert_ne!(root.id, child.id);
        assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
        assert!(root.parent_id.is_none());
    }
}
