//! Entity handle of the form `domain.object_id`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for malformed entity ids in configuration or host data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("'{0}' must contain exactly one '.' separator")]
    InvalidFormat(String),

    #[error("'{0}' has an empty domain")]
    EmptyDomain(String),

    #[error("'{0}' has an empty object id")]
    EmptyObjectId(String),

    #[error("'{0}' may only contain lowercase letters, digits and single underscores")]
    InvalidChars(String),
}

/// Identifies one entity on the host, e.g. `binary_sensor.front_door`
///
/// Sensors, trackers, mode toggles, lights, sirens and the alarm panel are all
/// addressed this way. Ordering is lexicographic so that sets of ids iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();
        let full = format!("{domain}.{object_id}");

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain(full));
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId(full));
        }
        if !is_slug(&domain) || domain.contains("__") || !is_slug(&object_id) {
            return Err(EntityIdError::InvalidChars(full));
        }

        Ok(Self { domain, object_id })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// True when this entity lives in `domain`
    pub fn is_domain(&self, domain: &str) -> bool {
        self.domain == domain
    }

    /// Object id with underscores replaced by spaces, used when an entity has
    /// no friendly name
    pub fn fallback_name(&self) -> String {
        self.object_id.replace('_', " ")
    }
}

fn is_slug(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}
