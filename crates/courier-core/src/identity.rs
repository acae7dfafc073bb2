//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the marketplace identifiers. These prevent
//! accidental identifier confusion: a `SensorId` cannot be passed where a
//! `UserId` is expected.
//!
//! `UserId` and `SensorId` are externally chosen strings (a login name and
//! a device serial). They are validated on construction and on
//! deserialization, so every instance in memory is well-formed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of a string identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Unique identifier for a delivery contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(Uuid);

/// Principal identifier of a marketplace user (proposer or courier).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Serial identifier of a telemetry sensor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorId(String);

impl ContractId {
    /// Generate a new random contract identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (e.g. loaded from storage or a URL path).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "contract:{}", self.0)
    }
}

impl UserId {
    /// Validate and wrap a user identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        validate_token("user_id", raw.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SensorId {
    /// Validate and wrap a sensor identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        validate_token("sensor_id", raw.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for SensorId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<SensorId> for String {
    fn from(id: SensorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared rule for string identifiers: non-empty, bounded, no whitespace
/// or control characters.
fn validate_token(kind: &'static str, raw: String) -> Result<String, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier { kind });
    }
    let len = raw.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
            len,
        });
    }
    if let Some(found) = raw.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidCharacter { kind, found });
    }
    Ok(raw)
}
