//! Types for the avatar registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of raw bytes in an identity.
pub const IDENTITY_BYTES: usize = 32;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Errors that can occur when parsing an identity string.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("identity is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Verified caller identity (32-byte account identifier)
///
/// The all-zero identity is the null identity and never owns a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(pub [u8; IDENTITY_BYTES]);

impl Identity {
    /// The null identity
    pub const NULL: Identity = Identity([0u8; IDENTITY_BYTES]);

    /// Create from byte array
    pub fn new(bytes: [u8; IDENTITY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Get as byte array
    pub fn as_bytes(&self) -> &[u8; IDENTITY_BYTES] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; IDENTITY_BYTES]
    }
}

impl From<[u8; IDENTITY_BYTES]> for Identity {
    fn from(value: [u8; IDENTITY_BYTES]) -> Self {
        Identity(value)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let payload = value.strip_prefix("0x").unwrap_or(value);
        if payload.len() != IDENTITY_BYTES * 2 {
            return Err(IdentityError::InvalidLength {
                expected: IDENTITY_BYTES * 2,
                actual: payload.len(),
            });
        }

        let mut bytes = [0u8; IDENTITY_BYTES];
        hex::decode_to_slice(payload, &mut bytes)?;
        Ok(Identity(bytes))
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A registered avatar record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    /// Unique identifier, assigned from `next_id`
    pub id: u64,
    /// Display label
    pub name: String,
    /// Reference into external content-addressed storage
    pub content_hash: String,
    /// Current owner
    pub owner: Identity,
    /// Creation timestamp (unix seconds)
    pub created_at: u64,
    /// Inactive avatars reject owner-gated mutation
    pub is_active: bool,
    pub level: u64,
    /// Append-only attribute list
    pub attributes: Vec<String>,
}

/// Avatar creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarRegistration {
    pub name: String,
    pub content_hash: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl AvatarRegistration {
    pub fn new(
        name: impl Into<String>,
        content_hash: impl Into<String>,
        attributes: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_hash: content_hash.into(),
            attributes,
        }
    }
}

/// Avatar update request
///
/// An empty `name` or `content_hash` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarUpdate {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub level_increase: u64,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl AvatarUpdate {
    /// Update that changes nothing but can be filled in field by field
    pub fn for_avatar(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Privileged identity allowed to call administrative operations
    pub admin: Identity,
    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl RegistryConfig {
    pub fn with_admin(admin: Identity) -> Self {
        Self {
            admin,
            ..Default::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin: Identity::NULL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
