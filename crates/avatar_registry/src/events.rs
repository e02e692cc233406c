//! Notifications emitted after registry mutations

use crate::types::Identity;
use serde::{Deserialize, Serialize};

/// Event published once a mutation has been fully applied.
///
/// Deactivate and reactivate do not publish events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    Created {
        id: u64,
        owner: Identity,
        name: String,
    },
    Updated {
        id: u64,
        name: String,
        level: u64,
    },
    Transferred {
        id: u64,
        from: Identity,
        to: Identity,
    },
}

impl RegistryEvent {
    /// Avatar the event refers to
    pub fn avatar_id(&self) -> u64 {
        match self {
            RegistryEvent::Created { id, .. }
            | RegistryEvent::Updated { id, .. }
            | RegistryEvent::Transferred { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::Created { .. } => "created",
            RegistryEvent::Updated { .. } => "updated",
            RegistryEvent::Transferred { .. } => "transferred",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_json() {
        let event = RegistryEvent::Transferred {
            id: 9,
            from: Identity([1u8; 32]),
            to: Identity([2u8; 32]),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "Transferred");
        assert_eq!(value["id"], 9);
        assert_eq!(value["to"], "02".repeat(32));
        assert_eq!(event.avatar_id(), 9);
        assert_eq!(event.kind(), "transferred");
    }
}
