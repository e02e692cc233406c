//! Serializable registry snapshots
//!
//! Used to persist the registry between processes. Restoring validates the
//! ownership invariants before the state is accepted.

use crate::errors::*;
use crate::events::RegistryEvent;
use crate::registry::{Registry, RegistryState};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Owner index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerEntry {
    pub owner: Identity,
    pub avatar_ids: Vec<u64>,
}

/// Point-in-time copy of all registry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub next_id: u64,
    pub total_records: u64,
    /// Avatars ordered by id
    pub avatars: Vec<Avatar>,
    /// Owner index, ordered by owner
    pub owners: Vec<OwnerEntry>,
    /// Registered identities, sorted
    pub registered: Vec<Identity>,
    #[serde(default)]
    pub events: Vec<RegistryEvent>,
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        (&RegistryState::default()).into()
    }
}

impl RegistrySnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    fn into_state(self) -> Result<RegistryState> {
        if self.next_id == 0 {
            return Err(RegistryError::corrupt("next_id must start at 1"));
        }
        if self.total_records != self.next_id - 1 {
            return Err(RegistryError::corrupt(format!(
                "total_records {} does not match next_id {}",
                self.total_records, self.next_id
            )));
        }
        if self.avatars.len() as u64 != self.total_records {
            return Err(RegistryError::corrupt(format!(
                "expected {} avatars, found {}",
                self.total_records,
                self.avatars.len()
            )));
        }

        let mut avatars = HashMap::with_capacity(self.avatars.len());
        for avatar in self.avatars {
            if avatar.id == 0 || avatar.id >= self.next_id {
                return Err(RegistryError::corrupt(format!(
                    "avatar id {} outside 1..{}",
                    avatar.id, self.next_id
                )));
            }
            if avatar.level == 0 {
                return Err(RegistryError::corrupt(format!(
                    "avatar {} has level 0",
                    avatar.id
                )));
            }
            let id = avatar.id;
            if avatars.insert(id, avatar).is_some() {
                return Err(RegistryError::corrupt(format!("duplicate avatar id {id}")));
            }
        }

        let mut owner_to_avatars: HashMap<Identity, Vec<u64>> = HashMap::new();
        let mut indexed = HashSet::new();
        for entry in self.owners {
            for id in &entry.avatar_ids {
                let avatar = avatars.get(id).ok_or_else(|| {
                    RegistryError::corrupt(format!("owner index references unknown avatar {id}"))
                })?;
                if avatar.owner != entry.owner {
                    return Err(RegistryError::corrupt(format!(
                        "avatar {id} indexed under {} but owned by {}",
                        entry.owner, avatar.owner
                    )));
                }
                if !indexed.insert(*id) {
                    return Err(RegistryError::corrupt(format!(
                        "avatar {id} indexed more than once"
                    )));
                }
            }
            owner_to_avatars
                .entry(entry.owner)
                .or_default()
                .extend(entry.avatar_ids);
        }
        if let Some(id) = avatars.keys().find(|id| !indexed.contains(*id)) {
            return Err(RegistryError::corrupt(format!(
                "avatar {id} missing from owner index"
            )));
        }

        let registered: HashSet<Identity> = self.registered.into_iter().collect();
        let unregistered = owner_to_avatars
            .keys()
            .chain(avatars.values().map(|avatar| &avatar.owner))
            .find(|owner| !registered.contains(*owner));
        if let Some(owner) = unregistered {
            return Err(RegistryError::corrupt(format!(
                "owner {owner} missing from registered identities"
            )));
        }

        Ok(RegistryState {
            avatars,
            owner_to_avatars,
            registered,
            next_id: self.next_id,
            total_records: self.total_records,
            events: self.events,
        })
    }
}

impl From<&RegistryState> for RegistrySnapshot {
    fn from(state: &RegistryState) -> Self {
        let mut avatars: Vec<Avatar> = state.avatars.values().cloned().collect();
        avatars.sort_by_key(|avatar| avatar.id);

        let mut owners: Vec<OwnerEntry> = state
            .owner_to_avatars
            .iter()
            .map(|(owner, ids)| OwnerEntry {
                owner: *owner,
                avatar_ids: ids.clone(),
            })
            .collect();
        owners.sort_by(|a, b| a.owner.cmp(&b.owner));

        let mut registered: Vec<Identity> = state.registered.iter().copied().collect();
        registered.sort();

        Self {
            next_id: state.next_id,
            total_records: state.total_records,
            avatars,
            owners,
            registered,
            events: state.events.clone(),
        }
    }
}

impl Registry {
    /// Capture the current state
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot::from(&*state)
    }

    /// Rebuild a registry from a snapshot
    pub fn from_snapshot(config: RegistryConfig, snapshot: RegistrySnapshot) -> Result<Self> {
        let state = snapshot.into_state()?;
        Ok(Self::with_state(config, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> Registry {
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let registry = Registry::default();
        for name in ["one", "two", "three"] {
            registry
                .create(AvatarRegistration::new(name, "QmHash", vec![]), &alice)
                .unwrap();
        }
        registry.transfer(2, &bob, &alice).unwrap();
        registry.deactivate(3, &alice).unwrap();
        registry
    }

    #[test]
    fn test_snapshot_restores_state() {
        let registry = populated();
        let snapshot = registry.snapshot();
        let json = snapshot.to_json().unwrap();

        let decoded = RegistrySnapshot::from_json(&json).unwrap();
        let restored = Registry::from_snapshot(RegistryConfig::default(), decoded).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.next_id(), 4);
        assert_eq!(restored.total_records(), 3);
        assert_eq!(restored.owned_ids(&Identity([2u8; 32])), vec![2]);
        assert!(!restored.get_avatar(3).unwrap().is_active);
        assert_eq!(restored.events(), registry.events());
    }

    #[test]
    fn test_restored_registry_continues_id_sequence() {
        let registry = populated();
        let restored =
            Registry::from_snapshot(RegistryConfig::default(), registry.snapshot()).unwrap();
        let id = restored
            .create(
                AvatarRegistration::new("four", "QmHash", vec![]),
                &Identity([1u8; 32]),
            )
            .unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = RegistrySnapshot::default();
        assert_eq!(snapshot.next_id, 1);
        let registry = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap();
        assert_eq!(registry.total_records(), 0);
    }

    #[test]
    fn test_rejects_counter_mismatch() {
        let mut snapshot = populated().snapshot();
        snapshot.total_records = 2;
        let err = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_rejects_index_owner_mismatch() {
        let mut snapshot = populated().snapshot();
        let moved = snapshot.owners[1].avatar_ids.pop().unwrap();
        snapshot.owners[0].avatar_ids.push(moved);
        let err = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_rejects_unindexed_avatar() {
        let mut snapshot = populated().snapshot();
        for entry in &mut snapshot.owners {
            entry.avatar_ids.retain(|id| *id != 1);
        }
        let err = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::CorruptSnapshot { .. }));
    }

    #[test]
    fn test_rejects_unregistered_owner() {
        let mut snapshot = populated().snapshot();
        snapshot.registered.clear();
        let err = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::CorruptSnapshot { .. }));

        let mut snapshot = populated().snapshot();
        let bob = Identity([2u8; 32]);
        snapshot.registered.retain(|identity| *identity != bob);
        let err = Registry::from_snapshot(RegistryConfig::default(), snapshot).unwrap_err();
        assert!(err.to_string().contains("missing from registered"));
    }
}
