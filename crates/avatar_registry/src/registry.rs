//! Avatar registry implementation
//!
//! Records ownership and mutable metadata for avatars, each of which points
//! at external content by hash. Avatars are never deleted; ownership moves
//! by transfer and attributes only ever grow.

use crate::errors::*;
use crate::events::RegistryEvent;
use crate::types::*;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Mutable registry state, guarded as a single unit
#[derive(Debug, Clone)]
pub(crate) struct RegistryState {
    /// Avatar id → avatar
    pub(crate) avatars: HashMap<u64, Avatar>,
    /// Owner identity → ids currently owned
    pub(crate) owner_to_avatars: HashMap<Identity, Vec<u64>>,
    /// Identities that ever created or received an avatar
    pub(crate) registered: HashSet<Identity>,
    pub(crate) next_id: u64,
    pub(crate) total_records: u64,
    /// Every event published so far, in order
    pub(crate) events: Vec<RegistryEvent>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            avatars: HashMap::new(),
            owner_to_avatars: HashMap::new(),
            registered: HashSet::new(),
            next_id: 1,
            total_records: 0,
            events: Vec::new(),
        }
    }
}

impl RegistryState {
    fn check_range(&self, id: u64) -> Result<()> {
        if id == 0 || id >= self.next_id {
            return Err(RegistryError::NotFound { id });
        }
        Ok(())
    }

    /// Owner-only access; the avatar may be inactive.
    fn owned_mut(&mut self, id: u64, caller: &Identity) -> Result<&mut Avatar> {
        self.check_range(id)?;
        let avatar = self
            .avatars
            .get_mut(&id)
            .ok_or(RegistryError::NotFound { id })?;
        if avatar.owner != *caller {
            return Err(RegistryError::Unauthorized { id: Some(id) });
        }
        Ok(avatar)
    }

    /// Owner-only access to an active avatar.
    fn active_owned_mut(&mut self, id: u64, caller: &Identity) -> Result<&mut Avatar> {
        let avatar = self.owned_mut(id, caller)?;
        if !avatar.is_active {
            return Err(RegistryError::Inactive { id });
        }
        Ok(avatar)
    }
}

/// Remove every occurrence of `id` from an owner index.
///
/// A matching slot is filled with the current last element and examined
/// again, so duplicate entries are purged as well.
pub(crate) fn remove_from_index(list: &mut Vec<u64>, id: u64) {
    let mut i = 0;
    while i < list.len() {
        if list[i] == id {
            list.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Avatar Registry
///
/// All state sits behind one lock. Mutations hold the write lock from their
/// first precondition check until the event is published, so no caller
/// observes a half-applied change and a failed call changes nothing.
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    pub(crate) state: RwLock<RegistryState>,
    events_tx: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_state(config, RegistryState::default())
    }

    pub(crate) fn with_state(config: RegistryConfig, state: RegistryState) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            state: RwLock::new(state),
            events_tx,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Privileged identity set at initialization
    pub fn admin(&self) -> &Identity {
        &self.config.admin
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events_tx.subscribe()
    }

    /// Create a new avatar owned by `caller`
    pub fn create(&self, registration: AvatarRegistration, caller: &Identity) -> Result<u64> {
        if registration.name.is_empty() {
            return Err(RegistryError::invalid("name must not be empty"));
        }
        if registration.content_hash.is_empty() {
            return Err(RegistryError::invalid("content hash must not be empty"));
        }

        let mut state = self.state.write();
        let id = state.next_id;

        let avatar = Avatar {
            id,
            name: registration.name,
            content_hash: registration.content_hash,
            owner: *caller,
            created_at: unix_now(),
            is_active: true,
            level: 1,
            attributes: registration.attributes,
        };
        let name = avatar.name.clone();

        state.avatars.insert(id, avatar);
        state.owner_to_avatars.entry(*caller).or_default().push(id);
        state.registered.insert(*caller);
        state.next_id += 1;
        state.total_records += 1;

        info!(id, owner = %caller, name = %name, "avatar created");
        self.publish(
            &mut state,
            RegistryEvent::Created {
                id,
                owner: *caller,
                name,
            },
        );

        Ok(id)
    }

    /// Update an active avatar owned by `caller`
    pub fn update(&self, update: AvatarUpdate, caller: &Identity) -> Result<()> {
        let mut state = self.state.write();
        let avatar = state.active_owned_mut(update.id, caller)?;

        let level = avatar
            .level
            .checked_add(update.level_increase)
            .ok_or_else(|| {
                RegistryError::invalid(format!(
                    "level increase {} overflows level {}",
                    update.level_increase, avatar.level
                ))
            })?;

        if !update.name.is_empty() {
            avatar.name = update.name;
        }
        if !update.content_hash.is_empty() {
            avatar.content_hash = update.content_hash;
        }
        avatar.level = level;
        avatar.attributes.extend(update.attributes);

        let event = RegistryEvent::Updated {
            id: avatar.id,
            name: avatar.name.clone(),
            level: avatar.level,
        };
        debug!(
            id = avatar.id,
            level = avatar.level,
            attributes = avatar.attributes.len(),
            "avatar updated"
        );
        self.publish(&mut state, event);

        Ok(())
    }

    /// Transfer an active avatar from `caller` to `new_owner`
    pub fn transfer(&self, id: u64, new_owner: &Identity, caller: &Identity) -> Result<()> {
        let mut state = self.state.write();
        let avatar = state.active_owned_mut(id, caller)?;

        if new_owner.is_null() {
            return Err(RegistryError::invalid("cannot transfer to the null identity"));
        }
        if new_owner == caller {
            return Err(RegistryError::invalid("cannot transfer to self"));
        }

        let previous_owner = avatar.owner;
        avatar.owner = *new_owner;

        if let Some(list) = state.owner_to_avatars.get_mut(&previous_owner) {
            remove_from_index(list, id);
        }
        state
            .owner_to_avatars
            .entry(*new_owner)
            .or_default()
            .push(id);
        state.registered.insert(*new_owner);

        info!(id, from = %previous_owner, to = %new_owner, "avatar transferred");
        self.publish(
            &mut state,
            RegistryEvent::Transferred {
                id,
                from: previous_owner,
                to: *new_owner,
            },
        );

        Ok(())
    }

    /// Deactivate an active avatar owned by `caller`
    pub fn deactivate(&self, id: u64, caller: &Identity) -> Result<()> {
        let mut state = self.state.write();
        let avatar = state.active_owned_mut(id, caller)?;
        avatar.is_active = false;
        debug!(id, "avatar deactivated");
        Ok(())
    }

    /// Reactivate an avatar owned by `caller`
    ///
    /// Gated on ownership only, so a deactivated avatar can be brought back.
    pub fn reactivate(&self, id: u64, caller: &Identity) -> Result<()> {
        let mut state = self.state.write();
        let avatar = state.owned_mut(id, caller)?;
        avatar.is_active = true;
        debug!(id, "avatar reactivated");
        Ok(())
    }

    /// Fetch a snapshot of an avatar
    pub fn get_avatar(&self, id: u64) -> Result<Avatar> {
        let state = self.state.read();
        state.check_range(id)?;
        state
            .avatars
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// List the ids currently owned by an identity
    pub fn owned_ids(&self, owner: &Identity) -> Vec<u64> {
        let state = self.state.read();
        state
            .owner_to_avatars
            .get(owner)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of avatars ever created
    pub fn total_records(&self) -> u64 {
        self.state.read().total_records
    }

    /// Id the next created avatar will receive
    pub fn next_id(&self) -> u64 {
        self.state.read().next_id
    }

    /// Whether an identity ever created or received an avatar
    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.state.read().registered.contains(identity)
    }

    pub fn registered_count(&self) -> usize {
        self.state.read().registered.len()
    }

    /// Events published so far, oldest first
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.state.read().events.clone()
    }

    /// Emergency pause. Reserved for future use: checks the caller and
    /// changes nothing.
    pub fn emergency_pause(&self, caller: &Identity) -> Result<()> {
        if *caller != self.config.admin {
            warn!(caller = %caller, "emergency pause rejected");
            return Err(RegistryError::Unauthorized { id: None });
        }
        warn!(caller = %caller, "emergency pause requested; no action taken");
        Ok(())
    }

    fn publish(&self, state: &mut RegistryState, event: RegistryEvent) {
        state.events.push(event.clone());
        // No subscribers is fine; the event log still has it.
        let _ = self.events_tx.send(event);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
