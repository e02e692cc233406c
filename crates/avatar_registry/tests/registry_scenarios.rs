use avatar_registry::{
    AvatarRegistration, AvatarUpdate, Identity, Registry, RegistryConfig, RegistryError,
    RegistryEvent,
};
use std::sync::Arc;
use std::thread;

fn identity(byte: u8) -> Identity {
    Identity([byte; 32])
}

#[test]
fn hero_lifecycle() {
    let a = identity(0xAA);
    let b = identity(0xBB);
    let registry = Registry::new(RegistryConfig::with_admin(a));

    let id = registry
        .create(
            AvatarRegistration::new("Hero", "Qm123", vec!["Str:10".into()]),
            &a,
        )
        .unwrap();
    assert_eq!(id, 1);
    let avatar = registry.get_avatar(id).unwrap();
    assert_eq!(avatar.level, 1);
    assert_eq!(avatar.owner, a);

    registry
        .update(
            AvatarUpdate {
                id,
                name: String::new(),
                content_hash: String::new(),
                level_increase: 3,
                attributes: vec!["Agi:5".into()],
            },
            &a,
        )
        .unwrap();
    let avatar = registry.get_avatar(id).unwrap();
    assert_eq!(avatar.level, 4);
    assert_eq!(avatar.attributes, vec!["Str:10", "Agi:5"]);

    registry.transfer(id, &b, &a).unwrap();
    assert_eq!(registry.get_avatar(id).unwrap().owner, b);
    assert!(registry.owned_ids(&a).is_empty());
    assert_eq!(registry.owned_ids(&b), vec![1]);

    let err = registry
        .update(AvatarUpdate::for_avatar(id), &a)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Unauthorized { .. }));
}

#[test]
fn empty_name_leaves_state_unchanged() {
    let a = identity(1);
    let registry = Registry::default();

    let err = registry
        .create(AvatarRegistration::new("", "Qm123", vec![]), &a)
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument { .. }));
    assert_eq!(registry.next_id(), 1);
    assert_eq!(registry.total_records(), 0);
    assert!(registry.owned_ids(&a).is_empty());
}

#[test]
fn deactivated_avatar_stays_queryable() {
    let a = identity(1);
    let registry = Registry::default();
    let id = registry
        .create(AvatarRegistration::new("Hero", "Qm123", vec![]), &a)
        .unwrap();

    registry.deactivate(id, &a).unwrap();

    let err = registry
        .update(AvatarUpdate::for_avatar(id), &a)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Inactive { .. }));

    let avatar = registry.get_avatar(id).unwrap();
    assert!(!avatar.is_active);
    assert_eq!(registry.owned_ids(&a), vec![id]);
}

#[test]
fn lookup_beyond_next_id_is_not_found() {
    let registry = Registry::default();
    registry
        .create(AvatarRegistration::new("Hero", "Qm123", vec![]), &identity(1))
        .unwrap();
    assert_eq!(registry.next_id(), 2);

    let err = registry.get_avatar(999).unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { id: 999 }));
}

#[test]
fn transfer_chain_keeps_single_index_entry() {
    let owners: Vec<Identity> = (1..=4).map(identity).collect();
    let registry = Registry::default();
    let id = registry
        .create(AvatarRegistration::new("Nomad", "QmNomad", vec![]), &owners[0])
        .unwrap();

    for pair in owners.windows(2) {
        registry.transfer(id, &pair[1], &pair[0]).unwrap();
    }

    for owner in &owners[..3] {
        assert!(registry.owned_ids(owner).is_empty());
        assert!(registry.is_registered(owner));
    }
    assert_eq!(registry.owned_ids(&owners[3]), vec![id]);

    let transfers = registry
        .events()
        .into_iter()
        .filter(|event| matches!(event, RegistryEvent::Transferred { .. }))
        .count();
    assert_eq!(transfers, 3);
}

#[test]
fn concurrent_creates_allocate_unique_ids() {
    let registry = Arc::new(Registry::default());
    let handles: Vec<_> = (0u8..8)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let owner = identity(worker + 1);
                (0..25)
                    .map(|n| {
                        registry
                            .create(
                                AvatarRegistration::new(format!("w{worker}-{n}"), "QmHash", vec![]),
                                &owner,
                            )
                            .unwrap()
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=200).collect::<Vec<u64>>());
    assert_eq!(registry.total_records(), 200);
    assert_eq!(registry.next_id(), 201);
    assert_eq!(registry.registered_count(), 8);
}
