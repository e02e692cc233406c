//! Avatar Registry
//!
//! Records ownership and mutable metadata for uniquely identified avatars.
//! Each avatar points at external content by hash, can be transferred
//! between identities and only ever gains attributes and levels.

pub mod content;
pub mod errors;
pub mod events;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use content::{ContentHash, ContentStore, ContentStoreError, MemoryContentStore};
pub use errors::*;
pub use events::RegistryEvent;
pub use registry::Registry;
pub use snapshot::{OwnerEntry, RegistrySnapshot};
pub use types::*;
