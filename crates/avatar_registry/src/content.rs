//! External content-addressed store
//!
//! Avatars only carry a content hash; the bytes live elsewhere. The registry
//! never calls this layer, it exists for clients that publish content before
//! creating an avatar.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while talking to a content store.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("content store backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for ContentStoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Backend(value.to_string())
    }
}

/// Opaque content reference as stored on an avatar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentHash, ContentStoreError>;

    async fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>, ContentStoreError>;
}

/// In-memory store keyed by the BLAKE3 hash of the content.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<ContentHash, Vec<u8>>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash that `put` would assign to `bytes`
    pub fn hash_of(bytes: &[u8]) -> ContentHash {
        ContentHash(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentHash, ContentStoreError> {
        let hash = Self::hash_of(&bytes);
        self.blobs.write().insert(hash.clone(), bytes);
        Ok(hash)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>, ContentStoreError> {
        Ok(self.blobs.read().get(hash).cloned())
    }
}
