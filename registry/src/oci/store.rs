//! In-memory content-addressed store.
//!
//! Holds every manifest and config blob fetched or produced during one
//! invocation, keyed by digest. Nothing is evicted and nothing outlives the
//! process.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mlist_core::error::{ListError, Result};

use super::manifest::Descriptor;

/// Content stored under one digest.
#[derive(Debug, Clone)]
pub struct StoredContent {
    /// Media type recorded when the content was first stored
    pub media_type: String,
    /// Raw bytes
    pub data: Arc<Vec<u8>>,
}

/// Thread-safe digest → bytes cache scoped to one push or inspect run.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredContent>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under the descriptor's digest.
    ///
    /// Storing identical bytes again is a no-op. Storing different bytes under
    /// an existing digest fails with [`ListError::StoreConflict`].
    pub fn set(&self, descriptor: &Descriptor, data: Vec<u8>) -> Result<()> {
        match self.entries.entry(descriptor.digest.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().data.as_slice() != data.as_slice() {
                    return Err(ListError::StoreConflict {
                        digest: descriptor.digest.clone(),
                    });
                }
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(StoredContent {
                    media_type: descriptor.media_type.clone(),
                    data: Arc::new(data),
                });
                Ok(())
            }
        }
    }

    /// Bytes previously stored for the descriptor's digest.
    pub fn get(&self, descriptor: &Descriptor) -> Option<Arc<Vec<u8>>> {
        self.get_by_digest(&descriptor.digest)
    }

    /// Bytes previously stored under `digest`.
    pub fn get_by_digest(&self, digest: &str) -> Option<Arc<Vec<u8>>> {
        self.entries.get(digest).map(|entry| Arc::clone(&entry.data))
    }

    /// Full entry (media type and bytes) for `digest`.
    pub fn content(&self, digest: &str) -> Option<StoredContent> {
        self.entries.get(digest).map(|entry| entry.clone())
    }

    /// Whether `digest` has been stored.
    pub fn contains(&self, digest: &str) -> bool {
        self.entries.contains_key(digest)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
