//! Descriptor fetcher.
//!
//! Resolves an image reference to its top-level descriptor and materializes
//! the manifest and config JSON into the invocation's [`MemoryStore`]. Layer
//! blobs are never downloaded.

use futures::stream::{self, StreamExt, TryStreamExt};
use mlist_core::error::{ListError, Result};

use super::digest::{sha256_digest, verify_digest};
use super::manifest::{
    sniff_media_type, ContentKind, Descriptor, ImageIndex, ImageManifest, ACCEPTED_MEDIA_TYPES,
};
use super::reference::ImageReference;
use super::resolver::Resolver;
use super::store::MemoryStore;

/// Fetches manifests through a [`Resolver`] into a [`MemoryStore`].
pub struct DescriptorFetcher<'a, R: Resolver + ?Sized> {
    resolver: &'a R,
    store: &'a MemoryStore,
    max_concurrent: usize,
}

impl<'a, R: Resolver + ?Sized> DescriptorFetcher<'a, R> {
    pub fn new(resolver: &'a R, store: &'a MemoryStore) -> Self {
        Self {
            resolver,
            store,
            max_concurrent: mlist_core::config::DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Limit on parallel child fetches when walking a list.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn store(&self) -> &MemoryStore {
        self.store
    }

    /// Resolve `reference` and store its manifest, plus the config blob when
    /// the manifest is a single image.
    ///
    /// Lists and indexes are stored as-is; their children are left alone.
    pub async fn fetch(&self, reference: &ImageReference) -> Result<Descriptor> {
        let raw = self
            .resolver
            .fetch_manifest(reference, ACCEPTED_MEDIA_TYPES)
            .await?;
        let subject = reference.to_string();

        if let Some(pinned) = &reference.digest {
            verify_digest("fetch", &subject, pinned, &raw.data)?;
        }
        if let Some(claimed) = raw.digest.as_deref().filter(|d| !d.is_empty()) {
            verify_digest("fetch", &subject, claimed, &raw.data)?;
        }

        let media_type = raw
            .media_type
            .filter(|m| !m.is_empty())
            .or_else(|| sniff_media_type(&raw.data))
            .ok_or_else(|| ListError::UnsupportedMediaType {
                image: subject.clone(),
                media_type: "unknown".to_string(),
            })?;

        let kind = ContentKind::of(&media_type);
        if kind == ContentKind::Unknown {
            return Err(ListError::UnsupportedMediaType {
                image: subject,
                media_type,
            });
        }

        let descriptor = Descriptor {
            media_type,
            digest: sha256_digest(&raw.data),
            size: raw.data.len() as i64,
            platform: None,
            annotations: Default::default(),
        };

        if kind == ContentKind::Manifest {
            let manifest: ImageManifest = serde_json::from_slice(&raw.data)?;
            self.fetch_config(reference, &manifest.config).await?;
        }
        self.store.set(&descriptor, raw.data)?;

        tracing::debug!(
            image = %subject,
            digest = %descriptor.digest,
            media_type = %descriptor.media_type,
            size = descriptor.size,
            "Fetched manifest"
        );
        Ok(descriptor)
    }

    /// Like [`fetch`](Self::fetch), but for a list or index also fetches every
    /// single-image child by digest, so the whole tree can be read from the
    /// store afterwards.
    pub async fn fetch_tree(&self, reference: &ImageReference) -> Result<Descriptor> {
        let descriptor = self.fetch(reference).await?;
        if ContentKind::of(&descriptor.media_type) != ContentKind::List {
            return Ok(descriptor);
        }

        let index: ImageIndex = match self.store.get(&descriptor) {
            Some(data) => serde_json::from_slice(&data)?,
            None => return Ok(descriptor),
        };

        let children: Vec<ImageReference> = index
            .manifests
            .iter()
            .filter(|child| ContentKind::of(&child.media_type) == ContentKind::Manifest)
            .map(|child| reference.with_digest(&child.digest))
            .collect();

        stream::iter(children)
            .map(|child| async move { self.fetch(&child).await.map(|_| ()) })
            .buffer_unordered(self.max_concurrent)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(descriptor)
    }

    async fn fetch_config(&self, reference: &ImageReference, config: &Descriptor) -> Result<()> {
        if self.store.contains(&config.digest) {
            return Ok(());
        }
        let data = self.resolver.fetch_blob(reference, config).await?;
        verify_digest(
            "fetch",
            &format!("{} config", reference),
            &config.digest,
            &data,
        )?;
        self.store.set(config, data)
    }
}
