//! Read-back of manifest lists and images.
//!
//! Produces a structured report; rendering it for humans is up to the caller.

use mlist_core::config::DEFAULT_FETCH_CONCURRENCY;
use mlist_core::error::{ListError, Result};
use serde::Serialize;

use super::fetch::DescriptorFetcher;
use super::manifest::{ContentKind, Descriptor, ImageConfig, ImageIndex, ImageManifest, Platform};
use super::reference::ImageReference;
use super::resolver::Resolver;
use super::store::MemoryStore;

/// One manifest referenced from a list or index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntryReport {
    /// Descriptor as recorded in the list
    pub descriptor: Descriptor,
    /// Platform as recorded in the list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Layer descriptors, empty when the child is not a single image
    pub layers: Vec<Descriptor>,
}

/// What a reference points at.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InspectReport {
    /// Manifest list or image index
    List {
        name: String,
        descriptor: Descriptor,
        entries: Vec<ListEntryReport>,
    },
    /// Single-platform image
    #[serde(rename_all = "camelCase")]
    Image {
        name: String,
        descriptor: Descriptor,
        os: String,
        architecture: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        variant: String,
        layers: Vec<Descriptor>,
    },
}

impl InspectReport {
    pub fn descriptor(&self) -> &Descriptor {
        match self {
            Self::List { descriptor, .. } | Self::Image { descriptor, .. } => descriptor,
        }
    }
}

/// Fetch `reference` (and, for a list, every child image) and describe it.
pub async fn inspect<R: Resolver + ?Sized>(
    resolver: &R,
    reference: &ImageReference,
) -> Result<InspectReport> {
    inspect_with(resolver, reference, DEFAULT_FETCH_CONCURRENCY).await
}

/// [`inspect`] with at most `max_concurrent` child manifests fetched at once.
pub async fn inspect_with<R: Resolver + ?Sized>(
    resolver: &R,
    reference: &ImageReference,
    max_concurrent: usize,
) -> Result<InspectReport> {
    let store = MemoryStore::new();
    let fetcher = DescriptorFetcher::new(resolver, &store).with_max_concurrent(max_concurrent);
    let descriptor = fetcher.fetch_tree(reference).await?;
    let name = reference.to_string();

    match ContentKind::of(&descriptor.media_type) {
        ContentKind::List => {
            let index: ImageIndex = stored_json(&store, &descriptor.digest)?;
            let entries = index
                .manifests
                .into_iter()
                .map(|child| {
                    let layers = match ContentKind::of(&child.media_type) {
                        ContentKind::Manifest => {
                            stored_json::<ImageManifest>(&store, &child.digest)?.layers
                        }
                        _ => Vec::new(),
                    };
                    Ok(ListEntryReport {
                        platform: child.platform.clone(),
                        descriptor: child,
                        layers,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            tracing::debug!(image = %name, entries = entries.len(), "Inspected manifest list");
            Ok(InspectReport::List {
                name,
                descriptor,
                entries,
            })
        }
        ContentKind::Manifest => {
            let manifest: ImageManifest = stored_json(&store, &descriptor.digest)?;
            let config: ImageConfig = stored_json(&store, &manifest.config.digest)?;
            Ok(InspectReport::Image {
                name,
                descriptor,
                os: config.os,
                architecture: config.architecture,
                variant: config.variant,
                layers: manifest.layers,
            })
        }
        ContentKind::Unknown => Err(ListError::UnsupportedMediaType {
            image: name,
            media_type: descriptor.media_type,
        }),
    }
}

fn stored_json<T: serde::de::DeserializeOwned>(store: &MemoryStore, digest: &str) -> Result<T> {
    let data = store.get_by_digest(digest).ok_or_else(|| {
        ListError::Other(format!("Content {} was not fetched", digest))
    })?;
    Ok(serde_json::from_slice(&data)?)
}
