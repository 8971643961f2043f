//! Manifest list publishing.
//!
//! Runs the full push sequence for one composite reference:
//!
//! 1. Resolve every member (bounded parallel fetch, joined before moving on)
//! 2. Mount blobs of members living in other repositories into the target
//! 3. Push those members' manifests into the target repository by digest
//! 4. Assemble the list / index payload
//! 5. Push the payload to the target reference, then to each extra tag
//!
//! No stage starts before the previous one has finished for every member.
//! Registry-confirmed digests are compared against local ones after every
//! manifest push.

use std::collections::HashSet;
use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use mlist_core::config::{ListKind, PushOptions};
use mlist_core::error::{ListError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::assemble;
use super::fetch::DescriptorFetcher;
use super::manifest::{ContentKind, Descriptor, ImageConfig, ImageManifest, Platform};
use super::platform::resolve_platform;
use super::reference::ImageReference;
use super::resolver::Resolver;
use super::store::MemoryStore;

/// One requested member of a manifest list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Fully qualified image reference
    pub image: String,
    /// Explicit platform; empty fields are inferred from the image
    #[serde(default)]
    pub platform: Platform,
}

/// Everything needed to publish one manifest list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSpec {
    /// Target reference (`host/repo:tag`)
    pub image: String,
    /// Additional tags that receive the same payload
    #[serde(default)]
    pub tags: Vec<String>,
    /// Members, in output order
    #[serde(default)]
    pub manifests: Vec<ManifestEntry>,
}

/// A member after fetching and platform resolution.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    /// Manifest descriptor with the resolved platform attached
    pub descriptor: Descriptor,
    /// Where the manifest was fetched from
    pub source: ImageReference,
    /// Whether the manifest lives outside the target repository and must be
    /// pushed into it before the list can reference it
    pub push_reference: bool,
}

/// Members accumulated for one target, in input order.
#[derive(Debug, Clone)]
pub struct ManifestList {
    pub target: ImageReference,
    pub kind: ListKind,
    members: Vec<ResolvedManifest>,
}

impl ManifestList {
    pub fn new(target: ImageReference, kind: ListKind) -> Self {
        Self {
            target,
            kind,
            members: Vec::new(),
        }
    }

    pub fn add_member(&mut self, member: ResolvedManifest) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[ResolvedManifest] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members that need blob mounts and a reference push.
    pub fn foreign_members(&self) -> impl Iterator<Item = &ResolvedManifest> {
        self.members.iter().filter(|m| m.push_reference)
    }

    /// Serialize the list in its schema kind.
    pub fn assemble(&self) -> Result<(Descriptor, Vec<u8>)> {
        assemble::build(self.kind, &self.members)
    }
}

/// Outcome of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResult {
    pub digest: String,
    pub size: i64,
}

/// Validated, parsed form of a [`ListSpec`].
struct PushPlan<'a> {
    target: ImageReference,
    tags: Vec<ImageReference>,
    members: Vec<(ImageReference, &'a ManifestEntry)>,
}

impl<'a> PushPlan<'a> {
    /// Parse every reference and check registry hosts. Makes no network calls.
    fn new(spec: &'a ListSpec) -> Result<Self> {
        let target = ImageReference::parse_qualified(&spec.image)?;
        if target.digest.is_some() {
            return Err(ListError::InvalidReference {
                reference: spec.image.clone(),
                message: "a manifest list must be pushed to a tag, not a digest".to_string(),
            });
        }

        let mut tags = Vec::with_capacity(spec.tags.len());
        for tag in &spec.tags {
            let tagged = ImageReference::parse(&format!("{}:{}", target.name(), tag))?;
            if tagged.name() != target.name() || tagged.tag.as_deref() != Some(tag.as_str()) {
                return Err(ListError::InvalidReference {
                    reference: tag.clone(),
                    message: "invalid tag".to_string(),
                });
            }
            tags.push(tagged);
        }

        if spec.manifests.is_empty() {
            return Err(ListError::EmptyList(format!(
                "no manifests given for {}",
                target
            )));
        }

        let mut members = Vec::with_capacity(spec.manifests.len());
        for entry in &spec.manifests {
            let reference = ImageReference::parse_qualified(&entry.image)?;
            if reference.registry != target.registry {
                return Err(ListError::CrossRegistry {
                    image: entry.image.clone(),
                    registry: reference.registry.clone(),
                    target_registry: target.registry.clone(),
                });
            }
            members.push((reference, entry));
        }

        Ok(Self {
            target,
            tags,
            members,
        })
    }
}

/// Assemble and publish the manifest list described by `spec`.
///
/// Cancelling `cancel` aborts whichever stage is running. Mounts and manifest
/// pushes the registry already accepted stay in place.
pub async fn push_manifest_list<R: Resolver + ?Sized>(
    resolver: &R,
    spec: &ListSpec,
    options: &PushOptions,
    cancel: &CancellationToken,
) -> Result<PushResult> {
    let plan = PushPlan::new(spec)?;
    let store = MemoryStore::new();

    tracing::info!(
        destination = %plan.target,
        kind = %options.kind,
        members = plan.members.len(),
        "Resolving manifest list members"
    );
    let list = cancellable(
        "resolve",
        cancel,
        resolve_members(resolver, &store, &plan, options),
    )
    .await?;

    cancellable(
        "mount",
        cancel,
        mount_blobs(resolver, &store, &list, options.upload_concurrency()),
    )
    .await?;

    cancellable(
        "push-reference",
        cancel,
        push_references(resolver, &store, &list, options.upload_concurrency()),
    )
    .await?;

    let (descriptor, payload) = list.assemble()?;
    store.set(&descriptor, payload.clone())?;

    cancellable(
        "push-list",
        cancel,
        push_list(resolver, &plan.target, &descriptor, &payload),
    )
    .await?;
    for tagged in &plan.tags {
        cancellable(
            "push-list",
            cancel,
            push_list(resolver, tagged, &descriptor, &payload),
        )
        .await?;
    }

    tracing::info!(
        destination = %plan.target,
        digest = %descriptor.digest,
        size = descriptor.size,
        "Pushed manifest list"
    );
    Ok(PushResult {
        digest: descriptor.digest,
        size: descriptor.size,
    })
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(
    stage: &str,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ListError::Cancelled(stage.to_string())),
        result = fut => result,
    }
}

async fn resolve_members<R: Resolver + ?Sized>(
    resolver: &R,
    store: &MemoryStore,
    plan: &PushPlan<'_>,
    options: &PushOptions,
) -> Result<ManifestList> {
    let fetcher = DescriptorFetcher::new(resolver, store);
    let fetcher = &fetcher;
    let target = &plan.target;

    // `buffered` keeps input order while fetching concurrently.
    let resolved: Vec<Option<ResolvedManifest>> = stream::iter(plan.members.iter())
        .map(|(reference, entry)| {
            resolve_member(fetcher, target, reference, entry, options.ignore_missing)
        })
        .buffered(options.fetch_concurrency())
        .try_collect()
        .await?;

    let mut list = ManifestList::new(target.clone(), options.kind);
    for member in resolved.into_iter().flatten() {
        list.add_member(member);
    }
    if list.is_empty() {
        return Err(ListError::EmptyList(format!(
            "all member images of {} were skipped",
            target
        )));
    }
    Ok(list)
}

async fn resolve_member<R: Resolver + ?Sized>(
    fetcher: &DescriptorFetcher<'_, R>,
    target: &ImageReference,
    reference: &ImageReference,
    entry: &ManifestEntry,
    ignore_missing: bool,
) -> Result<Option<ResolvedManifest>> {
    let image = reference.to_string();
    let mut descriptor = match fetcher.fetch(reference).await {
        Ok(descriptor) => descriptor,
        Err(e) if ignore_missing && e.is_not_found() => {
            tracing::warn!(image = %image, error = %e, "Couldn't access image; skipping it");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match ContentKind::of(&descriptor.media_type) {
        ContentKind::Manifest => {}
        ContentKind::List => return Err(ListError::RecursiveList { image }),
        ContentKind::Unknown => {
            return Err(ListError::UnsupportedMediaType {
                image,
                media_type: descriptor.media_type,
            })
        }
    }

    let manifest: ImageManifest = stored_json(fetcher.store(), &descriptor.digest)?;
    let config: ImageConfig = stored_json(fetcher.store(), &manifest.config.digest)?;
    let platform = resolve_platform(
        &image,
        &entry.platform,
        descriptor.platform.as_ref(),
        &config,
    )?;

    let push_reference = reference.repository_path() != target.repository_path();
    tracing::info!(
        image = %image,
        digest = %descriptor.digest,
        size = descriptor.size,
        platform = %platform,
        push_reference,
        "Resolved member image"
    );

    descriptor.platform = Some(platform);
    Ok(Some(ResolvedManifest {
        descriptor,
        source: reference.clone(),
        push_reference,
    }))
}

async fn mount_blobs<R: Resolver + ?Sized>(
    resolver: &R,
    store: &MemoryStore,
    list: &ManifestList,
    concurrency: usize,
) -> Result<()> {
    let target = &list.target;
    let mut seen = HashSet::new();
    let mut requests = Vec::new();
    for member in list.foreign_members() {
        let manifest: ImageManifest = stored_json(store, &member.descriptor.digest)?;
        for digest in manifest.blob_digests() {
            if seen.insert((member.source.name(), digest.clone())) {
                requests.push((&member.source, digest));
            }
        }
    }
    if requests.is_empty() {
        return Ok(());
    }

    stream::iter(requests)
        .map(|(source, digest)| async move {
            tracing::info!(
                repository = %source.repository_path(),
                destination = %target.repository_path(),
                digest = %digest,
                "Mounting blob"
            );
            resolver.mount_blob(target, source, &digest).await
        })
        .buffer_unordered(concurrency)
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}

async fn push_references<R: Resolver + ?Sized>(
    resolver: &R,
    store: &MemoryStore,
    list: &ManifestList,
    concurrency: usize,
) -> Result<()> {
    let target = &list.target;
    stream::iter(list.foreign_members())
        .map(|member| async move {
            let data = store.get(&member.descriptor).ok_or_else(|| {
                ListError::Other(format!(
                    "Manifest {} of {} missing from store",
                    member.descriptor.digest, member.source
                ))
            })?;
            let destination = target.with_digest(&member.descriptor.digest);
            let descriptor = Descriptor {
                platform: None,
                ..member.descriptor.clone()
            };

            tracing::info!(
                image = %member.source,
                destination = %destination,
                "Pushing referenced manifest"
            );
            let confirmed = resolver
                .push_manifest(&destination, &descriptor, &data)
                .await?;
            if confirmed != member.descriptor.digest {
                return Err(ListError::DigestMismatch {
                    stage: "push-reference".to_string(),
                    subject: member.source.to_string(),
                    expected: member.descriptor.digest.clone(),
                    actual: confirmed,
                });
            }
            Ok::<(), ListError>(())
        })
        .buffer_unordered(concurrency)
        .try_collect::<Vec<()>>()
        .await?;
    Ok(())
}

async fn push_list<R: Resolver + ?Sized>(
    resolver: &R,
    destination: &ImageReference,
    descriptor: &Descriptor,
    payload: &[u8],
) -> Result<()> {
    tracing::info!(
        destination = %destination,
        digest = %descriptor.digest,
        media_type = %descriptor.media_type,
        "Pushing manifest list"
    );
    let confirmed = resolver
        .push_manifest(destination, descriptor, payload)
        .await?;
    if confirmed != descriptor.digest {
        return Err(ListError::DigestMismatch {
            stage: "push-list".to_string(),
            subject: destination.to_string(),
            expected: descriptor.digest.clone(),
            actual: confirmed,
        });
    }
    Ok(())
}

fn stored_json<T: DeserializeOwned>(store: &MemoryStore, digest: &str) -> Result<T> {
    let data = store.get_by_digest(digest).ok_or_else(|| {
        ListError::Other(format!("Content {} missing from store", digest))
    })?;
    Ok(serde_json::from_slice(&data)?)
}
