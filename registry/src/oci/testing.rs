//! In-memory registry used by unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use mlist_core::error::{ListError, Result};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::digest::sha256_digest;
use super::manifest::{
    Descriptor, MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_OCI_INDEX,
};
use super::reference::ImageReference;
use super::resolver::{RawManifest, Resolver};

const MEDIA_TYPE_DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
const MEDIA_TYPE_DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// One recorded resolver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchManifest(String),
    FetchBlob { repository: String, digest: String },
    Mount { target: String, source: String, digest: String },
    PushManifest { reference: String, digest: String },
}

#[derive(Debug, Clone)]
struct StoredManifest {
    media_type: String,
    claimed_digest: String,
    data: Vec<u8>,
}

/// Registry double keyed by `name:tag` / `name@digest`.
#[derive(Default)]
pub struct MockRegistry {
    manifests: Mutex<HashMap<String, StoredManifest>>,
    /// (registry/repository, digest) → bytes
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    omit_media_types: bool,
    /// Digest to report for every manifest push instead of the real one
    push_digest_override: Mutex<Option<String>>,
    /// Cancelled as soon as the first mount is accepted
    cancel_on_mount: Mutex<Option<CancellationToken>>,
}

fn manifest_key(reference: &ImageReference) -> String {
    match &reference.digest {
        Some(digest) => format!("{}@{}", reference.name(), digest),
        None => format!(
            "{}:{}",
            reference.name(),
            reference.tag.as_deref().unwrap_or("latest")
        ),
    }
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report no content type on fetches, forcing payload sniffing.
    pub fn without_media_types(mut self) -> Self {
        self.omit_media_types = true;
        self
    }

    /// Make every manifest push report `digest`.
    pub fn report_push_digest(&self, digest: &str) {
        *self.push_digest_override.lock() = Some(digest.to_string());
    }

    /// Cancel `token` once a mount has been accepted.
    pub fn cancel_after_mount(&self, token: CancellationToken) {
        *self.cancel_on_mount.lock() = Some(token);
    }

    /// Forget a blob, so mounting it from `repository` fails.
    pub fn remove_blob(&self, repository: &str, digest: &str) {
        self.blobs
            .lock()
            .remove(&(repository.to_string(), digest.to_string()));
    }

    /// Store manifest bytes under `reference` and under its digest.
    pub fn add_raw_manifest(&self, reference: &str, media_type: &str, data: Vec<u8>) -> Descriptor {
        let reference = ImageReference::parse(reference).unwrap();
        let descriptor = Descriptor::for_content(media_type, &data);
        let stored = StoredManifest {
            media_type: media_type.to_string(),
            claimed_digest: descriptor.digest.clone(),
            data,
        };
        let mut manifests = self.manifests.lock();
        manifests.insert(manifest_key(&reference), stored.clone());
        manifests.insert(
            manifest_key(&reference.with_digest(&descriptor.digest)),
            stored,
        );
        descriptor
    }

    /// Add a single-platform Docker image with one config and one layer.
    pub fn add_image(&self, reference: &str, os: &str, architecture: &str) -> Descriptor {
        self.add_image_with_variant(reference, os, architecture, "")
    }

    pub fn add_image_with_variant(
        &self,
        reference: &str,
        os: &str,
        architecture: &str,
        variant: &str,
    ) -> Descriptor {
        self.add_image_with_layers(reference, os, architecture, variant, 1)
    }

    /// Add a Docker image with `layer_count` layers (zero leaves only the config blob).
    pub fn add_image_with_layers(
        &self,
        reference: &str,
        os: &str,
        architecture: &str,
        variant: &str,
        layer_count: usize,
    ) -> Descriptor {
        let parsed = ImageReference::parse(reference).unwrap();
        let config = serde_json::to_vec(&serde_json::json!({
            "os": os,
            "architecture": architecture,
            "variant": variant,
            "rootfs": {"type": "layers", "diff_ids": []},
        }))
        .unwrap();
        let config_desc = Descriptor::for_content(MEDIA_TYPE_DOCKER_CONFIG, &config);

        let mut layer_descs = Vec::with_capacity(layer_count);
        {
            let mut blobs = self.blobs.lock();
            blobs.insert((parsed.name(), config_desc.digest.clone()), config);
            for i in 0..layer_count {
                let layer = format!("layer {} for {}", i, reference).into_bytes();
                let layer_desc = Descriptor::for_content(MEDIA_TYPE_DOCKER_LAYER, &layer);
                blobs.insert((parsed.name(), layer_desc.digest.clone()), layer);
                layer_descs.push(layer_desc);
            }
        }

        let manifest = serde_json::to_vec_pretty(&serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_DOCKER_MANIFEST,
            "config": config_desc,
            "layers": layer_descs,
        }))
        .unwrap();
        self.add_raw_manifest(reference, MEDIA_TYPE_DOCKER_MANIFEST, manifest)
    }

    /// Add an OCI index over already-added images.
    pub fn add_index(&self, reference: &str, children: &[Descriptor]) -> Descriptor {
        let index = serde_json::to_vec_pretty(&serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_OCI_INDEX,
            "manifests": children,
        }))
        .unwrap();
        self.add_raw_manifest(reference, MEDIA_TYPE_OCI_INDEX, index)
    }

    /// Flip one byte of the manifest stored under `reference`, keeping the
    /// claimed digest.
    pub fn corrupt_manifest(&self, reference: &str) {
        let key = manifest_key(&ImageReference::parse(reference).unwrap());
        let mut manifests = self.manifests.lock();
        let stored = manifests.get_mut(&key).unwrap();
        stored.data[0] ^= 0x01;
    }

    /// Manifest bytes currently stored under `reference`.
    pub fn manifest(&self, reference: &str) -> Option<Vec<u8>> {
        let key = manifest_key(&ImageReference::parse(reference).unwrap());
        self.manifests.lock().get(&key).map(|m| m.data.clone())
    }

    pub fn has_blob(&self, repository: &str, digest: &str) -> bool {
        self.blobs
            .lock()
            .contains_key(&(repository.to_string(), digest.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Mount { .. }))
            .count()
    }

    pub fn push_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::PushManifest { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Resolver for MockRegistry {
    async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        _accepted_media_types: &[&str],
    ) -> Result<RawManifest> {
        self.record(Call::FetchManifest(reference.to_string()));
        let stored = self
            .manifests
            .lock()
            .get(&manifest_key(reference))
            .cloned()
            .ok_or_else(|| ListError::NotFound {
                image: reference.to_string(),
                message: "manifest unknown".to_string(),
            })?;
        Ok(RawManifest {
            media_type: (!self.omit_media_types).then_some(stored.media_type),
            digest: Some(stored.claimed_digest),
            data: stored.data,
        })
    }

    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> Result<Vec<u8>> {
        self.record(Call::FetchBlob {
            repository: reference.name(),
            digest: descriptor.digest.clone(),
        });
        self.blobs
            .lock()
            .get(&(reference.name(), descriptor.digest.clone()))
            .cloned()
            .ok_or_else(|| ListError::NotFound {
                image: reference.to_string(),
                message: format!("blob {} unknown", descriptor.digest),
            })
    }

    async fn mount_blob(
        &self,
        target: &ImageReference,
        source: &ImageReference,
        digest: &str,
    ) -> Result<()> {
        self.record(Call::Mount {
            target: target.name(),
            source: source.name(),
            digest: digest.to_string(),
        });
        let mut blobs = self.blobs.lock();
        let data = blobs
            .get(&(source.name(), digest.to_string()))
            .cloned()
            .ok_or_else(|| ListError::MountFailed {
                source_repository: source.repository.clone(),
                digest: digest.to_string(),
                message: "blob unknown to source repository".to_string(),
            })?;
        blobs.insert((target.name(), digest.to_string()), data);
        if let Some(token) = self.cancel_on_mount.lock().take() {
            token.cancel();
        }
        Ok(())
    }

    async fn push_manifest(
        &self,
        target: &ImageReference,
        descriptor: &Descriptor,
        data: &[u8],
    ) -> Result<String> {
        let digest = sha256_digest(data);
        self.record(Call::PushManifest {
            reference: target.to_string(),
            digest: digest.clone(),
        });
        let stored = StoredManifest {
            media_type: descriptor.media_type.clone(),
            claimed_digest: digest.clone(),
            data: data.to_vec(),
        };
        {
            let mut manifests = self.manifests.lock();
            manifests.insert(manifest_key(target), stored.clone());
            manifests.insert(manifest_key(&target.with_digest(&digest)), stored);
        }
        Ok(self.push_digest_override.lock().clone().unwrap_or(digest))
    }
}
