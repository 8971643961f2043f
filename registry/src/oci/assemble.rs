//! Manifest list / image index assembly.
//!
//! Serializes resolved members into the Docker v2.2 manifest-list or OCI
//! image-index wire format. Output is pretty-printed JSON with a fixed field
//! order, so identical member sequences always hash to the same digest.

use std::collections::BTreeMap;

use mlist_core::config::ListKind;
use mlist_core::error::{ListError, Result};
use serde::Serialize;

use super::manifest::{Descriptor, Platform, MEDIA_TYPE_DOCKER_MANIFEST_LIST, MEDIA_TYPE_OCI_INDEX};
use super::publish::ResolvedManifest;

const SCHEMA_VERSION: i32 = 2;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerManifestList<'a> {
    schema_version: i32,
    media_type: &'a str,
    manifests: Vec<DockerListEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerListEntry<'a> {
    media_type: &'a str,
    size: i64,
    digest: &'a str,
    platform: &'a Platform,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OciImageIndex<'a> {
    schema_version: i32,
    media_type: &'a str,
    manifests: Vec<OciIndexEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OciIndexEntry<'a> {
    media_type: &'a str,
    digest: &'a str,
    size: i64,
    #[serde(skip_serializing_if = "no_annotations")]
    annotations: &'a BTreeMap<String, String>,
    platform: &'a Platform,
}

fn no_annotations(annotations: &&BTreeMap<String, String>) -> bool {
    annotations.is_empty()
}

/// Media type of the payload produced for `kind`.
pub fn list_media_type(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Docker => MEDIA_TYPE_DOCKER_MANIFEST_LIST,
        ListKind::Oci => MEDIA_TYPE_OCI_INDEX,
    }
}

/// Build the list payload for `members`, in member order.
///
/// Returns the payload's descriptor together with the exact bytes it
/// describes.
pub fn build(kind: ListKind, members: &[ResolvedManifest]) -> Result<(Descriptor, Vec<u8>)> {
    if members.is_empty() {
        return Err(ListError::EmptyList(
            "a manifest list needs at least one member".to_string(),
        ));
    }

    let mut platforms = Vec::with_capacity(members.len());
    for member in members {
        let platform = member.descriptor.platform.as_ref().ok_or_else(|| {
            ListError::Other(format!(
                "Member {} has no resolved platform",
                member.source
            ))
        })?;
        platforms.push(platform);
    }

    let media_type = list_media_type(kind);
    let payload = match kind {
        ListKind::Docker => serde_json::to_vec_pretty(&DockerManifestList {
            schema_version: SCHEMA_VERSION,
            media_type,
            manifests: members
                .iter()
                .zip(&platforms)
                .map(|(m, platform)| DockerListEntry {
                    media_type: &m.descriptor.media_type,
                    size: m.descriptor.size,
                    digest: &m.descriptor.digest,
                    platform: *platform,
                })
                .collect(),
        })?,
        ListKind::Oci => serde_json::to_vec_pretty(&OciImageIndex {
            schema_version: SCHEMA_VERSION,
            media_type,
            manifests: members
                .iter()
                .zip(&platforms)
                .map(|(m, platform)| OciIndexEntry {
                    media_type: &m.descriptor.media_type,
                    digest: &m.descriptor.digest,
                    size: m.descriptor.size,
                    annotations: &m.descriptor.annotations,
                    platform: *platform,
                })
                .collect(),
        })?,
    };

    Ok((Descriptor::for_content(media_type, &payload), payload))
}
