//! Registry content model: descriptors, platforms and the manifest shapes
//! read back from registries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Docker v2.2 image manifest.
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker v2.2 manifest list.
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI image manifest.
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI image index.
pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Every manifest media type this tool reads.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    MEDIA_TYPE_DOCKER_MANIFEST,
    MEDIA_TYPE_DOCKER_MANIFEST_LIST,
    MEDIA_TYPE_OCI_MANIFEST,
    MEDIA_TYPE_OCI_INDEX,
];

/// What a media type refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Single-platform image manifest
    Manifest,
    /// Manifest list or image index
    List,
    /// Anything else
    Unknown,
}

impl ContentKind {
    pub fn of(media_type: &str) -> Self {
        match media_type {
            MEDIA_TYPE_DOCKER_MANIFEST | MEDIA_TYPE_OCI_MANIFEST => Self::Manifest,
            MEDIA_TYPE_DOCKER_MANIFEST_LIST | MEDIA_TYPE_OCI_INDEX => Self::List,
            _ => Self::Unknown,
        }
    }
}

/// Content descriptor: media type, digest and size of a piece of registry content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content
    pub media_type: String,
    /// `algorithm:hex` digest of the referenced bytes
    pub digest: String,
    /// Size in bytes
    pub size: i64,
    /// Platform, for entries of a list or index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Arbitrary metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    /// Describe `data` as content of `media_type`.
    pub fn for_content(media_type: &str, data: &[u8]) -> Self {
        Self {
            media_type: media_type.to_string(),
            digest: super::digest::sha256_digest(data),
            size: data.len() as i64,
            platform: None,
            annotations: BTreeMap::new(),
        }
    }
}

/// Execution environment a manifest targets.
///
/// Empty strings mean "unset"; they are omitted when serialized. Field order
/// matches both the Docker and OCI platform objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(
        rename = "os.version",
        alias = "osversion",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub os_version: String,
    #[serde(
        rename = "os.features",
        alias = "osfeatures",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub os_features: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

impl Platform {
    pub fn new(os: &str, architecture: &str, variant: &str) -> Self {
        Self {
            architecture: architecture.to_string(),
            os: os.to_string(),
            variant: variant.to_string(),
            ..Default::default()
        }
    }

    /// True when neither os nor architecture carries information.
    pub fn is_empty(&self) -> bool {
        self.os.is_empty() && self.architecture.is_empty()
    }

    /// Parse `os/arch` or `os/arch/variant`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Some(Self::new(os, arch, "")),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => {
                Some(Self::new(os, arch, variant))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if !self.variant.is_empty() {
            write!(f, "/{}", self.variant)?;
        }
        Ok(())
    }
}

/// Single-platform image manifest (Docker v2.2 or OCI), as far as list
/// assembly needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Digests of every blob this manifest references, config first.
    pub fn blob_digests(&self) -> Vec<String> {
        std::iter::once(self.config.digest.clone())
            .chain(self.layers.iter().map(|l| l.digest.clone()))
            .collect()
    }
}

/// Manifest list or image index read back from a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

/// Platform fields of an image configuration object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub variant: String,
    #[serde(rename = "os.version", default)]
    pub os_version: String,
    #[serde(rename = "os.features", default)]
    pub os_features: Vec<String>,
}

/// Determine the media type of a manifest payload that arrived without one.
///
/// Prefers the payload's own `mediaType`, then falls back to its shape.
pub fn sniff_media_type(data: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    if let Some(media_type) = value.get("mediaType").and_then(|v| v.as_str()) {
        return Some(media_type.to_string());
    }
    if value.get("manifests").is_some() {
        Some(MEDIA_TYPE_OCI_INDEX.to_string())
    } else if value.get("config").is_some() {
        Some(MEDIA_TYPE_OCI_MANIFEST.to_string())
    } else {
        None
    }
}
