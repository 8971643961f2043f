//! Resolver - the registry capability the fetch and publish stages run on.

use async_trait::async_trait;
use mlist_core::error::Result;

use super::manifest::Descriptor;
use super::reference::ImageReference;

/// Manifest bytes as returned by a registry, before verification.
#[derive(Debug, Clone)]
pub struct RawManifest {
    /// Content type reported by the transport, if any
    pub media_type: Option<String>,
    /// Digest the registry claims for the bytes, if any
    pub digest: Option<String>,
    /// Raw payload
    pub data: Vec<u8>,
}

/// Registry operations consumed by the fetcher and publisher.
///
/// Authentication, TLS and HTTP details live behind implementations; one
/// resolver is built per invocation and passed by reference.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// GET a manifest by tag or digest.
    async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        accepted_media_types: &[&str],
    ) -> Result<RawManifest>;

    /// GET a blob from the reference's repository.
    async fn fetch_blob(&self, reference: &ImageReference, descriptor: &Descriptor)
        -> Result<Vec<u8>>;

    /// Mount `digest` from `source`'s repository into `target`'s repository.
    async fn mount_blob(
        &self,
        target: &ImageReference,
        source: &ImageReference,
        digest: &str,
    ) -> Result<()>;

    /// PUT a manifest and return the digest the registry reports for it.
    async fn push_manifest(
        &self,
        target: &ImageReference,
        descriptor: &Descriptor,
        data: &[u8],
    ) -> Result<String>;
}
