//! OCI registry client backing the [`Resolver`] capability.
//!
//! Uses the `oci-distribution` crate to talk to container registries
//! (Docker Hub, GHCR, local distribution registries, etc.).

use std::collections::HashMap;

use async_trait::async_trait;
use mlist_core::config::RegistryConfig;
use mlist_core::error::{ListError, Result};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::OciDescriptor;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};

use super::credentials::DockerConfig;
use super::manifest::Descriptor;
use super::reference::ImageReference;
use super::resolver::{RawManifest, Resolver};

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    /// Resolve credentials for `registry`: explicit config, then the Docker
    /// credential file, then env vars, then anonymous.
    pub fn resolve(config: &RegistryConfig, docker: &DockerConfig, registry: &str) -> Result<Self> {
        if let Some((username, password)) = config.explicit_credentials() {
            return Ok(Self::basic(username, password));
        }
        if let Some((username, password)) = docker.get(registry)? {
            return Ok(Self::basic(username, password));
        }
        Ok(Self::from_env())
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    /// Convert to oci-distribution auth type.
    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// [`Resolver`] implementation over `oci-distribution`.
///
/// Built once per invocation. Credentials are resolved per registry host when
/// the resolver is created.
pub struct RegistryResolver {
    client: Client,
    auths: HashMap<String, RegistryAuth>,
}

impl RegistryResolver {
    /// Create a resolver for the given registry hosts.
    pub fn new(config: &RegistryConfig, registries: &[&str]) -> Result<Self> {
        let docker = match &config.docker_config {
            Some(path) => DockerConfig::load(path)?,
            None => DockerConfig::load_default()?,
        };

        let mut auths = HashMap::new();
        for registry in registries {
            let auth = RegistryAuth::resolve(config, &docker, registry)?;
            tracing::debug!(
                registry = %registry,
                anonymous = auth.is_anonymous(),
                "Resolved registry credentials"
            );
            auths.insert(registry.to_string(), auth);
        }

        let client_config = ClientConfig {
            protocol: if config.plain_http {
                ClientProtocol::Http
            } else {
                ClientProtocol::Https
            },
            accept_invalid_certificates: config.insecure,
            ..Default::default()
        };

        Ok(Self {
            client: Client::new(client_config),
            auths,
        })
    }

    fn auth_for(&self, reference: &ImageReference) -> OciRegistryAuth {
        self.auths
            .get(&reference.registry)
            .map(RegistryAuth::to_oci_auth)
            .unwrap_or(OciRegistryAuth::Anonymous)
    }

    /// Authenticate for pushing into `reference`'s repository.
    async fn authorize_push(&self, reference: &ImageReference, oci_ref: &Reference) -> Result<()> {
        self.client
            .auth(oci_ref, &self.auth_for(reference), RegistryOperation::Push)
            .await
            .map_err(|e| registry_error(reference, "Failed to authenticate for push", e))?;
        Ok(())
    }
}

#[async_trait]
impl Resolver for RegistryResolver {
    async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        accepted_media_types: &[&str],
    ) -> Result<RawManifest> {
        let oci_ref = to_oci_reference(reference)?;
        let (data, digest) = self
            .client
            .pull_manifest_raw(&oci_ref, &self.auth_for(reference), accepted_media_types)
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    ListError::NotFound {
                        image: reference.to_string(),
                        message: e.to_string(),
                    }
                } else {
                    registry_error(reference, "Failed to pull manifest", e)
                }
            })?;

        Ok(RawManifest {
            media_type: None,
            digest: Some(digest).filter(|d| !d.is_empty()),
            data,
        })
    }

    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> Result<Vec<u8>> {
        let oci_ref = to_oci_reference(reference)?;
        let layer = OciDescriptor {
            media_type: descriptor.media_type.clone(),
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            ..Default::default()
        };

        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, &layer, &mut data)
            .await
            .map_err(|e| {
                registry_error(
                    reference,
                    &format!("Failed to pull blob {}", descriptor.digest),
                    e,
                )
            })?;
        Ok(data)
    }

    async fn mount_blob(
        &self,
        target: &ImageReference,
        source: &ImageReference,
        digest: &str,
    ) -> Result<()> {
        let target_ref = to_oci_reference(target)?;
        let source_ref = to_oci_reference(source)?;
        self.authorize_push(target, &target_ref).await?;

        self.client
            .mount_blob(&target_ref, &source_ref, digest)
            .await
            .map_err(|e| ListError::MountFailed {
                source_repository: source.repository.clone(),
                digest: digest.to_string(),
                message: e.to_string(),
            })
    }

    async fn push_manifest(
        &self,
        target: &ImageReference,
        descriptor: &Descriptor,
        data: &[u8],
    ) -> Result<String> {
        let oci_ref = to_oci_reference(target)?;
        self.authorize_push(target, &oci_ref).await?;

        let content_type = descriptor.media_type.parse().map_err(|_| {
            ListError::Other(format!(
                "Invalid media type header value '{}'",
                descriptor.media_type
            ))
        })?;
        let location = self
            .client
            .push_manifest_raw(&oci_ref, data.to_vec(), content_type)
            .await
            .map_err(|e| ListError::PushFailed {
                stage: "manifest".to_string(),
                reference: target.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(reference = %target, location = %location, "Manifest accepted");

        // The Location header may be synthesized from the local hash, so the
        // registry's Docker-Content-Digest is the confirmed digest.
        let confirmed = self
            .client
            .fetch_manifest_digest(&oci_ref, &self.auth_for(target))
            .await
            .map_err(|e| registry_error(target, "Failed to read back pushed manifest digest", e))?;
        check_location(target, &location, &confirmed)?;
        Ok(confirmed)
    }
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = reference.full_reference();
    ref_str.parse::<Reference>().map_err(|e| ListError::InvalidReference {
        reference: ref_str.clone(),
        message: e.to_string(),
    })
}

fn registry_error(reference: &ImageReference, context: &str, err: OciDistributionError) -> ListError {
    ListError::RegistryError {
        registry: reference.registry.clone(),
        message: format!("{} for {}: {}", context, reference, err),
    }
}

/// Whether a registry error means the manifest or repository does not exist.
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::ServerError { code, .. } => *code == 404,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
            )
        }),
        _ => false,
    }
}

/// Fail when the push location names a digest other than the one served.
fn check_location(target: &ImageReference, location: &str, confirmed: &str) -> Result<()> {
    match digest_from_location(location) {
        Some(reported) if reported != confirmed => Err(ListError::PushFailed {
            stage: "manifest".to_string(),
            reference: target.to_string(),
            message: format!(
                "registry reported {} at {} but serves {}",
                reported, location, confirmed
            ),
        }),
        _ => Ok(()),
    }
}

/// Extract `sha256:<64 hex>` from a manifest location such as
/// `https://host/v2/org/app/manifests/sha256:abc...`.
fn digest_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next()?.trim_end_matches('/');
    let mut segments = path.rsplit('/');
    let last = segments.next()?;
    if segments.next()? != "manifests" {
        return None;
    }
    let hex = last.strip_prefix("sha256:")?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(auth.is_anonymous());
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "pass");
        assert_eq!(auth.username, Some("user".to_string()));
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Basic(_, _)));
    }

    #[test]
    fn test_resolve_prefers_explicit_credentials() {
        let config = RegistryConfig {
            username: Some("cli-user".to_string()),
            password: Some("cli-pass".to_string()),
            ..Default::default()
        };
        let auth = RegistryAuth::resolve(&config, &DockerConfig::default(), "ghcr.io").unwrap();
        assert_eq!(auth, RegistryAuth::basic("cli-user", "cli-pass"));
    }

    #[test]
    fn test_resolve_uses_docker_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"auths":{"ghcr.io":{"username":"file-user","password":"file-pass"}}}"#,
        )
        .unwrap();
        let docker = DockerConfig::load(dir.path()).unwrap();
        let auth = RegistryAuth::resolve(&RegistryConfig::default(), &docker, "ghcr.io").unwrap();
        assert_eq!(auth, RegistryAuth::basic("file-user", "file-pass"));
    }

    #[test]
    fn test_to_oci_reference_with_tag() {
        let img_ref = ImageReference::parse("ghcr.io/org/app:v0.1.0").unwrap();
        let oci_ref = to_oci_reference(&img_ref).unwrap();
        assert_eq!(oci_ref.registry(), "ghcr.io");
        assert_eq!(oci_ref.repository(), "org/app");
        assert_eq!(oci_ref.tag(), Some("v0.1.0"));
    }

    #[test]
    fn test_to_oci_reference_with_digest() {
        let digest = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        let img_ref = ImageReference::parse("ghcr.io/org/app:v1")
            .unwrap()
            .with_digest(digest);
        let oci_ref = to_oci_reference(&img_ref).unwrap();
        assert_eq!(oci_ref.digest(), Some(digest));
    }

    const HEX: &str = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";

    #[test]
    fn test_digest_from_location() {
        let expected = format!("sha256:{HEX}");
        assert_eq!(
            digest_from_location(&format!("https://ghcr.io/v2/org/app/manifests/sha256:{HEX}")),
            Some(expected.clone())
        );
        assert_eq!(
            digest_from_location(&format!("/v2/org/app/manifests/sha256:{HEX}/")),
            Some(expected.clone())
        );
        assert_eq!(
            digest_from_location(&format!("/v2/org/app/manifests/sha256:{HEX}?ns=ghcr.io")),
            Some(expected)
        );
    }

    #[test]
    fn test_digest_from_location_rejects_non_digests() {
        assert_eq!(digest_from_location("https://ghcr.io/v2/org/app/manifests/v1"), None);
        assert_eq!(digest_from_location("http://localhost:5000"), None);
        assert_eq!(digest_from_location("https://localhost:5000"), None);
        assert_eq!(digest_from_location("/v2/org/app/manifests/sha256:abc123"), None);
        assert_eq!(
            digest_from_location(&format!("/v2/org/app/blobs/sha256:{HEX}")),
            None
        );
        assert_eq!(
            digest_from_location(&format!("/v2/org/app/manifests/sha512:{HEX}")),
            None
        );
    }

    #[test]
    fn test_check_location_against_served_digest() {
        let target = ImageReference::parse("localhost:5000/org/app:v1").unwrap();
        let served = format!("sha256:{HEX}");
        let other = format!("sha256:{}", "0".repeat(64));

        let location = format!("http://localhost:5000/v2/org/app/manifests/{served}");
        assert!(check_location(&target, &location, &served).is_ok());
        assert!(check_location(&target, "http://localhost:5000", &served).is_ok());

        let location = format!("http://localhost:5000/v2/org/app/manifests/{other}");
        let err = check_location(&target, &location, &served).unwrap_err();
        assert!(matches!(err, ListError::PushFailed { .. }));
    }

    #[test]
    fn test_resolver_builds_with_plain_http() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"auths":{}}"#).unwrap();
        let config = RegistryConfig {
            plain_http: true,
            docker_config: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let resolver = RegistryResolver::new(&config, &["localhost:5000"]).unwrap();
        assert!(resolver.auths.contains_key("localhost:5000"));

        // Hosts that were never registered fall back to anonymous.
        let other = ImageReference::parse("quay.io/org/app:v1").unwrap();
        assert!(matches!(resolver.auth_for(&other), OciRegistryAuth::Anonymous));
    }
}
