//! OCI image reference parsing.
//!
//! Parses image references like `ghcr.io/org/app:v1` into structured components
//! and normalizes Docker Hub shorthands (`nginx` → `docker.io/library/nginx:latest`).

use mlist_core::error::{ListError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Legacy hostname for Docker Hub, folded into [`DEFAULT_REGISTRY`].
const LEGACY_DEFAULT_REGISTRY: &str = "index.docker.io";

/// Prefix for official Docker Hub images.
const DEFAULT_REPO_PREFIX: &str = "library/";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io", "localhost:5000")
    pub registry: String,
    /// Repository path relative to the registry (e.g., "library/nginx")
    pub repository: String,
    /// Tag (e.g., "latest", "v1")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse and normalize an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `myuser/myimage:v1` → docker.io/myuser/myimage:v1
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `localhost:5000/image@sha256:abc...` → localhost:5000/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let original = reference;
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(invalid(original, "empty image reference"));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.rfind('@') {
            Some(at_pos) => {
                let digest_part = &reference[at_pos + 1..];
                validate_digest(original, digest_part)?;
                (&reference[..at_pos], Some(digest_part.to_string()))
            }
            None => (reference, None),
        };

        // Split tag on the last colon after the last slash, so registry ports survive
        let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(colon_pos) => {
                let split = last_segment_start + colon_pos;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if let Some(ref tag) = tag {
            validate_tag(original, tag)?;
        }

        let (registry, repository) = split_registry_repository(original, name)?;

        // Apply default tag if no tag and no digest
        let tag = if tag.is_none() && digest.is_none() {
            Some(DEFAULT_TAG.to_string())
        } else {
            tag
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Parse a reference that must name its registry host explicitly.
    ///
    /// Push targets and list members go through this: `nginx` or
    /// `myuser/app` are rejected instead of silently landing on Docker Hub.
    pub fn parse_qualified(reference: &str) -> Result<Self> {
        let name = reference.trim();
        let first = name.split('/').next().unwrap_or("");
        let has_host = name.contains('/')
            && (first.contains('.') || first.contains(':') || first == "localhost");
        if !has_host {
            return Err(invalid(
                reference,
                "Please use a fully qualified repository name",
            ));
        }
        Self::parse(name)
    }

    /// Repository path within the registry, without tag or digest.
    ///
    /// Two references with equal registry but different paths need a
    /// cross-repository mount to share content.
    pub fn repository_path(&self) -> &str {
        &self.repository
    }

    /// `registry/repository` without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Same repository, addressed by digest.
    pub fn with_digest(&self, digest: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        }
    }

    /// Same repository, addressed by tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
            digest: None,
        }
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.name();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ListError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(reference: &str, message: impl Into<String>) -> ListError {
    ListError::InvalidReference {
        reference: reference.to_string(),
        message: message.into(),
    }
}

/// Split a name into registry and repository components.
fn split_registry_repository(reference: &str, name: &str) -> Result<(String, String)> {
    // The first component is a registry if it contains a dot or colon, or is "localhost"
    let (registry, repository) = match name.find('/') {
        Some(slash_pos) => {
            let first = &name[..slash_pos];
            if first.contains('.') || first.contains(':') || first == "localhost" {
                (first.to_string(), name[slash_pos + 1..].to_string())
            } else {
                (DEFAULT_REGISTRY.to_string(), name.to_string())
            }
        }
        None => (DEFAULT_REGISTRY.to_string(), name.to_string()),
    };

    let registry = if registry == LEGACY_DEFAULT_REGISTRY {
        DEFAULT_REGISTRY.to_string()
    } else {
        registry
    };

    if repository.is_empty() {
        return Err(invalid(reference, "empty repository"));
    }
    for component in repository.split('/') {
        validate_path_component(reference, component)?;
    }

    // Single name like "nginx" → "library/nginx" for Docker Hub
    let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
        format!("{}{}", DEFAULT_REPO_PREFIX, repository)
    } else {
        repository
    };

    Ok((registry, repository))
}

fn validate_path_component(reference: &str, component: &str) -> Result<()> {
    let valid_chars = component
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    let bounded = component
        .chars()
        .next()
        .zip(component.chars().last())
        .map_or(false, |(first, last)| {
            first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()
        });
    if !valid_chars || !bounded {
        return Err(invalid(
            reference,
            format!("invalid repository path component '{}'", component),
        ));
    }
    Ok(())
}

fn validate_tag(reference: &str, tag: &str) -> Result<()> {
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !first_ok || !rest_ok || tag.len() > 128 {
        return Err(invalid(reference, format!("invalid tag '{}'", tag)));
    }
    Ok(())
}

fn validate_digest(reference: &str, digest: &str) -> Result<()> {
    let (algorithm, hex) = digest.split_once(':').ok_or_else(|| {
        invalid(reference, "invalid digest format: expected algorithm:hex")
    })?;
    if algorithm.is_empty() || hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            reference,
            format!("invalid digest '{}': expected algorithm:hex", digest),
        ));
    }
    Ok(())
}
