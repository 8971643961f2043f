//! Platform resolution and validation for manifest list members.

use mlist_core::error::{ListError, Result};

use super::manifest::{ImageConfig, Platform};

/// Known `os/arch` and `os/arch/variant` combinations.
const VALID_PLATFORMS: &[&str] = &[
    "darwin/386",
    "darwin/amd64",
    "darwin/arm",
    "darwin/arm64",
    "dragonfly/amd64",
    "freebsd/386",
    "freebsd/amd64",
    "freebsd/arm",
    "linux/386",
    "linux/amd64",
    "linux/arm",
    "linux/arm/v5",
    "linux/arm/v6",
    "linux/arm/v7",
    "linux/arm64",
    "linux/arm64/v8",
    "linux/ppc64",
    "linux/ppc64le",
    "linux/mips64",
    "linux/mips64le",
    "linux/s390x",
    "netbsd/386",
    "netbsd/amd64",
    "netbsd/arm",
    "openbsd/386",
    "openbsd/amd64",
    "openbsd/arm",
    "plan9/386",
    "plan9/amd64",
    "solaris/amd64",
    "windows/386",
    "windows/amd64",
    "windows/arm",
];

/// Whether `(os, architecture[, variant])` is on the allow-list.
pub fn is_valid_platform(platform: &Platform) -> bool {
    let key = platform.to_string();
    VALID_PLATFORMS.contains(&key.as_str())
}

/// Produce the platform recorded for one member.
///
/// `os` and `architecture` are taken field by field from the explicit entry,
/// then the descriptor the registry returned, then the image config. The
/// variant follows the same order, but a lower-priority source only
/// contributes it when it does not name a different os or architecture. Windows
/// `os.version` / `os.features` come from the explicit entry or else the
/// config.
///
/// Validation against the allow-list happens once, on the result.
pub fn resolve_platform(
    image: &str,
    explicit: &Platform,
    descriptor: Option<&Platform>,
    config: &ImageConfig,
) -> Result<Platform> {
    let from_config = Platform {
        architecture: config.architecture.clone(),
        os: config.os.clone(),
        variant: config.variant.clone(),
        ..Default::default()
    };
    let sources: Vec<&Platform> = std::iter::once(explicit)
        .chain(descriptor)
        .chain(std::iter::once(&from_config))
        .collect();

    let os = first_set(sources.iter().map(|p| p.os.as_str()));
    let architecture = first_set(sources.iter().map(|p| p.architecture.as_str()));
    let variant = if !explicit.variant.is_empty() {
        explicit.variant.clone()
    } else {
        let agreeing = sources
            .iter()
            .skip(1)
            .filter(|p| agrees(&p.os, &os) && agrees(&p.architecture, &architecture))
            .map(|p| p.variant.as_str());
        first_set(agreeing)
    };

    let os_version = if explicit.os_version.is_empty() {
        config.os_version.clone()
    } else {
        explicit.os_version.clone()
    };
    let os_features = if explicit.os_features.is_empty() {
        &config.os_features
    } else {
        &explicit.os_features
    };

    let resolved = Platform {
        architecture,
        os,
        os_version,
        os_features: dedup_features(os_features),
        variant,
    };

    if !is_valid_platform(&resolved) {
        return Err(ListError::UnsupportedPlatform {
            image: image.to_string(),
            platform: resolved.to_string(),
        });
    }
    Ok(resolved)
}

/// An unset field never conflicts.
fn agrees(field: &str, resolved: &str) -> bool {
    field.is_empty() || field == resolved
}

fn first_set<'a>(mut values: impl Iterator<Item = &'a str>) -> String {
    values.find(|v| !v.is_empty()).unwrap_or_default().to_string()
}

/// Drop repeated features, keeping first occurrences in order.
fn dedup_features(features: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    features
        .iter()
        .filter(|f| !f.is_empty() && seen.insert(f.as_str()))
        .cloned()
        .collect()
}
