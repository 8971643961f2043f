//! List definitions: YAML spec files and `push from-args` templates.

use std::path::Path;

use mlist_core::{ListError, Result};
use mlist_registry::oci::{ListSpec, ManifestEntry, Platform};

/// Read a YAML list definition.
///
/// ```yaml
/// image: registry.example.com/org/app:v1
/// tags: ["v1.0", "latest"]
/// manifests:
///   - image: registry.example.com/org/app:linux-amd64
///     platform:
///       architecture: amd64
///       os: linux
/// ```
pub fn load_spec(path: &Path) -> Result<ListSpec> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        ListError::ConfigError(format!("Can't read YAML file {}: {}", path.display(), e))
    })?;
    let spec: ListSpec = serde_yaml::from_str(&data).map_err(|e| {
        ListError::ConfigError(format!("Can't unmarshal YAML file {}: {}", path.display(), e))
    })?;
    if spec.image.trim().is_empty() {
        return Err(ListError::ConfigError(format!(
            "{} does not name a target image",
            path.display()
        )));
    }
    Ok(spec)
}

/// Build a list definition from `os/arch[/variant]` platforms and an image
/// name template.
///
/// The first `ARCH`, `OS` and `VARIANT` in the template are replaced, in that
/// order, and the platform is recorded explicitly on each entry.
pub fn spec_from_args(
    platforms: &str,
    template: &str,
    target: &str,
    tags: &[String],
) -> Result<ListSpec> {
    if platforms.trim().is_empty() || template.trim().is_empty() || target.trim().is_empty() {
        return Err(ListError::ConfigError(
            "You must specify all three arguments --platforms, --template and --target"
                .to_string(),
        ));
    }

    let manifests = platforms
        .split(',')
        .map(|p| {
            let platform = Platform::parse(p).ok_or_else(|| {
                ListError::ConfigError(format!(
                    "Invalid platform '{}': expected os/arch or os/arch/variant",
                    p.trim()
                ))
            })?;
            let image = template
                .replacen("ARCH", &platform.architecture, 1)
                .replacen("OS", &platform.os, 1)
                .replacen("VARIANT", &platform.variant, 1);
            Ok(ManifestEntry { image, platform })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ListSpec {
        image: target.to_string(),
        tags: tags.iter().filter(|t| !t.is_empty()).cloned().collect(),
        manifests,
    })
}
