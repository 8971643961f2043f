use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of member manifests fetched concurrently.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Default number of concurrent blob mounts / reference pushes.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Schema of the composite reference to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Docker v2.2 manifest list (default).
    Docker,
    /// OCI image index.
    Oci,
}

impl Default for ListKind {
    fn default() -> Self {
        Self::Docker
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Oci => write!(f, "oci"),
        }
    }
}

impl std::str::FromStr for ListKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "oci" => Ok(Self::Oci),
            _ => Err(format!(
                "unknown manifest type: '{}' (supported: docker, oci)",
                s
            )),
        }
    }
}

/// Registry connection settings shared by every command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry username (takes precedence over stored credentials)
    pub username: Option<String>,

    /// Registry password
    pub password: Option<String>,

    /// Docker config directory or `config.json` path used for credentials
    pub docker_config: Option<PathBuf>,

    /// Accept invalid TLS certificates
    pub insecure: bool,

    /// Talk to registries over plain HTTP
    pub plain_http: bool,
}

impl RegistryConfig {
    /// Explicit credentials, if both halves were supplied.
    pub fn explicit_credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) if !u.is_empty() || !p.is_empty() => Some((u.clone(), p.clone())),
            _ => None,
        }
    }
}

/// Options controlling a single manifest list push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushOptions {
    /// Docker manifest list or OCI index
    pub kind: ListKind,

    /// Skip members that do not exist instead of failing
    pub ignore_missing: bool,

    /// Concurrent member fetches
    pub max_concurrent_fetches: usize,

    /// Concurrent blob mounts and reference pushes
    pub max_concurrent_uploads: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            kind: ListKind::Docker,
            ignore_missing: false,
            max_concurrent_fetches: DEFAULT_FETCH_CONCURRENCY,
            max_concurrent_uploads: DEFAULT_UPLOAD_CONCURRENCY,
        }
    }
}

impl PushOptions {
    /// Fetch concurrency, never below one.
    pub fn fetch_concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    /// Upload concurrency, never below one.
    pub fn upload_concurrency(&self) -> usize {
        self.max_concurrent_uploads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_kind_from_str() {
        assert_eq!("docker".parse::<ListKind>().unwrap(), ListKind::Docker);
        assert_eq!("OCI".parse::<ListKind>().unwrap(), ListKind::Oci);
        assert!("helm".parse::<ListKind>().is_err());
    }

    #[test]
    fn test_list_kind_display_roundtrips() {
        for kind in [ListKind::Docker, ListKind::Oci] {
            assert_eq!(kind.to_string().parse::<ListKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_push_options_defaults() {
        let opts = PushOptions::default();
        assert_eq!(opts.kind, ListKind::Docker);
        assert!(!opts.ignore_missing);
        assert_eq!(opts.fetch_concurrency(), DEFAULT_FETCH_CONCURRENCY);
    }

    #[test]
    fn test_concurrency_clamped_to_one() {
        let opts = PushOptions {
            max_concurrent_fetches: 0,
            max_concurrent_uploads: 0,
            ..Default::default()
        };
        assert_eq!(opts.fetch_concurrency(), 1);
        assert_eq!(opts.upload_concurrency(), 1);
    }

    #[test]
    fn test_explicit_credentials_require_both() {
        let mut config = RegistryConfig {
            username: Some("user".to_string()),
            ..Default::default()
        };
        assert!(config.explicit_credentials().is_none());

        config.password = Some("secret".to_string());
        assert_eq!(
            config.explicit_credentials(),
            Some(("user".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_push_options_deserialize_kind() {
        let opts: PushOptions = serde_json::from_str(
            r#"{"kind":"oci","ignore_missing":true,"max_concurrent_fetches":2,"max_concurrent_uploads":8}"#,
        )
        .unwrap();
        assert_eq!(opts.kind, ListKind::Oci);
        assert!(opts.ignore_missing);
    }

    #[test]
    fn test_partial_push_options_use_defaults() {
        let opts: PushOptions = serde_json::from_str(r#"{"ignore_missing":true}"#).unwrap();
        assert!(opts.ignore_missing);
        assert_eq!(opts.kind, ListKind::Docker);
        assert_eq!(opts.max_concurrent_fetches, DEFAULT_FETCH_CONCURRENCY);
        assert_eq!(opts.max_concurrent_uploads, DEFAULT_UPLOAD_CONCURRENCY);
    }
}
