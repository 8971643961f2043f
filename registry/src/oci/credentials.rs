//! Docker-format credential file reader.
//!
//! Reads per-registry credentials from a Docker CLI `config.json`
//! (`~/.docker/config.json` by default). Only inline `auths` entries are
//! understood; credential helpers are not invoked.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use mlist_core::error::{ListError, Result};
use serde::Deserialize;

/// File name inside a Docker config directory.
const CONFIG_FILE_NAME: &str = "config.json";

/// Per-registry entry of the `auths` map.
#[derive(Debug, Clone, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// The parts of Docker's `config.json` that carry credentials.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

/// Read-only view of a Docker credential file.
#[derive(Debug, Default)]
pub struct DockerConfig {
    auths: HashMap<String, AuthEntry>,
}

impl DockerConfig {
    /// Default Docker config directory (`~/.docker`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".docker"))
    }

    /// Load credentials from a directory containing `config.json`, or from a
    /// file path directly.
    ///
    /// A path that does not exist is an error; use [`DockerConfig::load_default`]
    /// for the optional default location.
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path.to_path_buf()
        };
        if !file.exists() {
            return Err(ListError::ConfigError(format!(
                "Docker config {} does not exist",
                file.display()
            )));
        }
        Self::read(&file)
    }

    /// Load `~/.docker/config.json` if present; empty otherwise.
    pub fn load_default() -> Result<Self> {
        match Self::default_dir().map(|d| d.join(CONFIG_FILE_NAME)) {
            Some(file) if file.exists() => Self::read(&file),
            _ => Ok(Self::default()),
        }
    }

    fn read(file: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(file).map_err(|e| {
            ListError::ConfigError(format!(
                "Failed to read Docker config {}: {}",
                file.display(),
                e
            ))
        })?;
        let parsed: ConfigFile = serde_json::from_str(&data).map_err(|e| {
            ListError::ConfigError(format!(
                "Failed to parse Docker config {}: {}",
                file.display(),
                e
            ))
        })?;

        let auths = parsed
            .auths
            .into_iter()
            .map(|(server, entry)| (normalize_registry(&server), entry))
            .collect();
        Ok(Self { auths })
    }

    /// Get credentials for a registry host. Returns `(username, password)`.
    pub fn get(&self, registry: &str) -> Result<Option<(String, String)>> {
        let entry = match self.auths.get(&normalize_registry(registry)) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(encoded) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    ListError::ConfigError(format!(
                        "Invalid auth entry for {}: {}",
                        registry, e
                    ))
                })?;
            let decoded = String::from_utf8(decoded).map_err(|e| {
                ListError::ConfigError(format!("Invalid auth entry for {}: {}", registry, e))
            })?;
            let (username, password) = decoded.split_once(':').ok_or_else(|| {
                ListError::ConfigError(format!(
                    "Invalid auth entry for {}: expected user:password",
                    registry
                ))
            })?;
            return Ok(Some((username.to_string(), password.to_string())));
        }

        match (&entry.username, &entry.password) {
            (Some(u), Some(p)) => Ok(Some((u.clone(), p.clone()))),
            _ => Ok(None),
        }
    }
}

/// Normalize registry names so every Docker Hub alias maps to one key.
fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    let r = r
        .strip_prefix("https://")
        .or_else(|| r.strip_prefix("http://"))
        .unwrap_or(&r);
    let host = r.split('/').next().unwrap_or(r);
    match host {
        "docker.io" | "index.docker.io" | "registry-1.docker.io" => "docker.io".to_string(),
        other => other.to_string(),
    }
}
