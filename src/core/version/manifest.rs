// ─── Version Manifest ───
// Fetches and caches the Mojang piston manifest v2. The on-disk cache keeps
// version listing working offline; `regenerate` forces a refetch.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
const MANIFEST_CACHE_FILE: &str = "version_manifest.json";

/// Top-level Mojang version manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionEntry>,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// List all official stable versions (release only).
    pub fn releases(&self) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| v.version_type == "release")
            .collect()
    }
}

/// Caching wrapper: serves the manifest from memory, falling back to the
/// disk cache, falling back to a live fetch.
pub struct ManifestService {
    client: reqwest::Client,
    cache_path: PathBuf,
    cached: RwLock<Option<VersionManifest>>,
}

impl ManifestService {
    pub fn new(client: reqwest::Client, data_dir: &std::path::Path) -> Self {
        Self {
            client,
            cache_path: data_dir.join(MANIFEST_CACHE_FILE),
            cached: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> LauncherResult<VersionManifest> {
        if let Some(manifest) = self.cached.read().await.as_ref() {
            return Ok(manifest.clone());
        }

        if let Ok(raw) = tokio::fs::read_to_string(&self.cache_path).await {
            if let Ok(manifest) = serde_json::from_str::<VersionManifest>(&raw) {
                *self.cached.write().await = Some(manifest.clone());
                return Ok(manifest);
            }
        }

        self.regenerate().await
    }

    /// Force a refetch from Mojang and rewrite the disk cache.
    pub async fn regenerate(&self) -> LauncherResult<VersionManifest> {
        info!("Fetching Minecraft version manifest...");

        let manifest: VersionManifest = self
            .client
            .get(VERSION_MANIFEST_URL)
            .send()
            .await?
            .json()
            .await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());

        let json = serde_json::to_string(&manifest)?;
        tokio::fs::write(&self.cache_path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.cache_path.clone(),
                source,
            })?;

        *self.cached.write().await = Some(manifest.clone());
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest_entry() {
        let json = r#"{
            "id": "1.20.4",
            "type": "release",
            "releaseTime": "2023-12-07T08:00:00+00:00",
            "url": "https://example.com/1.20.4.json",
            "sha1": "abc123"
        }"#;
        let entry: VersionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "1.20.4");
        assert_eq!(entry.version_type, "release");
    }

    #[tokio::test]
    async fn get_prefers_disk_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cached = VersionManifest {
            versions: vec![VersionEntry {
                id: "1.20.1".into(),
                version_type: "release".into(),
                release_time: "2023-06-07T08:00:00+00:00".into(),
                url: "https://example.com/1.20.1.json".into(),
                sha1: None,
            }],
        };
        std::fs::write(
            tmp.path().join(MANIFEST_CACHE_FILE),
            serde_json::to_string(&cached).unwrap(),
        )
        .unwrap();

        let service = ManifestService::new(reqwest::Client::new(), tmp.path());
        let manifest = service.get().await.unwrap();
        assert!(manifest.find_version("1.20.1").is_some());
        assert!(manifest.find_version("1.8.9").is_none());
    }
}
