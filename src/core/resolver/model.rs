use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release channel preference, ranked by stability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    Release,
    Beta,
    Alpha,
}

impl ReleaseChannel {
    fn stability(&self) -> u8 {
        match self {
            ReleaseChannel::Release => 2,
            ReleaseChannel::Beta => 1,
            ReleaseChannel::Alpha => 0,
        }
    }
}

impl Default for ReleaseChannel {
    fn default() -> Self {
        ReleaseChannel::Release
    }
}

/// One downloadable file belonging to a remote version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionFile {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha512: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A remote resource version, normalized across platforms.
///
/// `id` stays a raw JSON value: some sources publish numeric identifiers,
/// some strings, and equality must tolerate both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub id: serde_json::Value,
    pub name: String,
    pub version_number: String,
    pub game_versions: Vec<String>,
    pub loaders: Vec<String>,
    pub channel: ReleaseChannel,
    pub date_published: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

impl ResourceVersion {
    /// The file a client should actually install.
    pub fn primary_file(&self) -> Option<&VersionFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }
}

/// Coerce a remote version identifier to a canonical string so `"42"` and
/// `42` compare equal across platforms.
pub fn id_str(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const MODLOADER_NAMES: &[&str] = &["forge", "fabric", "neoforge", "quilt"];

/// A version that declares no modloader at all (resource packs, datapacks,
/// loader-agnostic jars).
fn is_loader_agnostic(loaders: &[String]) -> bool {
    !loaders
        .iter()
        .any(|l| MODLOADER_NAMES.contains(&l.as_str()))
}

fn loader_matches(version_loaders: &[String], instance_loader: &str) -> bool {
    if instance_loader == "vanilla" {
        // Vanilla instances accept loader-agnostic versions only.
        return is_loader_agnostic(version_loaders);
    }
    version_loaders.iter().any(|l| l == instance_loader)
        || is_loader_agnostic(version_loaders)
}

/// Select the best version for an instance: filter on game version + loader,
/// then prefer the configured release channel, then stability, then recency.
///
/// Returns `None` when nothing is compatible — callers must surface that,
/// never fall back to an incompatible version.
pub fn pick_best<'a>(
    versions: &'a [ResourceVersion],
    game_version: &str,
    loader: &str,
    preferred: ReleaseChannel,
) -> Option<&'a ResourceVersion> {
    versions
        .iter()
        .filter(|v| v.game_versions.iter().any(|g| g == game_version))
        .filter(|v| loader_matches(&v.loaders, loader))
        .max_by_key(|v| {
            (
                v.channel == preferred,
                v.channel.stability(),
                v.date_published,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(
        id: serde_json::Value,
        game_versions: &[&str],
        loaders: &[&str],
        channel: ReleaseChannel,
        published: &str,
    ) -> ResourceVersion {
        ResourceVersion {
            id,
            name: "v".into(),
            version_number: "1.0.0".into(),
            game_versions: game_versions.iter().map(|s| s.to_string()).collect(),
            loaders: loaders.iter().map(|s| s.to_string()).collect(),
            channel,
            date_published: published.parse().unwrap(),
            files: vec![],
        }
    }

    #[test]
    fn picks_matching_loader_per_instance() {
        let versions = vec![
            version(
                serde_json::json!(1),
                &["1.20.1"],
                &["fabric"],
                ReleaseChannel::Release,
                "2024-01-01T00:00:00Z",
            ),
            version(
                serde_json::json!(2),
                &["1.20.1"],
                &["forge"],
                ReleaseChannel::Release,
                "2024-01-01T00:00:00Z",
            ),
        ];

        let fabric = pick_best(&versions, "1.20.1", "fabric", ReleaseChannel::Release).unwrap();
        assert_eq!(id_str(&fabric.id), "1");

        let forge = pick_best(&versions, "1.20.1", "forge", ReleaseChannel::Release).unwrap();
        assert_eq!(id_str(&forge.id), "2");

        assert!(pick_best(&versions, "1.19.2", "fabric", ReleaseChannel::Release).is_none());
    }

    #[test]
    fn vanilla_accepts_only_loader_agnostic() {
        let versions = vec![
            version(
                serde_json::json!("modded"),
                &["1.20.1"],
                &["fabric"],
                ReleaseChannel::Release,
                "2024-01-01T00:00:00Z",
            ),
            version(
                serde_json::json!("pack"),
                &["1.20.1"],
                &["minecraft"],
                ReleaseChannel::Release,
                "2024-01-02T00:00:00Z",
            ),
        ];

        let best = pick_best(&versions, "1.20.1", "vanilla", ReleaseChannel::Release).unwrap();
        assert_eq!(id_str(&best.id), "pack");
    }

    #[test]
    fn prefers_channel_then_recency() {
        let versions = vec![
            version(
                serde_json::json!("old-release"),
                &["1.20.1"],
                &["fabric"],
                ReleaseChannel::Release,
                "2024-01-01T00:00:00Z",
            ),
            version(
                serde_json::json!("new-release"),
                &["1.20.1"],
                &["fabric"],
                ReleaseChannel::Release,
                "2024-03-01T00:00:00Z",
            ),
            version(
                serde_json::json!("newest-beta"),
                &["1.20.1"],
                &["fabric"],
                ReleaseChannel::Beta,
                "2024-06-01T00:00:00Z",
            ),
        ];

        let stable = pick_best(&versions, "1.20.1", "fabric", ReleaseChannel::Release).unwrap();
        assert_eq!(id_str(&stable.id), "new-release");

        // A beta preference pulls the beta ahead of newer stables.
        let beta = pick_best(&versions, "1.20.1", "fabric", ReleaseChannel::Beta).unwrap();
        assert_eq!(id_str(&beta.id), "newest-beta");
    }

    #[test]
    fn id_coercion_tolerates_numeric_identifiers() {
        assert_eq!(id_str(&serde_json::json!(42)), "42");
        assert_eq!(id_str(&serde_json::json!("42")), "42");
        assert_eq!(
            id_str(&serde_json::json!(42)),
            id_str(&serde_json::json!("42"))
        );
    }
}
