// ─── Version File ───
// Parses a Mojang version JSON and evaluates OS rules for libraries. The
// parsed file is turned into a download plan; the install machine decides
// what actually needs fetching.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::DownloadEntry;
use crate::core::error::{LauncherError, LauncherResult};

/// A fully parsed Mojang version JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<serde_json::Value>,
    #[serde(default)]
    pub jvm: Vec<serde_json::Value>,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
}

#[derive(Debug, Deserialize)]
pub struct LibDownloadArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl LibraryEntry {
    /// Evaluate whether this library should be included for the current OS.
    ///
    /// Rules logic (Mojang spec):
    /// - If no rules → allowed.
    /// - Process rules top-to-bottom. Start with "disallowed".
    /// - Each rule either sets "allow" or "disallow" if the OS matches (or if no OS is specified).
    /// - Final state determines inclusion.
    pub fn is_allowed_for_current_os(&self) -> bool {
        let rules = match &self.rules {
            Some(r) => r,
            None => return true,
        };

        let current_os = current_os_name();
        let mut allowed = false;

        for rule in rules {
            let os_matches = match &rule.os {
                None => true,
                Some(os) => match &os.name {
                    None => true,
                    Some(name) => name == current_os,
                },
            };

            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }

        allowed
    }
}

/// Get the Mojang OS name for the current platform.
fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

impl VersionJson {
    /// Fetch and parse a version JSON from the given URL using a shared client.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> LauncherResult<Self> {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let raw = response.text().await?;
        let version_json: VersionJson = serde_json::from_str(&raw)?;
        Ok(version_json)
    }

    /// Download plan for the client jar (`<instance>/client.jar`).
    pub fn client_entry(&self, instance_dir: &Path) -> Option<DownloadEntry> {
        let client = self.downloads.as_ref()?.client.as_ref()?;
        Some(DownloadEntry {
            url: client.url.clone(),
            dest: instance_dir.join("client.jar"),
            sha1: Some(client.sha1.clone()),
            size: Some(client.size),
        })
    }

    /// Download plan for every library allowed on this OS. Returns
    /// `(classpath_coordinate, entry)` pairs.
    pub fn library_entries(&self, libs_dir: &Path) -> Vec<(String, DownloadEntry)> {
        let mut planned = Vec::new();

        for lib in &self.libraries {
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", lib.name);
                continue;
            }

            let Some(artifact) = lib.downloads.as_ref().and_then(|d| d.artifact.as_ref()) else {
                continue;
            };

            planned.push((
                lib.name.clone(),
                DownloadEntry {
                    url: artifact.url.clone(),
                    dest: libs_dir.join(&artifact.path),
                    sha1: Some(artifact.sha1.clone()),
                    size: Some(artifact.size),
                },
            ));
        }

        planned
    }

    /// Get the required Java major version from the version JSON.
    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|j| j.major_version)
            .unwrap_or(17)
    }

    /// Extract simple game arguments (string-only, no conditional rules).
    pub fn simple_game_args(&self) -> Vec<String> {
        match &self.arguments {
            Some(args) => args.game.iter().flat_map(extract_argument_values).collect(),
            None => match &self.minecraft_arguments {
                Some(s) => s.split_whitespace().map(|s| s.to_string()).collect(),
                None => vec![],
            },
        }
    }

    /// Extract simple JVM arguments (string-only, no conditional rules).
    pub fn simple_jvm_args(&self) -> Vec<String> {
        match &self.arguments {
            Some(args) => args.jvm.iter().flat_map(extract_argument_values).collect(),
            None => vec![],
        }
    }
}

fn extract_argument_values(value: &serde_json::Value) -> Vec<String> {
    if let Some(arg) = value.as_str() {
        return vec![arg.to_string()];
    }

    let Some(obj) = value.as_object() else {
        return vec![];
    };

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_array()) {
        if !rules_allow_current_os(rules) {
            return vec![];
        }
    }

    match obj.get("value") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

fn rules_allow_current_os(rules: &[serde_json::Value]) -> bool {
    let mut allowed = false;
    let current_os = current_os_name();

    for rule in rules {
        let action = rule
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("disallow");

        let os_matches = match rule
            .get("os")
            .and_then(|os| os.get("name"))
            .and_then(|name| name.as_str())
        {
            None => true,
            Some(name) => name == current_os,
        };

        if os_matches {
            allowed = action == "allow";
        }
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rules_means_allowed() {
        let lib = LibraryEntry {
            name: "test:lib:1.0".into(),
            downloads: None,
            rules: None,
        };
        assert!(lib.is_allowed_for_current_os());
    }

    #[test]
    fn disallow_current_os() {
        let lib = LibraryEntry {
            name: "test:lib:1.0".into(),
            downloads: None,
            rules: Some(vec![
                LibraryRule {
                    action: RuleAction::Allow,
                    os: None,
                },
                LibraryRule {
                    action: RuleAction::Disallow,
                    os: Some(OsRule {
                        name: Some(current_os_name().to_string()),
                    }),
                },
            ]),
        };
        assert!(!lib.is_allowed_for_current_os());
    }

    #[test]
    fn library_entries_skip_disallowed_and_pathless() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": [
                {
                    "name": "a:b:1.0",
                    "downloads": {
                        "artifact": {
                            "path": "a/b/1.0/b-1.0.jar",
                            "sha1": "da39a3ee5e6b4b0d3255bfef95601890afd80709",
                            "size": 1,
                            "url": "https://libraries.minecraft.net/a/b/1.0/b-1.0.jar"
                        }
                    }
                },
                { "name": "no:downloads:1.0" }
            ]
        }))
        .unwrap();

        let entries = parsed.library_entries(Path::new("/libs"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "a:b:1.0");
        assert!(entries[0].1.dest.ends_with("a/b/1.0/b-1.0.jar"));
    }

    #[test]
    fn argument_object_rules_apply_to_current_os() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "test",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "Player",
                    {
                        "rules": [{"action": "allow", "os": {"name": "linux"}}],
                        "value": ["--demo"]
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": "windows"}}],
                        "value": "--should-not-appear"
                    }
                ]
            }
        }))
        .unwrap();

        let game_args = parsed.simple_game_args();
        assert!(game_args.contains(&"--username".to_string()));
        assert!(game_args.contains(&"Player".to_string()));
        if cfg!(target_os = "linux") {
            assert!(game_args.contains(&"--demo".to_string()));
            assert!(!game_args.contains(&"--should-not-appear".to_string()));
        }
    }
}
