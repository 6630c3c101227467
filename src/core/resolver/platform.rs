// ─── Platform Clients ───
// Fetches the version list of a remote project, normalized into
// `ResourceVersion`. Modrinth is queried live; CurseForge resolution is
// unavailable without an API key and reports a per-resource failure.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::model::{ReleaseChannel, ResourceVersion, VersionFile};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::resources::Platform;

const MODRINTH_API: &str = "https://api.modrinth.com/v2";

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: serde_json::Value,
    name: String,
    version_number: String,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    loaders: Vec<String>,
    version_type: String,
    date_published: DateTime<Utc>,
    #[serde(default)]
    files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    hashes: ModrinthHashes,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ModrinthHashes {
    #[serde(default)]
    sha1: Option<String>,
    #[serde(default)]
    sha512: Option<String>,
}

fn channel_from_str(s: &str) -> ReleaseChannel {
    match s {
        "beta" => ReleaseChannel::Beta,
        "alpha" => ReleaseChannel::Alpha,
        _ => ReleaseChannel::Release,
    }
}

/// List all published versions of a remote project.
pub async fn fetch_versions(
    client: &reqwest::Client,
    platform: Platform,
    remote_id: &str,
) -> LauncherResult<Vec<ResourceVersion>> {
    match platform {
        Platform::Modrinth => fetch_modrinth_versions(client, remote_id).await,
        Platform::Curseforge => Err(LauncherError::Resolution(
            "CurseForge version resolution requires an API key".into(),
        )),
        Platform::Manual | Platform::Unknown => Err(LauncherError::Resolution(
            "Resource has no remote source".into(),
        )),
    }
}

async fn fetch_modrinth_versions(
    client: &reqwest::Client,
    project_id: &str,
) -> LauncherResult<Vec<ResourceVersion>> {
    let url = format!("{}/project/{}/version", MODRINTH_API, project_id);
    let response = client.get(&url).send().await?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(LauncherError::Resolution(format!(
            "Project {} no longer exists upstream",
            project_id
        )));
    }
    if !status.is_success() {
        return Err(LauncherError::DownloadFailed {
            url,
            status: status.as_u16(),
        });
    }

    let versions: Vec<ModrinthVersion> = response.json().await?;
    Ok(versions
        .into_iter()
        .map(|v| ResourceVersion {
            id: v.id,
            name: v.name,
            version_number: v.version_number,
            game_versions: v.game_versions,
            loaders: v.loaders,
            channel: channel_from_str(&v.version_type),
            date_published: v.date_published,
            files: v
                .files
                .into_iter()
                .map(|f| VersionFile {
                    url: f.url,
                    filename: f.filename,
                    primary: f.primary,
                    sha1: f.hashes.sha1,
                    sha512: f.hashes.sha512,
                    size: f.size,
                })
                .collect(),
        })
        .collect())
}
