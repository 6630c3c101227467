use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::context::ResolveContext;
use super::profile::{LoaderProfile, LoaderResolver};
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenArtifact, FORGE_MAVEN};
use crate::core::version::VersionJson;

/// Resolves Forge from the official installer JAR: the installer is fetched
/// once into the shared cache and its embedded `version.json` supplies the
/// main class and library set.
pub struct ForgeResolver;

#[async_trait]
impl LoaderResolver for ForgeResolver {
    async fn resolve(&self, ctx: ResolveContext<'_>) -> LauncherResult<LoaderProfile> {
        info!(
            "Resolving Forge {} for MC {}",
            ctx.loader_version, ctx.minecraft_version
        );

        let forge_id = format!("{}-{}", ctx.minecraft_version, ctx.loader_version);
        let installer_name = format!("forge-{}-installer.jar", forge_id);
        let installer_url = format!(
            "{}/net/minecraftforge/forge/{}/{}",
            FORGE_MAVEN, forge_id, installer_name
        );

        let version_json = fetch_installer_version_json(
            ctx.downloader,
            ctx.cache_dir,
            &installer_name,
            &installer_url,
        )
        .await?;

        profile_from_installer_json(version_json, ctx.libs_dir, FORGE_MAVEN)
    }
}

/// Download an installer jar into the cache (if absent) and parse the
/// `version.json` it embeds. Shared by Forge and NeoForge.
pub(super) async fn fetch_installer_version_json(
    downloader: &Downloader,
    cache_dir: &Path,
    installer_name: &str,
    installer_url: &str,
) -> LauncherResult<VersionJson> {
    let installer_path = cache_dir.join(installer_name);
    if !installer_path.exists() {
        downloader
            .download_file(installer_url, &installer_path, None)
            .await
            .map_err(|e| match e {
                LauncherError::DownloadFailed { status: 404, .. } => LauncherError::Resolution(
                    format!("No installer published at {installer_url}"),
                ),
                other => other,
            })?;
    }

    let path = installer_path.clone();
    tokio::task::spawn_blocking(move || read_version_json_from_jar(&path))
        .await
        .map_err(|e| LauncherError::Other(format!("Installer read task failed: {e}")))?
}

fn read_version_json_from_jar(jar_path: &PathBuf) -> LauncherResult<VersionJson> {
    let file = std::fs::File::open(jar_path).map_err(|source| LauncherError::Io {
        path: jar_path.clone(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file)?;

    let raw = {
        let mut entry = archive
            .by_name("version.json")
            .map_err(|e| LauncherError::Loader(format!("Missing version.json: {}", e)))?;
        let mut buf = String::new();
        entry
            .read_to_string(&mut buf)
            .map_err(|source| LauncherError::Io {
                path: jar_path.clone(),
                source,
            })?;
        buf
    };

    Ok(serde_json::from_str(&raw)?)
}

/// Turn an installer-embedded version JSON into a loader profile. Libraries
/// carrying a concrete artifact URL use it; bare coordinates fall back to
/// the loader's maven repository.
pub(super) fn profile_from_installer_json(
    version_json: VersionJson,
    libs_dir: &Path,
    maven_repo: &str,
) -> LauncherResult<LoaderProfile> {
    let mut profile = LoaderProfile {
        main_class: Some(version_json.main_class.clone()),
        java_major: version_json.java_version.as_ref().map(|j| j.major_version),
        extra_jvm_args: version_json.simple_jvm_args(),
        extra_game_args: version_json.simple_game_args(),
        ..Default::default()
    };

    for lib in &version_json.libraries {
        if !lib.is_allowed_for_current_os() {
            continue;
        }

        match lib.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            Some(artifact) if !artifact.url.is_empty() => {
                profile.libraries.push(lib.name.clone());
                profile.files.push(DownloadEntry {
                    url: artifact.url.clone(),
                    dest: libs_dir.join(&artifact.path),
                    sha1: Some(artifact.sha1.clone()),
                    size: Some(artifact.size),
                });
            }
            _ => {
                // Processor-generated artifacts have no URL; anything else
                // resolves against the loader maven.
                let Ok(artifact) = MavenArtifact::parse(&lib.name) else {
                    continue;
                };
                profile.libraries.push(lib.name.clone());
                profile.files.push(DownloadEntry {
                    url: artifact.url(maven_repo),
                    dest: libs_dir.join(artifact.local_path()),
                    sha1: None,
                    size: None,
                });
            }
        }
    }

    Ok(profile)
}
