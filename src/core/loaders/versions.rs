// ─── Loader Version Listing ───
// Queries each loader's metadata service for the versions available against
// a given Minecraft version, newest first.

use serde::Deserialize;

use super::fabric::FABRIC_META_BASE;
use super::quilt::QUILT_META_BASE;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::LoaderType;

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: MavenVersioning,
}

#[derive(Debug, Deserialize)]
struct MavenVersioning {
    versions: MavenVersions,
}

#[derive(Debug, Deserialize)]
struct MavenVersions {
    #[serde(rename = "version", default)]
    version: Vec<String>,
}

fn version_sort_key(version: &str) -> Vec<u64> {
    version
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

pub async fn list_loader_versions(
    client: &reqwest::Client,
    loader_type: LoaderType,
    minecraft_version: &str,
) -> LauncherResult<Vec<String>> {
    let mut versions = match loader_type {
        LoaderType::Vanilla => vec![],
        LoaderType::Fabric => list_meta_loader_versions(client, FABRIC_META_BASE, minecraft_version)
            .await
            .map_err(|e| match e {
                LauncherError::Http(inner) => {
                    LauncherError::LoaderApi(format!("Fabric meta unreachable: {inner}"))
                }
                other => other,
            })?,
        LoaderType::Quilt => {
            list_meta_loader_versions(client, QUILT_META_BASE, minecraft_version)
                .await
                .map_err(|e| match e {
                    LauncherError::Http(inner) => {
                        LauncherError::LoaderApi(format!("Quilt meta unreachable: {inner}"))
                    }
                    other => other,
                })?
        }
        LoaderType::Forge => {
            let xml = client
                .get("https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml")
                .send()
                .await?
                .text()
                .await?;

            let metadata: MavenMetadata = quick_xml::de::from_str(&xml).map_err(|e| {
                LauncherError::LoaderApi(format!("Unable to parse Forge metadata: {e}"))
            })?;

            metadata
                .versioning
                .versions
                .version
                .into_iter()
                .filter_map(|v| {
                    v.strip_prefix(&format!("{}-", minecraft_version))
                        .map(str::to_owned)
                })
                .collect()
        }
        LoaderType::NeoForge => {
            let xml = client
                .get("https://maven.neoforged.net/releases/net/neoforged/neoforge/maven-metadata.xml")
                .send()
                .await?
                .text()
                .await?;

            let metadata: MavenMetadata = quick_xml::de::from_str(&xml).map_err(|e| {
                LauncherError::LoaderApi(format!("Unable to parse NeoForge metadata: {e}"))
            })?;

            // NeoForge versions are "<minor>.<patch>.<build>" keyed to
            // "1.<minor>.<patch>" Minecraft versions.
            let version_prefix = minecraft_version
                .trim_start_matches("1.")
                .split('.')
                .take(2)
                .collect::<Vec<_>>()
                .join(".");

            metadata
                .versioning
                .versions
                .version
                .into_iter()
                .filter(|v| v.starts_with(&version_prefix))
                .collect()
        }
    };

    versions.sort_by(|a, b| {
        version_sort_key(b)
            .cmp(&version_sort_key(a))
            .then_with(|| b.cmp(a))
    });
    versions.dedup();

    Ok(versions)
}

/// Fabric and Quilt expose the same `/versions/loader/<mc>` listing shape.
async fn list_meta_loader_versions(
    client: &reqwest::Client,
    meta_base: &str,
    minecraft_version: &str,
) -> LauncherResult<Vec<String>> {
    #[derive(Deserialize)]
    struct LoaderEntry {
        loader: LoaderVersion,
    }
    #[derive(Deserialize)]
    struct LoaderVersion {
        version: String,
    }

    let url = format!("{}/versions/loader/{}", meta_base, minecraft_version);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(LauncherError::LoaderApi(format!(
            "Loader meta returned {}",
            response.status()
        )));
    }

    let entries = response.json::<Vec<LoaderEntry>>().await?;
    Ok(entries.into_iter().map(|e| e.loader.version).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_orders_numerically() {
        let mut versions = vec!["0.9.2".to_string(), "0.15.11".to_string(), "0.15.2".to_string()];
        versions.sort_by(|a, b| version_sort_key(b).cmp(&version_sort_key(a)));
        assert_eq!(versions, vec!["0.15.11", "0.15.2", "0.9.2"]);
    }
}
