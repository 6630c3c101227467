// ─── Update Sweep ───
// Bulk "check updates" over an instance's tracked resources. Each resource
// resolves independently; one broken upstream project must never block the
// rest of the sweep.

use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::model::{id_str, pick_best, ReleaseChannel};
use super::platform::fetch_versions;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{self, EventSink};
use crate::core::instance::Instance;
use crate::core::resources::{InstalledResource, ResourceStore, DISABLED_SUFFIX};

#[derive(Debug, Clone, Serialize)]
pub struct ResourceUpdate {
    pub resource_id: i64,
    pub display_name: String,
    pub current_version_id: Option<String>,
    pub new_version_id: String,
    pub new_version_number: String,
    /// Resources inside a pack-managed instance update with the pack, not
    /// individually.
    pub locked: bool,
}

/// Resolve the best available version for every remote-tracked resource and
/// report the ones whose identifier differs from what is installed.
pub async fn check_updates(
    client: &reqwest::Client,
    instance: &Instance,
    resources: &[InstalledResource],
    default_channel: ReleaseChannel,
) -> Vec<ResourceUpdate> {
    let mut updates = Vec::new();
    let pack_locked = instance.modpack.is_some();

    for resource in resources {
        if !resource.platform.is_remote() {
            continue;
        }
        let Some(remote_id) = resource.remote_id.as_deref() else {
            continue;
        };

        let versions = match fetch_versions(client, resource.platform, remote_id).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!(
                    "Skipping update check for '{}' ({}): {}",
                    resource.display_name, remote_id, e
                );
                continue;
            }
        };

        let channel = if resource.release_channel == ReleaseChannel::Release {
            default_channel
        } else {
            resource.release_channel
        };

        let Some(best) = pick_best(
            &versions,
            &instance.minecraft_version,
            instance.loader.as_str(),
            channel,
        ) else {
            debug!(
                "No compatible version of '{}' for {} / {}",
                resource.display_name, instance.minecraft_version, instance.loader
            );
            continue;
        };

        let best_id = id_str(&best.id);
        let is_current = resource
            .remote_version_id
            .as_deref()
            .map(|current| current == best_id)
            .unwrap_or(false);

        if !is_current {
            updates.push(ResourceUpdate {
                resource_id: resource.id,
                display_name: resource.display_name.clone(),
                current_version_id: resource.remote_version_id.clone(),
                new_version_id: best_id,
                new_version_number: best.version_number.clone(),
                locked: pack_locked,
            });
        }
    }

    updates
}

/// Apply the best available version of one resource: download the new file,
/// drop the old one, and fold the new identity back into the tracked row.
pub async fn apply_update(
    client: &reqwest::Client,
    downloader: &Downloader,
    instance: &Instance,
    resource_id: i64,
    default_channel: ReleaseChannel,
    events: &Arc<dyn EventSink>,
) -> LauncherResult<InstalledResource> {
    if instance.modpack.is_some() {
        return Err(LauncherError::Resolution(
            "Instance is managed by a modpack; update the pack instead".into(),
        ));
    }

    let store = ResourceStore::for_instance(instance);
    let mut resources = store.load().await?;
    let row = resources
        .iter_mut()
        .find(|r| r.id == resource_id)
        .ok_or_else(|| LauncherError::Other(format!("Resource {resource_id} is not tracked")))?;

    let remote_id = row.remote_id.clone().ok_or_else(|| {
        LauncherError::Resolution("Resource has no remote source to update from".into())
    })?;

    let versions = fetch_versions(client, row.platform, &remote_id).await?;
    let channel = if row.release_channel == ReleaseChannel::Release {
        default_channel
    } else {
        row.release_channel
    };
    let best = pick_best(
        &versions,
        &instance.minecraft_version,
        instance.loader.as_str(),
        channel,
    )
    .ok_or_else(|| {
        LauncherError::Resolution(format!(
            "No compatible version of '{}' for {} / {}",
            row.display_name, instance.minecraft_version, instance.loader
        ))
    })?;

    let file = best.primary_file().ok_or_else(|| {
        LauncherError::Resolution(format!("Version {} publishes no files", best.version_number))
    })?;

    let folder = instance.path.join(row.resource_type.folder());
    let mut dest = folder.join(&file.filename);
    if !row.enabled {
        let mut disabled_name = file.filename.clone();
        disabled_name.push_str(DISABLED_SUFFIX);
        dest = folder.join(disabled_name);
    }

    downloader
        .download_file(&file.url, &dest, file.sha1.as_deref())
        .await?;
    if let Some(sha512) = &file.sha512 {
        if !Downloader::validate_sha512(&dest, sha512).await? {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(LauncherError::Other(format!(
                "SHA-512 mismatch for downloaded file {:?}",
                dest
            )));
        }
    }

    // Remove the outgoing file if the update changed its name.
    let new_local_path = format!("{}/{}", row.resource_type.folder(), file.filename);
    if row.local_path != new_local_path {
        let old = if row.enabled {
            instance.path.join(&row.local_path)
        } else {
            let mut name = row.local_path.clone();
            name.push_str(DISABLED_SUFFIX);
            instance.path.join(name)
        };
        match tokio::fs::remove_file(&old).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(LauncherError::Io { path: old, source }),
        }
    }

    let metadata = tokio::fs::metadata(&dest)
        .await
        .map_err(|source| LauncherError::Io {
            path: dest.clone(),
            source,
        })?;

    row.local_path = new_local_path;
    row.version = best.version_number.clone();
    row.remote_version_id = Some(id_str(&best.id));
    row.file_size = metadata.len();
    row.file_mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let updated = row.clone();
    store.save(&resources).await?;

    info!(
        "Updated '{}' to {} on instance #{}",
        updated.display_name, updated.version, instance.id
    );
    events::emit(
        events,
        events::RESOURCES_UPDATED,
        &events::InstanceEvent {
            instance_id: instance.id,
        },
    );
    Ok(updated)
}
