// ─── Resource Synchronizer ───
// Reconciles the tracked-resource rows against what is actually on disk in
// mods/, resourcepacks/, shaderpacks/ and datapacks/. Safe to call on every
// resources-tab focus: it only writes (and only signals) when something
// actually changed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{self, EventSink};
use crate::core::instance::Instance;
use crate::core::resolver::ReleaseChannel;

use super::model::{InstalledResource, Platform, ResourceType};
use super::store::ResourceStore;

/// Disabled files keep their full original name plus this suffix, so
/// re-enabling restores the exact original filename.
pub const DISABLED_SUFFIX: &str = ".disabled";

#[derive(Debug)]
struct DiscoveredFile {
    resource_type: ResourceType,
    enabled: bool,
    file_size: u64,
    file_mtime: i64,
}

/// Scan the instance's resource folders and reconcile the tracked rows.
///
/// - files on disk but not tracked are adopted as `Manual` rows
/// - rows whose file vanished are dropped
/// - enabled-state and size/mtime drift is folded back into the rows
///
/// Emits `core://resources-updated` for this instance only, and only when
/// the reconciliation changed anything.
pub async fn sync_instance(
    instance: &Instance,
    events: &Arc<dyn EventSink>,
) -> LauncherResult<Vec<InstalledResource>> {
    let store = ResourceStore::for_instance(instance);
    let mut resources = store.load().await?;

    let discovered = scan_folders(instance).await?;
    let mut changed = false;

    // Drop rows whose file no longer exists; refresh drifted rows.
    resources.retain(|row| {
        if discovered.contains_key(&row.local_path) {
            true
        } else {
            debug!("Untracking vanished resource {}", row.local_path);
            changed = true;
            false
        }
    });

    for row in resources.iter_mut() {
        let Some(found) = discovered.get(&row.local_path) else {
            continue;
        };
        if row.enabled != found.enabled
            || row.file_size != found.file_size
            || row.file_mtime != found.file_mtime
        {
            row.enabled = found.enabled;
            row.file_size = found.file_size;
            row.file_mtime = found.file_mtime;
            changed = true;
        }
    }

    // Adopt files that appeared outside our control.
    let mut next_id = resources.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    for (local_path, found) in &discovered {
        if resources.iter().any(|r| &r.local_path == local_path) {
            continue;
        }
        let display_name = PathBuf::from(local_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| local_path.clone());

        debug!("Adopting manual resource {}", local_path);
        resources.push(InstalledResource {
            id: next_id,
            instance_id: instance.id,
            display_name,
            resource_type: found.resource_type,
            local_path: local_path.clone(),
            enabled: found.enabled,
            version: String::new(),
            platform: Platform::Manual,
            remote_id: None,
            remote_version_id: None,
            release_channel: ReleaseChannel::Release,
            file_size: found.file_size,
            file_mtime: found.file_mtime,
        });
        next_id += 1;
        changed = true;
    }

    if changed {
        resources.sort_by(|a, b| a.local_path.cmp(&b.local_path));
        store.save(&resources).await?;
        events::emit(
            events,
            events::RESOURCES_UPDATED,
            &events::InstanceEvent {
                instance_id: instance.id,
            },
        );
        info!(
            "Synced resources for instance #{}: {} tracked",
            instance.id,
            resources.len()
        );
    }

    Ok(resources)
}

async fn scan_folders(instance: &Instance) -> LauncherResult<HashMap<String, DiscoveredFile>> {
    let mut discovered = HashMap::new();

    for resource_type in ResourceType::ALL {
        let folder = instance.path.join(resource_type.folder());
        if !folder.exists() {
            continue;
        }

        let mut entries = tokio::fs::read_dir(&folder)
            .await
            .map_err(|e| LauncherError::Io {
                path: folder.clone(),
                source: e,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| LauncherError::Io {
            path: folder.clone(),
            source: e,
        })? {
            let metadata = entry.metadata().await.map_err(|e| LauncherError::Io {
                path: entry.path(),
                source: e,
            })?;
            if !metadata.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            let (canonical, enabled) = match file_name.strip_suffix(DISABLED_SUFFIX) {
                Some(stripped) => (stripped.to_string(), false),
                None => (file_name, true),
            };

            let file_mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            discovered.insert(
                format!("{}/{}", resource_type.folder(), canonical),
                DiscoveredFile {
                    resource_type,
                    enabled,
                    file_size: metadata.len(),
                    file_mtime,
                },
            );
        }
    }

    Ok(discovered)
}

fn on_disk_path(instance: &Instance, resource: &InstalledResource) -> PathBuf {
    let active = instance.path.join(&resource.local_path);
    if resource.enabled {
        active
    } else {
        disabled_variant(&active)
    }
}

fn disabled_variant(active: &PathBuf) -> PathBuf {
    let mut name = active
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(DISABLED_SUFFIX);
    active.with_file_name(name)
}

/// Flip a resource between its active and disabled filename. The row is the
/// source of truth for which form currently exists on disk.
pub async fn toggle_resource(
    instance: &Instance,
    resource_id: i64,
    enabled: bool,
    events: &Arc<dyn EventSink>,
) -> LauncherResult<InstalledResource> {
    let store = ResourceStore::for_instance(instance);
    let mut resources = store.load().await?;

    let row = resources
        .iter_mut()
        .find(|r| r.id == resource_id)
        .ok_or_else(|| LauncherError::Other(format!("Resource {resource_id} is not tracked")))?;

    if row.enabled == enabled {
        return Ok(row.clone());
    }

    let active = instance.path.join(&row.local_path);
    let disabled = disabled_variant(&active);
    let (from, to) = if enabled {
        (disabled, active)
    } else {
        (active, disabled)
    };

    tokio::fs::rename(&from, &to)
        .await
        .map_err(|source| LauncherError::Io { path: from, source })?;

    row.enabled = enabled;
    let updated = row.clone();
    store.save(&resources).await?;

    events::emit(
        events,
        events::RESOURCES_UPDATED,
        &events::InstanceEvent {
            instance_id: instance.id,
        },
    );
    Ok(updated)
}

/// Remove a resource's file and its tracked row.
pub async fn delete_resource(
    instance: &Instance,
    resource_id: i64,
    events: &Arc<dyn EventSink>,
) -> LauncherResult<()> {
    let store = ResourceStore::for_instance(instance);
    let mut resources = store.load().await?;

    let index = resources
        .iter()
        .position(|r| r.id == resource_id)
        .ok_or_else(|| LauncherError::Other(format!("Resource {resource_id} is not tracked")))?;

    let row = resources.remove(index);
    let path = on_disk_path(instance, &row);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Resource file {:?} already gone", path);
        }
        Err(source) => return Err(LauncherError::Io { path, source }),
    }

    store.save(&resources).await?;
    info!(
        "Deleted resource '{}' from instance #{}",
        row.display_name, instance.id
    );

    events::emit(
        events,
        events::RESOURCES_UPDATED,
        &events::InstanceEvent {
            instance_id: instance.id,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::testing::CollectingSink;
    use crate::core::instance::{InstanceStore, LoaderType};

    async fn fixture(tmp: &std::path::Path) -> (Instance, Arc<dyn EventSink>, Arc<CollectingSink>) {
        let store = InstanceStore::new(tmp.join("instances"));
        store.init().await.unwrap();
        let instance = store
            .create(Instance::new(
                "Sync Test".into(),
                "1.20.1".into(),
                LoaderType::Fabric,
                None,
            ))
            .await
            .unwrap();
        let sink = Arc::new(CollectingSink::default());
        let events: Arc<dyn EventSink> = sink.clone();
        (instance, events, sink)
    }

    #[tokio::test]
    async fn adopts_untracked_files_as_manual() {
        let tmp = tempfile::tempdir().unwrap();
        let (instance, events, _sink) = fixture(tmp.path()).await;

        tokio::fs::write(instance.mods_dir().join("sodium.jar"), b"jar")
            .await
            .unwrap();
        tokio::fs::write(
            instance.path.join("resourcepacks").join("pack.zip.disabled"),
            b"zip",
        )
        .await
        .unwrap();

        let resources = sync_instance(&instance, &events).await.unwrap();
        assert_eq!(resources.len(), 2);

        let sodium = resources
            .iter()
            .find(|r| r.local_path == "mods/sodium.jar")
            .unwrap();
        assert_eq!(sodium.platform, Platform::Manual);
        assert!(sodium.enabled);

        let pack = resources
            .iter()
            .find(|r| r.local_path == "resourcepacks/pack.zip")
            .unwrap();
        assert!(!pack.enabled);
        assert_eq!(pack.resource_type, ResourceType::ResourcePack);
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let (instance, events, sink) = fixture(tmp.path()).await;

        tokio::fs::write(instance.mods_dir().join("lithium.jar"), b"jar")
            .await
            .unwrap();

        sync_instance(&instance, &events).await.unwrap();
        let first_store = tokio::fs::read_to_string(instance.resources_path())
            .await
            .unwrap();
        let emitted_after_first = sink.topics().len();

        // No filesystem changes: second pass writes nothing, signals nothing.
        sync_instance(&instance, &events).await.unwrap();
        let second_store = tokio::fs::read_to_string(instance.resources_path())
            .await
            .unwrap();
        assert_eq!(first_store, second_store);
        assert_eq!(sink.topics().len(), emitted_after_first);
    }

    #[tokio::test]
    async fn removes_rows_for_vanished_files() {
        let tmp = tempfile::tempdir().unwrap();
        let (instance, events, _sink) = fixture(tmp.path()).await;

        let jar = instance.mods_dir().join("gone.jar");
        tokio::fs::write(&jar, b"jar").await.unwrap();
        sync_instance(&instance, &events).await.unwrap();

        tokio::fs::remove_file(&jar).await.unwrap();
        let resources = sync_instance(&instance, &events).await.unwrap();
        assert!(resources.is_empty());
    }

    #[tokio::test]
    async fn toggle_round_trips_exact_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let (instance, events, _sink) = fixture(tmp.path()).await;

        let original = instance.mods_dir().join("Iris-1.7.0+mc1.20.1.jar");
        tokio::fs::write(&original, b"jar").await.unwrap();
        let resources = sync_instance(&instance, &events).await.unwrap();
        let id = resources[0].id;

        toggle_resource(&instance, id, false, &events).await.unwrap();
        assert!(!original.exists());
        assert!(instance
            .mods_dir()
            .join("Iris-1.7.0+mc1.20.1.jar.disabled")
            .exists());

        toggle_resource(&instance, id, true, &events).await.unwrap();
        assert!(original.exists());
        assert!(!instance
            .mods_dir()
            .join("Iris-1.7.0+mc1.20.1.jar.disabled")
            .exists());
    }

    #[tokio::test]
    async fn delete_removes_file_and_row() {
        let tmp = tempfile::tempdir().unwrap();
        let (instance, events, _sink) = fixture(tmp.path()).await;

        let jar = instance.mods_dir().join("remove-me.jar");
        tokio::fs::write(&jar, b"jar").await.unwrap();
        let resources = sync_instance(&instance, &events).await.unwrap();
        let id = resources[0].id;

        delete_resource(&instance, id, &events).await.unwrap();
        assert!(!jar.exists());

        let remaining = ResourceStore::for_instance(&instance).load().await.unwrap();
        assert!(remaining.is_empty());
    }
}
