use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::model::{slugify, InstallationStatus, Instance};
use crate::core::error::{LauncherError, LauncherResult};

/// Directory skeleton created for every instance.
const INSTANCE_SUBDIRS: &[&str] = &[
    "minecraft",
    "minecraft/assets",
    "mods",
    "resourcepacks",
    "shaderpacks",
    "datapacks",
    "config",
    "logs",
];

/// Manages the lifecycle of instances on disk.
///
/// `instance.json` inside each `instances/<slug>/` directory is the single
/// source of truth for installation state; the in-memory id→slug index is a
/// lookup cache rebuilt at startup.
pub struct InstanceStore {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
    index: RwLock<HashMap<i64, String>>,
    next_id: AtomicI64,
    /// Serializes `instance.json` writes so an operation task and the
    /// process supervisor cannot interleave partial files.
    save_lock: Mutex<()>,
}

impl InstanceStore {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self {
            instances_dir,
            index: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            save_lock: Mutex::new(()),
        }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    /// Scan the instances directory and rebuild the id index. Called once at
    /// startup, before any command can run.
    pub async fn init(&self) -> LauncherResult<()> {
        let instances = self.scan().await?;
        let mut index = self.index.write().await;
        let mut max_id = 0;
        for instance in &instances {
            index.insert(instance.id, instance.slug.clone());
            max_id = max_id.max(instance.id);
        }
        self.next_id.store(max_id + 1, Ordering::SeqCst);
        info!("Indexed {} instances", index.len());
        Ok(())
    }

    /// Create a new instance on disk with the full subdirectory skeleton.
    ///
    /// The slug is a pure function of the name; a second instance whose name
    /// maps to an existing directory is rejected rather than renamed.
    pub async fn create(&self, mut instance: Instance) -> LauncherResult<Instance> {
        instance.slug = slugify(&instance.name);
        instance.path = self.instances_dir.join(&instance.slug);

        if instance.path.exists() {
            return Err(LauncherError::InstanceAlreadyExists(instance.slug.clone()));
        }

        instance.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        for subdir in INSTANCE_SUBDIRS {
            let path = instance.path.join(subdir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|source| LauncherError::Io { path, source })?;
        }

        self.save(&instance).await?;
        self.index
            .write()
            .await
            .insert(instance.id, instance.slug.clone());

        info!("Created instance '{}' (#{})", instance.name, instance.id);
        Ok(instance)
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let _guard = self.save_lock.lock().await;
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path,
                source: e,
            })
    }

    /// Load a single instance by numeric id.
    pub async fn load(&self, id: i64) -> LauncherResult<Instance> {
        let slug = {
            let index = self.index.read().await;
            index
                .get(&id)
                .cloned()
                .ok_or_else(|| LauncherError::InstanceNotFound(id.to_string()))?
        };
        self.load_from_dir(&self.instances_dir.join(&slug)).await
    }

    async fn load_from_dir(&self, dir: &Path) -> LauncherResult<Instance> {
        let config_path = dir.join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(
                dir.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            ));
        }

        let json =
            tokio::fs::read_to_string(&config_path)
                .await
                .map_err(|e| LauncherError::Io {
                    path: config_path.clone(),
                    source: e,
                })?;

        let mut instance: Instance = serde_json::from_str(&json)?;
        // Paths are machine-local; recompute instead of trusting the file.
        instance.path = dir.to_path_buf();
        Ok(instance)
    }

    /// List all instances, skipping unreadable entries.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = self.scan().await?;
        instances.sort_by_key(|i| i.id);
        Ok(instances)
    }

    async fn scan(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| LauncherError::Io {
                path: self.instances_dir.clone(),
                source: e,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| LauncherError::Io {
            path: self.instances_dir.clone(),
            source: e,
        })? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match self.load_from_dir(&path).await {
                Ok(instance) => instances.push(instance),
                Err(LauncherError::InstanceNotFound(_)) => {}
                Err(e) => warn!("Skipping unreadable instance at {:?}: {}", path, e),
            }
        }

        Ok(instances)
    }

    /// Delete an instance from disk. Tracked resources live inside the tree
    /// and are removed with it.
    pub async fn delete(&self, id: i64) -> LauncherResult<()> {
        let instance = self.load(id).await?;

        tokio::fs::remove_dir_all(&instance.path)
            .await
            .map_err(|e| LauncherError::Io {
                path: instance.path.clone(),
                source: e,
            })?;

        self.index.write().await.remove(&id);
        info!("Deleted instance #{} ({})", id, instance.slug);
        Ok(())
    }

    /// Duplicate an instance's whole tree under a new name.
    pub async fn duplicate(&self, id: i64, new_name: Option<String>) -> LauncherResult<Instance> {
        let source = self.load(id).await?;
        let name = new_name.unwrap_or_else(|| format!("{} (Copy)", source.name));
        let slug = slugify(&name);
        let dest = self.instances_dir.join(&slug);

        if dest.exists() {
            return Err(LauncherError::InstanceAlreadyExists(slug));
        }

        let src_path = source.path.clone();
        let dest_clone = dest.clone();
        tokio::task::spawn_blocking(move || copy_dir_recursive(&src_path, &dest_clone))
            .await
            .map_err(|e| LauncherError::Other(format!("Copy task failed: {e}")))??;

        let mut cloned = source.clone();
        cloned.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        cloned.name = name;
        cloned.slug = slug;
        cloned.path = dest;
        cloned.last_played = None;
        cloned.total_playtime_minutes = 0;
        cloned.created_at = Utc::now();
        cloned.updated_at = cloned.created_at;

        self.save(&cloned).await?;
        self.index
            .write()
            .await
            .insert(cloned.id, cloned.slug.clone());

        info!("Duplicated instance #{} into #{}", source.id, cloned.id);
        Ok(cloned)
    }

    /// Update installation state and persist in one step.
    pub async fn set_status(
        &self,
        instance: &mut Instance,
        status: InstallationStatus,
    ) -> LauncherResult<()> {
        instance.installation_status = status;
        instance.updated_at = Utc::now();
        self.save(instance).await
    }

    /// Startup reconciliation: any instance still persisted as `installing`
    /// belonged to a backend that died mid-operation. Its outcome is
    /// unknown, so it becomes `interrupted` and is surfaced for resumption.
    pub async fn reconcile_interrupted(&self) -> LauncherResult<Vec<Instance>> {
        let mut interrupted = Vec::new();
        for mut instance in self.scan().await? {
            if instance.installation_status == InstallationStatus::Installing {
                warn!(
                    "Instance #{} ({}) was mid-{} when the backend stopped; marking interrupted",
                    instance.id,
                    instance.slug,
                    instance
                        .last_operation
                        .map(|op| op.to_string())
                        .unwrap_or_else(|| "operation".into()),
                );
                self.set_status(&mut instance, InstallationStatus::Interrupted)
                    .await?;
                interrupted.push(instance);
            }
        }
        Ok(interrupted)
    }
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(destination).map_err(|source_err| LauncherError::Io {
        path: destination.to_path_buf(),
        source: source_err,
    })?;

    for entry in std::fs::read_dir(source).map_err(|source_err| LauncherError::Io {
        path: source.to_path_buf(),
        source: source_err,
    })? {
        let entry = entry.map_err(|source_err| LauncherError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|source_err| LauncherError::Io {
                path: dst_path,
                source: source_err,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;

    fn new_store(dir: &Path) -> InstanceStore {
        InstanceStore::new(dir.join("instances"))
    }

    fn sample(name: &str) -> Instance {
        Instance::new(name.into(), "1.20.1".into(), LoaderType::Fabric, None)
    }

    #[tokio::test]
    async fn create_assigns_ids_and_slug_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = new_store(tmp.path());
        store.init().await.unwrap();

        let a = store.create(sample("Alpha Pack")).await.unwrap();
        let b = store.create(sample("Beta Pack")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(a.path.ends_with("alpha-pack"));
        assert!(a.mods_dir().is_dir());
        assert!(a.game_dir().is_dir());
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = new_store(tmp.path());
        store.init().await.unwrap();

        store.create(sample("Same Name")).await.unwrap();
        let err = store.create(sample("Same  name!")).await.unwrap_err();
        assert!(matches!(err, LauncherError::InstanceAlreadyExists(_)));
    }

    #[tokio::test]
    async fn reconcile_marks_installing_as_interrupted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = new_store(tmp.path());
        store.init().await.unwrap();

        let mut instance = store.create(sample("Crashy")).await.unwrap();
        instance.installation_status = InstallationStatus::Installing;
        instance.last_operation = Some(crate::core::instance::OperationKind::Install);
        store.save(&instance).await.unwrap();

        let interrupted = store.reconcile_interrupted().await.unwrap();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(
            interrupted[0].installation_status,
            InstallationStatus::Interrupted
        );

        // The flip is durable, not only in memory.
        let reloaded = store.load(instance.id).await.unwrap();
        assert_eq!(
            reloaded.installation_status,
            InstallationStatus::Interrupted
        );
        assert_eq!(
            reloaded.last_operation,
            Some(crate::core::instance::OperationKind::Install)
        );
    }

    #[tokio::test]
    async fn duplicate_copies_tree_and_resets_bookkeeping() {
        let tmp = tempfile::tempdir().unwrap();
        let store = new_store(tmp.path());
        store.init().await.unwrap();

        let mut original = store.create(sample("Source")).await.unwrap();
        original.total_playtime_minutes = 90;
        store.save(&original).await.unwrap();
        tokio::fs::write(original.mods_dir().join("a.jar"), b"jar")
            .await
            .unwrap();

        let copy = store.duplicate(original.id, None).await.unwrap();
        assert_eq!(copy.name, "Source (Copy)");
        assert_eq!(copy.total_playtime_minutes, 0);
        assert!(copy.mods_dir().join("a.jar").exists());
        assert_ne!(copy.id, original.id);
    }
}
