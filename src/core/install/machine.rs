// ─── Install / Repair / Reset State Machine ───
// Drives an instance's installation_status:
//   pending → installing → installed | failed
//   installed|failed|interrupted → installing (repair / update / hard reset)
// `interrupted` is never set here — it is the startup reconciliation's
// verdict on an `installing` record whose backend died.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::assets::AssetManager;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events;
use crate::core::instance::{InstallationStatus, Instance, LoaderType, OperationKind};
use crate::core::loaders::{LoaderProfile, ResolveContext, Resolver};
use crate::core::notify::TaskHandle;
use crate::core::state::AppState;

/// Entry point for every installation-affecting operation.
///
/// The busy gate admits one operation per instance; `installing` and
/// `last_operation` are persisted before any filesystem work so a dead
/// backend is detectable at next startup; terminal states are persisted
/// before the error is surfaced to the caller.
pub async fn run_operation(
    state: &AppState,
    instance_id: i64,
    op: OperationKind,
) -> LauncherResult<Instance> {
    let mut instance = state.instances.load(instance_id).await?;
    let _permit = state.gate.try_acquire(instance.id, &instance.name)?;

    // Selector validation happens before the instance enters `installing`:
    // a selector typo should not dirty the state machine.
    validate_selectors(state, &instance).await?;

    instance.last_operation = Some(op);
    instance.last_error = None;
    state
        .instances
        .set_status(&mut instance, InstallationStatus::Installing)
        .await?;

    let client_key = format!("instance-{}-{}", op, instance.id);
    let task = state
        .broker
        .start_task(&client_key, &task_title(op, &instance.name))
        .await;

    let result = perform(state, &mut instance, op, &task).await;

    match result {
        Ok(()) => {
            instance.updated_at = Utc::now();
            state
                .instances
                .set_status(&mut instance, InstallationStatus::Installed)
                .await?;
            task.complete(&format!("{} finished", task_title(op, &instance.name)))
                .await;

            let event_topic = match op {
                OperationKind::Update => events::INSTANCE_UPDATED,
                _ => events::INSTANCE_INSTALLED,
            };
            events::emit(
                &state.events,
                event_topic,
                &events::InstanceEvent {
                    instance_id: instance.id,
                },
            );
            info!("{} of instance #{} succeeded", op, instance.id);
            Ok(instance)
        }
        Err(e) => {
            // Terminal state goes to disk before the error goes to the UI;
            // partial files stay in place for the next repair.
            instance.last_error = Some(e.to_string());
            if let Err(save_err) = state
                .instances
                .set_status(&mut instance, InstallationStatus::Failed)
                .await
            {
                error!(
                    "Cannot persist failed state for #{}: {}",
                    instance.id, save_err
                );
            }
            task.fail(&e.to_string()).await;
            error!("{} of instance #{} failed: {}", op, instance.id, e);
            Err(e)
        }
    }
}

/// Re-dispatch an interrupted operation based on what was running when the
/// backend died.
pub async fn resume_interrupted(state: &AppState, instance_id: i64) -> LauncherResult<Instance> {
    let instance = state.instances.load(instance_id).await?;
    if instance.installation_status != InstallationStatus::Interrupted {
        return Err(LauncherError::Other(format!(
            "Instance '{}' has no interrupted operation to resume",
            instance.name
        )));
    }

    let op = resume_target(instance.last_operation);
    info!(
        "Resuming interrupted instance #{} via {}",
        instance.id, op
    );
    run_operation(state, instance_id, op).await
}

/// An interrupted install resumes as an install, a repair as a repair, a
/// hard reset restarts from the wipe. An unknown operation defaults to
/// install — the most common half-finished state.
pub fn resume_target(last_operation: Option<OperationKind>) -> OperationKind {
    match last_operation {
        Some(OperationKind::Repair) => OperationKind::Repair,
        Some(OperationKind::HardReset) => OperationKind::HardReset,
        Some(OperationKind::Update) => OperationKind::Update,
        Some(OperationKind::Install) | None => OperationKind::Install,
    }
}

fn task_title(op: OperationKind, name: &str) -> String {
    match op {
        OperationKind::Install => format!("Installing {name}"),
        OperationKind::Repair => format!("Repairing {name}"),
        OperationKind::HardReset => format!("Resetting {name}"),
        OperationKind::Update => format!("Updating {name}"),
    }
}

async fn validate_selectors(state: &AppState, instance: &Instance) -> LauncherResult<()> {
    let manifest = state.manifest.get().await?;
    if manifest.find_version(&instance.minecraft_version).is_none() {
        return Err(LauncherError::Resolution(format!(
            "Minecraft version {} not found in manifest",
            instance.minecraft_version
        )));
    }
    if instance.loader != LoaderType::Vanilla && instance.loader_version.is_none() {
        return Err(LauncherError::Resolution(format!(
            "{} requires a loader version",
            instance.loader
        )));
    }
    Ok(())
}

async fn perform(
    state: &AppState,
    instance: &mut Instance,
    op: OperationKind,
    task: &TaskHandle,
) -> LauncherResult<()> {
    if op == OperationKind::HardReset {
        task.step(1, 5, "Wiping working directory").await;
        wipe_working_tree(instance).await?;
    }

    task.checkpoint()?;
    task.step(2, 5, "Resolving version and loader").await;
    let profile = resolve_profiles(state, instance, task).await?;

    task.checkpoint()?;
    task.step(3, 5, "Verifying files").await;
    let verify_all = op == OperationKind::Repair;
    let wanted = partition_downloads(profile.files.clone(), verify_all).await?;

    task.checkpoint()?;
    task.step(4, 5, "Downloading files").await;
    download_in_chunks(&state.downloader, wanted, task).await?;

    if let Some(index_url) = &profile.asset_index_url {
        task.checkpoint()?;
        task.step(5, 5, "Downloading assets").await;
        let assets_dir = instance.game_dir().join("assets");
        AssetManager::download_assets(
            &state.http_client,
            index_url,
            &assets_dir,
            &state.downloader,
            Some(task.cancel_flag().as_ref()),
        )
        .await?;
    }

    apply_profile(instance, profile);
    Ok(())
}

async fn resolve_profiles(
    state: &AppState,
    instance: &Instance,
    task: &TaskHandle,
) -> LauncherResult<LoaderProfile> {
    let manifest = state.manifest.get().await?;
    let libs_dir = state.libraries_dir();
    let cache_dir = state.cache_dir();
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .map_err(|e| LauncherError::Io {
            path: cache_dir.clone(),
            source: e,
        })?;

    let ctx = ResolveContext {
        minecraft_version: &instance.minecraft_version,
        loader_version: "",
        instance_dir: &instance.path,
        libs_dir: &libs_dir,
        cache_dir: &cache_dir,
        manifest: &manifest,
        downloader: &state.downloader,
        http_client: &state.http_client,
    };

    let mut profile = Resolver::new(&LoaderType::Vanilla).resolve(ctx).await?;

    if instance.loader != LoaderType::Vanilla {
        task.checkpoint()?;
        let loader_version = instance.loader_version.as_deref().ok_or_else(|| {
            LauncherError::Resolution(format!("{} requires a loader version", instance.loader))
        })?;

        let loader_ctx = ResolveContext {
            minecraft_version: &instance.minecraft_version,
            loader_version,
            instance_dir: &instance.path,
            libs_dir: &libs_dir,
            cache_dir: &cache_dir,
            manifest: &manifest,
            downloader: &state.downloader,
            http_client: &state.http_client,
        };
        let loader_profile = Resolver::new(&instance.loader).resolve(loader_ctx).await?;
        profile.merge(loader_profile);
    }

    Ok(profile)
}

/// Decide which planned files actually need fetching.
///
/// Install: anything missing on disk. Repair additionally re-hashes files
/// that exist, so silent corruption is re-fetched while good files are
/// left alone.
async fn partition_downloads(
    planned: Vec<DownloadEntry>,
    verify_existing: bool,
) -> LauncherResult<Vec<DownloadEntry>> {
    let mut wanted = Vec::new();

    for entry in planned {
        if !entry.dest.exists() {
            wanted.push(entry);
            continue;
        }

        if verify_existing {
            if let Some(expected) = &entry.sha1 {
                if !Downloader::validate_sha1(&entry.dest, expected).await? {
                    warn!("Checksum mismatch, re-fetching {:?}", entry.dest);
                    wanted.push(entry);
                }
            }
        }
    }

    Ok(wanted)
}

/// Download in slices so progress moves and cancellation has checkpoints
/// at file boundaries.
async fn download_in_chunks(
    downloader: &Downloader,
    entries: Vec<DownloadEntry>,
    task: &TaskHandle,
) -> LauncherResult<()> {
    const CHUNK: usize = 32;
    let total = entries.len();
    if total == 0 {
        return Ok(());
    }

    let mut done = 0usize;
    for chunk in entries.chunks(CHUNK) {
        task.checkpoint()?;
        downloader
            .download_batch(chunk.to_vec(), Some(task.cancel_flag().as_ref()), None)
            .await?;
        done += chunk.len();
        task.progress(crate::core::notify::ProgressUpdate {
            progress: Some(((done * 100) / total) as u8),
            body: Some(format!("Downloaded {done}/{total} files")),
            ..Default::default()
        })
        .await;
    }

    Ok(())
}

fn apply_profile(instance: &mut Instance, profile: LoaderProfile) {
    instance.main_class = profile.main_class;
    instance.asset_index = profile.asset_index_id;
    instance.required_java_major = profile.java_major;
    instance.jvm_args = profile.extra_jvm_args;
    instance.game_args = profile.extra_game_args;
    instance.libraries = profile.libraries;
    instance.libraries.sort();
    instance.libraries.dedup();
}

/// Hard reset: destroy the working tree (the caller has already walked the
/// user through double confirmation) and rebuild the directory skeleton.
async fn wipe_working_tree(instance: &Instance) -> LauncherResult<()> {
    warn!("Wiping working tree of instance #{}", instance.id);

    for entry in [
        "minecraft",
        "mods",
        "resourcepacks",
        "shaderpacks",
        "datapacks",
        "config",
        "logs",
        "natives",
    ] {
        let path = instance.path.join(entry);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(LauncherError::Io { path, source }),
        }
    }
    for file in ["client.jar", "resources.json"] {
        let path = instance.path.join(file);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(LauncherError::Io { path, source }),
        }
    }

    for subdir in [
        "minecraft",
        "minecraft/assets",
        "mods",
        "resourcepacks",
        "shaderpacks",
        "datapacks",
        "config",
        "logs",
    ] {
        let path = instance.path.join(subdir);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| LauncherError::Io { path, source })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_dispatch_mapping() {
        assert_eq!(
            resume_target(Some(OperationKind::Install)),
            OperationKind::Install
        );
        assert_eq!(
            resume_target(Some(OperationKind::Repair)),
            OperationKind::Repair
        );
        assert_eq!(
            resume_target(Some(OperationKind::HardReset)),
            OperationKind::HardReset
        );
        assert_eq!(
            resume_target(Some(OperationKind::Update)),
            OperationKind::Update
        );
        // Unset defaults to install, the most common half-finished state.
        assert_eq!(resume_target(None), OperationKind::Install);
    }

    #[tokio::test]
    async fn partition_skips_existing_files_on_install() {
        let tmp = tempfile::tempdir().unwrap();
        let present = tmp.path().join("present.jar");
        tokio::fs::write(&present, b"hello").await.unwrap();

        let planned = vec![
            DownloadEntry {
                url: "https://example.invalid/present.jar".into(),
                dest: present.clone(),
                sha1: Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".into()),
                size: None,
            },
            DownloadEntry {
                url: "https://example.invalid/missing.jar".into(),
                dest: tmp.path().join("missing.jar"),
                sha1: None,
                size: None,
            },
        ];

        let wanted = partition_downloads(planned.clone(), false).await.unwrap();
        assert_eq!(wanted.len(), 1);
        assert!(wanted[0].dest.ends_with("missing.jar"));

        // Repair re-hashes: corrupt the file and it gets scheduled again.
        tokio::fs::write(&present, b"corrupted").await.unwrap();
        let wanted = partition_downloads(planned, true).await.unwrap();
        assert_eq!(wanted.len(), 2);
    }
}
