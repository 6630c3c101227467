use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::LauncherError;
use crate::core::events;
use crate::core::install;
use crate::core::instance::{
    InstallationStatus, Instance, LaunchOptions, LoaderType, ModpackLink, OperationKind,
};
use crate::core::loaders;
use crate::core::notify::{
    Notification, NotificationAction, NotificationKind, ProgressUpdate, Severity,
};
use crate::core::process::RollingLog;
use crate::core::resolver::{apply_update, check_updates, ResourceUpdate};
use crate::core::resources::{self, InstalledResource, ResourceStore};
use crate::core::state::{AppState, Settings};

// ── Payloads ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateInstancePayload {
    pub name: String,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub memory_max_mb: Option<u32>,
    pub modpack: Option<ModpackLink>,
}

/// Full replacement of an instance's selectors and override record. `None`
/// override fields fall back to the global defaults at launch time.
#[derive(Debug, Deserialize)]
pub struct UpdateInstancePayload {
    pub id: i64,
    pub minecraft_version: Option<String>,
    pub loader: Option<LoaderType>,
    pub loader_version: Option<String>,
    pub memory_min_mb: Option<u32>,
    pub memory_max_mb: Option<u32>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub java_path: Option<String>,
    pub java_args: Option<Vec<String>>,
    pub env_vars: Option<HashMap<String, String>>,
    pub pre_launch_hook: Option<String>,
    pub post_exit_hook: Option<String>,
    pub wrapper_command: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceInfo {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub path: String,
    pub minecraft_version: String,
    pub loader: LoaderType,
    pub loader_version: Option<String>,
    pub installation_status: InstallationStatus,
    pub last_operation: Option<OperationKind>,
    pub last_error: Option<String>,
    pub crashed: bool,
    pub crash_details: Option<String>,
    pub running: bool,
    pub memory_min_mb: Option<u32>,
    pub memory_max_mb: Option<u32>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub java_path: Option<String>,
    pub java_args: Option<Vec<String>>,
    pub pre_launch_hook: Option<String>,
    pub post_exit_hook: Option<String>,
    pub wrapper_command: Option<String>,
    pub modpack: Option<ModpackLink>,
    pub total_playtime_minutes: i64,
    pub last_played: Option<String>,
    pub created_at: String,
}

impl InstanceInfo {
    fn new(instance: &Instance, running: bool) -> Self {
        Self {
            id: instance.id,
            name: instance.name.clone(),
            slug: instance.slug.clone(),
            path: instance.path.to_string_lossy().to_string(),
            minecraft_version: instance.minecraft_version.clone(),
            loader: instance.loader,
            loader_version: instance.loader_version.clone(),
            installation_status: instance.installation_status,
            last_operation: instance.last_operation,
            last_error: instance.last_error.clone(),
            crashed: instance.crashed,
            crash_details: instance.crash_details.clone(),
            running,
            memory_min_mb: instance.memory_min_mb,
            memory_max_mb: instance.memory_max_mb,
            window_width: instance.window_width,
            window_height: instance.window_height,
            java_path: instance
                .java_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            java_args: instance.java_args.clone(),
            pre_launch_hook: instance.pre_launch_hook.clone(),
            post_exit_hook: instance.post_exit_hook.clone(),
            wrapper_command: instance.wrapper_command.clone(),
            modpack: instance.modpack.clone(),
            total_playtime_minutes: instance.total_playtime_minutes,
            last_played: instance.last_played.map(|d| d.to_rfc3339()),
            created_at: instance.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationPayload {
    pub client_key: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub severity: Severity,
    pub kind: NotificationKind,
    #[serde(default = "default_true")]
    pub dismissible: bool,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

fn default_true() -> bool {
    true
}

// ── Instance CRUD ───────────────────────────────────────

#[tauri::command]
pub async fn create_instance(
    state: tauri::State<'_, Arc<AppState>>,
    payload: CreateInstancePayload,
) -> Result<InstanceInfo, LauncherError> {
    let mut instance = Instance::new(
        payload.name,
        payload.minecraft_version,
        payload.loader,
        payload.loader_version,
    );
    instance.memory_max_mb = payload.memory_max_mb;
    instance.modpack = payload.modpack;

    let instance = state.instances.create(instance).await?;
    events::emit(
        &state.events,
        events::INSTANCE_UPDATED,
        &events::InstanceEvent {
            instance_id: instance.id,
        },
    );
    Ok(InstanceInfo::new(&instance, false))
}

#[tauri::command]
pub async fn update_instance(
    state: tauri::State<'_, Arc<AppState>>,
    payload: UpdateInstancePayload,
) -> Result<InstanceInfo, LauncherError> {
    let mut instance = state.instances.load(payload.id).await?;

    if state.gate.is_busy(instance.id) {
        return Err(LauncherError::Busy(instance.name.clone()));
    }

    let mut selectors_changed = false;
    if let Some(version) = payload.minecraft_version {
        selectors_changed |= version != instance.minecraft_version;
        instance.minecraft_version = version;
    }
    if let Some(loader) = payload.loader {
        selectors_changed |= loader != instance.loader;
        instance.loader = loader;
    }
    if payload.loader_version != instance.loader_version {
        selectors_changed |= payload.loader_version.is_some() || instance.loader_version.is_some();
        instance.loader_version = payload.loader_version;
    }

    instance.memory_min_mb = payload.memory_min_mb;
    instance.memory_max_mb = payload.memory_max_mb;
    instance.window_width = payload.window_width;
    instance.window_height = payload.window_height;
    instance.java_path = payload.java_path.map(PathBuf::from);
    instance.java_args = payload.java_args;
    instance.env_vars = payload.env_vars;
    instance.pre_launch_hook = payload.pre_launch_hook;
    instance.post_exit_hook = payload.post_exit_hook;
    instance.wrapper_command = payload.wrapper_command;

    // Changed selectors invalidate what is on disk: back to pending until
    // the next install pass.
    if selectors_changed && instance.installation_status == InstallationStatus::Installed {
        instance.installation_status = InstallationStatus::Pending;
    }

    instance.updated_at = Utc::now();
    state.instances.save(&instance).await?;

    events::emit(
        &state.events,
        events::INSTANCE_UPDATED,
        &events::InstanceEvent {
            instance_id: instance.id,
        },
    );
    Ok(InstanceInfo::new(
        &instance,
        state.supervisor.is_running(instance.id),
    ))
}

#[tauri::command]
pub async fn list_instances(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<Vec<InstanceInfo>, LauncherError> {
    let instances = state.instances.list().await?;
    Ok(instances
        .iter()
        .map(|i| InstanceInfo::new(i, state.supervisor.is_running(i.id)))
        .collect())
}

#[tauri::command]
pub async fn delete_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<(), LauncherError> {
    let instance = state.instances.load(id).await?;
    if state.gate.is_busy(id) {
        return Err(LauncherError::Busy(instance.name));
    }

    // A still-running game would keep handles open inside the tree.
    let kill_status = state.supervisor.kill(id)?;
    info!("Pre-delete kill for #{}: {}", id, kill_status);

    state.instances.delete(id).await?;
    events::emit(
        &state.events,
        events::INSTANCE_DELETED,
        &events::InstanceEvent { instance_id: id },
    );
    Ok(())
}

#[tauri::command]
pub async fn duplicate_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
    new_name: Option<String>,
) -> Result<InstanceInfo, LauncherError> {
    if state.gate.is_busy(id) {
        let instance = state.instances.load(id).await?;
        return Err(LauncherError::Busy(instance.name));
    }
    let cloned = state.instances.duplicate(id, new_name).await?;
    events::emit(
        &state.events,
        events::INSTANCE_UPDATED,
        &events::InstanceEvent {
            instance_id: cloned.id,
        },
    );
    Ok(InstanceInfo::new(&cloned, false))
}

// ── Install state machine ───────────────────────────────

#[tauri::command]
pub async fn install_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<InstanceInfo, LauncherError> {
    let instance = install::run_operation(&state, id, OperationKind::Install).await?;
    Ok(InstanceInfo::new(&instance, false))
}

#[tauri::command]
pub async fn repair_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<InstanceInfo, LauncherError> {
    let instance = install::run_operation(&state, id, OperationKind::Repair).await?;
    Ok(InstanceInfo::new(&instance, false))
}

/// Destructive: wipes the working tree, then reinstalls. Double
/// confirmation happens upstream in the UI.
#[tauri::command]
pub async fn reset_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<InstanceInfo, LauncherError> {
    let instance = install::run_operation(&state, id, OperationKind::HardReset).await?;
    Ok(InstanceInfo::new(&instance, false))
}

#[tauri::command]
pub async fn resume_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<InstanceInfo, LauncherError> {
    let instance = install::resume_interrupted(&state, id).await?;
    Ok(InstanceInfo::new(&instance, false))
}

// ── Process lifecycle ───────────────────────────────────

#[tauri::command]
pub async fn launch_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<u32, LauncherError> {
    let instance = state.instances.load(id).await?;
    if state.gate.is_busy(id) {
        return Err(LauncherError::Busy(instance.name));
    }

    let options = {
        let settings = state.settings.read().await;
        LaunchOptions::resolve(&instance, &settings)
    };

    state
        .supervisor
        .launch(
            &state.instances,
            &state.events,
            instance,
            options,
            &state.libraries_dir(),
        )
        .await
}

#[tauri::command]
pub async fn kill_instance(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<String, LauncherError> {
    state.supervisor.kill(id)
}

#[tauri::command]
pub async fn is_instance_running(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<bool, LauncherError> {
    Ok(state.supervisor.is_running(id))
}

#[tauri::command]
pub async fn get_instance_log(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
    max_lines: Option<usize>,
) -> Result<Vec<String>, LauncherError> {
    let instance = state.instances.load(id).await?;
    let log = RollingLog::new(&instance.logs_dir());
    log.read_tail(max_lines.unwrap_or(500))
}

// ── Resources ───────────────────────────────────────────

#[tauri::command]
pub async fn sync_instance_resources(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<Vec<InstalledResource>, LauncherError> {
    let instance = state.instances.load(id).await?;
    resources::sync_instance(&instance, &state.events).await
}

#[tauri::command]
pub async fn toggle_resource(
    state: tauri::State<'_, Arc<AppState>>,
    instance_id: i64,
    resource_id: i64,
    enabled: bool,
) -> Result<InstalledResource, LauncherError> {
    let instance = state.instances.load(instance_id).await?;
    resources::toggle_resource(&instance, resource_id, enabled, &state.events).await
}

#[tauri::command]
pub async fn delete_resource(
    state: tauri::State<'_, Arc<AppState>>,
    instance_id: i64,
    resource_id: i64,
) -> Result<(), LauncherError> {
    let instance = state.instances.load(instance_id).await?;
    resources::delete_resource(&instance, resource_id, &state.events).await
}

#[tauri::command]
pub async fn check_resource_updates(
    state: tauri::State<'_, Arc<AppState>>,
    id: i64,
) -> Result<Vec<ResourceUpdate>, LauncherError> {
    let instance = state.instances.load(id).await?;
    let resources = ResourceStore::for_instance(&instance).load().await?;
    let channel = state.settings.read().await.release_channel;
    Ok(check_updates(&state.http_client, &instance, &resources, channel).await)
}

#[tauri::command]
pub async fn apply_resource_update(
    state: tauri::State<'_, Arc<AppState>>,
    instance_id: i64,
    resource_id: i64,
) -> Result<InstalledResource, LauncherError> {
    let instance = state.instances.load(instance_id).await?;
    let channel = state.settings.read().await.release_channel;
    apply_update(
        &state.http_client,
        &state.downloader,
        &instance,
        resource_id,
        channel,
        &state.events,
    )
    .await
}

// ── Version catalog ─────────────────────────────────────

#[tauri::command]
pub async fn get_minecraft_versions(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<Vec<String>, LauncherError> {
    let manifest = state.manifest.get().await?;

    let versions: Vec<String> = manifest
        .versions
        .iter()
        .filter(|entry| entry.version_type == "release")
        .filter(|entry| !entry.id.to_ascii_lowercase().contains("demo"))
        .map(|entry| entry.id.clone())
        .collect();

    Ok(versions)
}

#[tauri::command]
pub async fn get_loader_versions(
    state: tauri::State<'_, Arc<AppState>>,
    loader: LoaderType,
    minecraft_version: String,
) -> Result<Vec<String>, LauncherError> {
    loaders::list_loader_versions(&state.http_client, loader, &minecraft_version).await
}

#[tauri::command]
pub async fn regenerate_piston_manifest(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<usize, LauncherError> {
    let manifest = state.manifest.regenerate().await?;
    Ok(manifest.versions.len())
}

// ── Notifications / tasks ───────────────────────────────

#[tauri::command]
pub async fn create_notification(
    state: tauri::State<'_, Arc<AppState>>,
    payload: CreateNotificationPayload,
) -> Result<Notification, LauncherError> {
    Ok(state
        .broker
        .create(
            payload.client_key,
            payload.title,
            payload.body,
            payload.severity,
            payload.kind,
            payload.dismissible,
            payload.actions,
        )
        .await)
}

#[tauri::command]
pub async fn update_notification_progress(
    state: tauri::State<'_, Arc<AppState>>,
    client_key: String,
    update: ProgressUpdate,
) -> Result<Notification, LauncherError> {
    Ok(state.broker.progress(&client_key, update).await)
}

#[tauri::command]
pub async fn list_notifications(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<Vec<Notification>, LauncherError> {
    Ok(state.broker.list().await)
}

#[tauri::command]
pub async fn cancel_task(
    state: tauri::State<'_, Arc<AppState>>,
    client_key: String,
) -> Result<bool, LauncherError> {
    Ok(state.broker.cancel(&client_key))
}

// ── Settings ────────────────────────────────────────────

#[tauri::command]
pub async fn get_settings(
    state: tauri::State<'_, Arc<AppState>>,
) -> Result<Settings, LauncherError> {
    Ok(state.settings.read().await.clone())
}

#[tauri::command]
pub async fn update_settings(
    state: tauri::State<'_, Arc<AppState>>,
    settings: Settings,
) -> Result<Settings, LauncherError> {
    settings.save(&state.data_dir)?;
    let mut guard = state.settings.write().await;
    *guard = settings;
    Ok(guard.clone())
}
