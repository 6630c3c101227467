use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::EventSink;
use crate::core::http::build_http_client;
use crate::core::install::OperationGate;
use crate::core::instance::InstanceStore;
use crate::core::notify::{NotificationBroker, NotificationKind, Severity};
use crate::core::process::ProcessSupervisor;
use crate::core::version::ManifestService;

use super::settings::Settings;

const APP_DIR_NAME: &str = "Vesta";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Long-lived application state shared by every command.
///
/// Individual components synchronize internally, so operations on different
/// instances never contend on one big lock.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: RwLock<Settings>,
    pub http_client: reqwest::Client,
    pub downloader: Arc<Downloader>,
    pub instances: Arc<InstanceStore>,
    pub manifest: ManifestService,
    pub broker: Arc<NotificationBroker>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub gate: OperationGate,
    pub events: Arc<dyn EventSink>,
}

impl AppState {
    pub fn new(events: Arc<dyn EventSink>) -> LauncherResult<Self> {
        let data_dir = default_data_dir();
        Self::with_data_dir(data_dir, events)
    }

    pub fn with_data_dir(data_dir: PathBuf, events: Arc<dyn EventSink>) -> LauncherResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|source| LauncherError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let settings = Settings::load(&data_dir);
        let http_client = build_http_client()?;
        let downloader = Arc::new(
            Downloader::new(http_client.clone())
                .with_concurrency(settings.max_download_concurrency),
        );
        let instances = Arc::new(InstanceStore::new(data_dir.join("instances")));
        let manifest = ManifestService::new(http_client.clone(), &data_dir);
        let broker = Arc::new(NotificationBroker::new(&data_dir, events.clone()));
        let supervisor = Arc::new(ProcessSupervisor::new());

        Ok(Self {
            data_dir,
            settings: RwLock::new(settings),
            http_client,
            downloader,
            instances,
            manifest,
            broker,
            supervisor,
            gate: OperationGate::new(),
            events,
        })
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    /// Startup pass: rebuild the instance index, surface interrupted
    /// operations, and purge expired notifications.
    pub async fn startup(&self) -> LauncherResult<()> {
        self.instances.init().await?;

        let interrupted = self.instances.reconcile_interrupted().await?;
        for instance in &interrupted {
            self.broker
                .create(
                    Some(format!("instance-interrupted-{}", instance.id)),
                    format!("'{}' was interrupted", instance.name),
                    Some(
                        "The launcher stopped while this instance was being modified. \
                         Resume to finish the operation."
                            .into(),
                    ),
                    Severity::Warning,
                    NotificationKind::Alert,
                    true,
                    vec![crate::core::notify::NotificationAction {
                        label: "Resume".into(),
                        action: format!("resume:{}", instance.id),
                    }],
                )
                .await;
        }

        let retention_days = self.settings.read().await.notification_retention_days;
        self.broker.sweep_expired(retention_days).await;

        info!(
            "Startup complete ({} interrupted instance(s) surfaced)",
            interrupted.len()
        );
        Ok(())
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            if !cfg.data_dir.exists() {
                let _ = std::fs::create_dir_all(&cfg.data_dir);
            }
            return cfg.data_dir;
        }
    }

    let dir = base.join(APP_DIR_NAME);

    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }

    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::testing::CollectingSink;
    use crate::core::instance::{InstallationStatus, Instance, LoaderType, OperationKind};

    #[tokio::test]
    async fn startup_surfaces_interrupted_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingSink::default());
        let events: Arc<dyn EventSink> = sink.clone();
        let state = AppState::with_data_dir(tmp.path().to_path_buf(), events).unwrap();
        state.startup().await.unwrap();

        let mut instance = state
            .instances
            .create(Instance::new(
                "Broken".into(),
                "1.20.1".into(),
                LoaderType::Vanilla,
                None,
            ))
            .await
            .unwrap();
        instance.installation_status = InstallationStatus::Installing;
        instance.last_operation = Some(OperationKind::Repair);
        state.instances.save(&instance).await.unwrap();

        // Simulate a fresh backend over the same data dir.
        let sink2 = Arc::new(CollectingSink::default());
        let events2: Arc<dyn EventSink> = sink2.clone();
        let restarted = AppState::with_data_dir(tmp.path().to_path_buf(), events2).unwrap();
        restarted.startup().await.unwrap();

        let reloaded = restarted.instances.load(instance.id).await.unwrap();
        assert_eq!(
            reloaded.installation_status,
            InstallationStatus::Interrupted
        );
        assert_eq!(reloaded.last_operation, Some(OperationKind::Repair));

        let notifications = restarted.broker.list().await;
        assert!(notifications
            .iter()
            .any(|n| n.client_key.as_deref() == Some("instance-interrupted-1")));
    }
}
