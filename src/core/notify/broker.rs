use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::model::{
    Notification, NotificationAction, NotificationKind, ProgressUpdate, Severity,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{self, EventSink};

const NOTIFICATIONS_FILE: &str = "notifications.json";

struct Inner {
    notifications: Vec<Notification>,
    next_id: i64,
}

/// Generic progress / cancellation channel shared by every long-running
/// operation. Decouples backend work from whichever UI surface happens to
/// be open: updates are keyed by `client_key`, and late subscribers can
/// reconstruct state by listing instead of replaying the event stream.
pub struct NotificationBroker {
    store_path: PathBuf,
    events: Arc<dyn EventSink>,
    inner: Mutex<Inner>,
    cancel_flags: StdMutex<HashMap<String, Arc<AtomicBool>>>,
}

impl NotificationBroker {
    pub fn new(data_dir: &std::path::Path, events: Arc<dyn EventSink>) -> Self {
        let store_path = data_dir.join(NOTIFICATIONS_FILE);
        let notifications: Vec<Notification> = std::fs::read_to_string(&store_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let next_id = notifications.iter().map(|n| n.id).max().unwrap_or(0) + 1;

        Self {
            store_path,
            events,
            inner: Mutex::new(Inner {
                notifications,
                next_id,
            }),
            cancel_flags: StdMutex::new(HashMap::new()),
        }
    }

    // ── Creation / updates ──────────────────────────────

    /// Create a notification. When `client_key` already names a live task,
    /// that task is refreshed instead of duplicated.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        client_key: Option<String>,
        title: String,
        body: Option<String>,
        severity: Severity,
        kind: NotificationKind,
        dismissible: bool,
        actions: Vec<NotificationAction>,
    ) -> Notification {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        if let Some(key) = &client_key {
            if let Some(existing) = inner
                .notifications
                .iter_mut()
                .find(|n| !n.completed && n.client_key.as_deref() == Some(key))
            {
                existing.title = title;
                existing.body = body;
                existing.severity = severity;
                existing.kind = kind;
                existing.dismissible = dismissible;
                existing.actions = actions;
                existing.updated_at = now;
                let snapshot = existing.clone();
                self.persist(&inner);
                events::emit(&self.events, events::NOTIFICATION_UPDATED, &snapshot);
                return snapshot;
            }
        }

        let notification = Notification {
            id: inner.next_id,
            client_key,
            title,
            body,
            severity,
            kind,
            dismissible,
            progress: None,
            indeterminate: kind == NotificationKind::Progress,
            current_step: None,
            total_steps: None,
            actions,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        inner.next_id += 1;
        inner.notifications.push(notification.clone());
        self.persist(&inner);

        events::emit(&self.events, events::NOTIFICATION, &notification);
        notification
    }

    /// Apply a progress update to the task registered under `client_key`.
    ///
    /// Updates may outrun subscription (or arrive after a UI reload), so an
    /// unknown key synthesizes a fresh display entity rather than dropping
    /// the update.
    pub async fn progress(&self, client_key: &str, update: ProgressUpdate) -> Notification {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let position = inner
            .notifications
            .iter()
            .position(|n| !n.completed && n.client_key.as_deref() == Some(client_key));

        let index = match position {
            Some(i) => i,
            None => {
                warn!(
                    "Progress for unknown task '{}' — synthesizing entry",
                    client_key
                );
                let synthesized = Notification {
                    id: inner.next_id,
                    client_key: Some(client_key.to_string()),
                    title: client_key.to_string(),
                    body: None,
                    severity: Severity::Info,
                    kind: NotificationKind::Progress,
                    dismissible: false,
                    progress: None,
                    indeterminate: true,
                    current_step: None,
                    total_steps: None,
                    actions: Vec::new(),
                    completed: false,
                    created_at: now,
                    updated_at: now,
                };
                inner.next_id += 1;
                inner.notifications.push(synthesized);
                inner.notifications.len() - 1
            }
        };

        let entry = &mut inner.notifications[index];
        if let Some(progress) = update.progress {
            entry.progress = Some(progress.min(100));
            entry.indeterminate = false;
        }
        if let Some(indeterminate) = update.indeterminate {
            entry.indeterminate = indeterminate;
        }
        if update.current_step.is_some() {
            entry.current_step = update.current_step;
        }
        if update.total_steps.is_some() {
            entry.total_steps = update.total_steps;
        }
        if update.body.is_some() {
            entry.body = update.body;
        }
        entry.updated_at = now;

        let snapshot = entry.clone();
        self.persist(&inner);
        events::emit(&self.events, events::NOTIFICATION_PROGRESS, &snapshot);
        snapshot
    }

    /// Resolve a task to its terminal state.
    pub async fn resolve(
        &self,
        client_key: &str,
        severity: Severity,
        body: Option<String>,
    ) -> Option<Notification> {
        let mut inner = self.inner.lock().await;

        let entry = inner
            .notifications
            .iter_mut()
            .find(|n| !n.completed && n.client_key.as_deref() == Some(client_key))?;

        entry.completed = true;
        entry.severity = severity;
        entry.indeterminate = false;
        if severity == Severity::Success {
            entry.progress = Some(100);
        }
        if body.is_some() {
            entry.body = body;
        }
        entry.dismissible = true;
        entry.updated_at = Utc::now();

        let snapshot = entry.clone();
        self.persist(&inner);
        events::emit(&self.events, events::NOTIFICATION_UPDATED, &snapshot);

        self.cancel_flags.lock().unwrap().remove(client_key);
        Some(snapshot)
    }

    /// Current view for late subscribers.
    pub async fn list(&self) -> Vec<Notification> {
        self.inner.lock().await.notifications.clone()
    }

    // ── Cancellation ────────────────────────────────────

    /// Register a cooperative cancel flag for a task. Operations poll the
    /// flag at safe checkpoints (between downloads, between steps).
    pub fn register_cancel(&self, client_key: &str) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .unwrap()
            .insert(client_key.to_string(), flag.clone());
        flag
    }

    /// Request cancellation. Returns whether a live task had registered a
    /// cancel flag under that key.
    pub fn cancel(&self, client_key: &str) -> bool {
        match self.cancel_flags.lock().unwrap().get(client_key) {
            Some(flag) => {
                info!("Cancellation requested for task '{}'", client_key);
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    // ── Retention ───────────────────────────────────────

    /// Purge completed notifications older than the retention window.
    /// Called once at startup.
    pub async fn sweep_expired(&self, retention_days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut inner = self.inner.lock().await;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !n.completed || n.updated_at >= cutoff);
        let removed = before - inner.notifications.len();
        if removed > 0 {
            info!("Swept {} expired notifications", removed);
            self.persist(&inner);
        }
        removed
    }

    fn persist(&self, inner: &Inner) {
        match serde_json::to_string_pretty(&inner.notifications) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.store_path, json) {
                    warn!("Cannot persist notifications: {}", e);
                }
            }
            Err(e) => warn!("Cannot serialize notifications: {}", e),
        }
    }

    // ── Task facade ─────────────────────────────────────

    /// Start a progress task: one live notification plus a cancel flag.
    pub async fn start_task(self: &Arc<Self>, client_key: &str, title: &str) -> TaskHandle {
        let cancel = self.register_cancel(client_key);
        self.create(
            Some(client_key.to_string()),
            title.to_string(),
            None,
            Severity::Info,
            NotificationKind::Progress,
            false,
            vec![NotificationAction {
                label: "Cancel".into(),
                action: format!("cancel:{client_key}"),
            }],
        )
        .await;

        TaskHandle {
            broker: Arc::clone(self),
            client_key: client_key.to_string(),
            cancel,
        }
    }
}

/// Held by a long-running operation for the duration of its work.
pub struct TaskHandle {
    broker: Arc<NotificationBroker>,
    client_key: String,
    cancel: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    pub fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Checkpoint: error out if cancellation was requested.
    pub fn checkpoint(&self) -> LauncherResult<()> {
        if self.is_cancelled() {
            Err(LauncherError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub async fn progress(&self, update: ProgressUpdate) {
        self.broker.progress(&self.client_key, update).await;
    }

    pub async fn step(&self, current: u32, total: u32, body: &str) {
        self.broker
            .progress(
                &self.client_key,
                ProgressUpdate {
                    progress: Some(((current * 100) / total.max(1)).min(100) as u8),
                    current_step: Some(current),
                    total_steps: Some(total),
                    body: Some(body.to_string()),
                    ..Default::default()
                },
            )
            .await;
    }

    pub async fn complete(&self, body: &str) {
        self.broker
            .resolve(&self.client_key, Severity::Success, Some(body.to_string()))
            .await;
    }

    pub async fn fail(&self, body: &str) {
        self.broker
            .resolve(&self.client_key, Severity::Error, Some(body.to_string()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::testing::CollectingSink;

    fn broker(dir: &std::path::Path) -> (Arc<NotificationBroker>, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let events: Arc<dyn EventSink> = sink.clone();
        (Arc::new(NotificationBroker::new(dir, events)), sink)
    }

    #[tokio::test]
    async fn progress_for_unknown_key_synthesizes_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let (broker, sink) = broker(tmp.path());

        let n = broker
            .progress(
                "instance-install-7",
                ProgressUpdate {
                    progress: Some(40),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(n.client_key.as_deref(), Some("instance-install-7"));
        assert_eq!(n.progress, Some(40));
        assert!(sink
            .topics()
            .contains(&events::NOTIFICATION_PROGRESS.to_string()));

        // The synthesized entry is now live: the same key keeps updating it.
        let again = broker
            .progress(
                "instance-install-7",
                ProgressUpdate {
                    progress: Some(80),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(again.id, n.id);
        assert_eq!(broker.list().await.len(), 1);
    }

    #[tokio::test]
    async fn client_key_identifies_at_most_one_live_task() {
        let tmp = tempfile::tempdir().unwrap();
        let (broker, _sink) = broker(tmp.path());

        broker
            .create(
                Some("repair-1".into()),
                "Repairing".into(),
                None,
                Severity::Info,
                NotificationKind::Progress,
                false,
                vec![],
            )
            .await;
        broker
            .create(
                Some("repair-1".into()),
                "Repairing (again)".into(),
                None,
                Severity::Info,
                NotificationKind::Progress,
                false,
                vec![],
            )
            .await;

        let live: Vec<_> = broker
            .list()
            .await
            .into_iter()
            .filter(|n| !n.completed)
            .collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].title, "Repairing (again)");
    }

    #[tokio::test]
    async fn sweep_removes_only_entries_past_retention() {
        let tmp = tempfile::tempdir().unwrap();
        let (broker, _sink) = broker(tmp.path());

        broker
            .create(
                Some("old".into()),
                "Old task".into(),
                None,
                Severity::Info,
                NotificationKind::Alert,
                true,
                vec![],
            )
            .await;
        broker.resolve("old", Severity::Success, None).await;

        // Backdate the resolved entry past the retention window.
        {
            let mut inner = broker.inner.lock().await;
            inner.notifications[0].updated_at = Utc::now() - Duration::days(45);
        }

        broker
            .create(
                Some("fresh".into()),
                "Fresh task".into(),
                None,
                Severity::Info,
                NotificationKind::Alert,
                true,
                vec![],
            )
            .await;
        broker.resolve("fresh", Severity::Success, None).await;

        let removed = broker.sweep_expired(30).await;
        assert_eq!(removed, 1);

        let remaining = broker.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].client_key.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn cancel_sets_registered_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let (broker, _sink) = broker(tmp.path());

        let task = broker.start_task("reset-3", "Resetting").await;
        assert!(!task.is_cancelled());
        assert!(broker.cancel("reset-3"));
        assert!(task.is_cancelled());
        assert!(matches!(
            task.checkpoint(),
            Err(LauncherError::Cancelled)
        ));

        // Unknown keys report false instead of failing.
        assert!(!broker.cancel("never-registered"));
    }
}
