use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// How a notification wants to be presented.
///
/// `Alert` is a plain toast; `Progress` tracks a long operation;
/// `Immediate` jumps the queue; `Patient` waits until the user is idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Alert,
    Progress,
    Immediate,
    Patient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: String,
    pub action: String,
}

/// A single notification / task row, persisted in `notifications.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    /// Stable correlation key; a given key identifies at most one live task.
    pub client_key: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub severity: Severity,
    pub kind: NotificationKind,
    pub dismissible: bool,
    /// Percentage 0..=100. `None` with `indeterminate` = spinner.
    pub progress: Option<u8>,
    pub indeterminate: bool,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incremental progress payload applied to a live task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: Option<u8>,
    pub indeterminate: Option<bool>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub body: Option<String>,
}
